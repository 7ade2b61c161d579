//! Dashboard statistics and chart aggregations.

use crate::{
    db::{
        columns::Column,
        query::{GroupOrder, GroupQuery, Predicate, QueryBuilder},
        CertificateStore, GroupCount,
    },
    Result,
};
use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;

const TOP_N: u32 = 10;
const RECENT_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_certificates: u64,
    pub total_manufacturers: u64,
    pub total_makes: u64,
    pub latest_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added_last_30_days: Option<u64>,
    /// User counts keyed by status (admins only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<Map<String, JsonValue>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardCharts {
    pub by_year: Vec<GroupCount>,
    pub by_manufacturer: Vec<GroupCount>,
    pub by_make: Vec<GroupCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub stats: DashboardStats,
    pub charts: DashboardCharts,
}

pub struct StatsService {
    store: Arc<dyn CertificateStore>,
}

impl StatsService {
    pub fn new(store: Arc<dyn CertificateStore>) -> Self {
        Self { store }
    }

    /// Group rows by `keys` and count them.
    pub async fn count_by(&self, query: &GroupQuery) -> Result<Vec<GroupCount>> {
        self.store.count_by(query).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn dashboard(&self, is_admin: bool) -> Result<Dashboard> {
        let everything = QueryBuilder::new(Predicate::all(), Default::default());
        let total_certificates = self.store.count(&everything).await?;
        let total_manufacturers = self.store.count_distinct(Column::Manufacturer).await?;
        let total_makes = self.store.count_distinct(Column::VehicleMake).await?;

        let by_year = self
            .count_by(&GroupQuery::new(vec![Column::Year], GroupOrder::KeyAsc))
            .await?;
        let latest_year = by_year
            .iter()
            .filter_map(|g| g.keys.first().and_then(|(_, v)| v.as_i64()))
            .max()
            .and_then(|y| i32::try_from(y).ok());

        let by_manufacturer = self
            .count_by(
                &GroupQuery::new(vec![Column::Manufacturer], GroupOrder::CountDesc)
                    .with_limit(TOP_N),
            )
            .await?;
        let by_make = self
            .count_by(
                &GroupQuery::new(vec![Column::VehicleMake], GroupOrder::CountDesc).with_limit(TOP_N),
            )
            .await?;

        let (added_last_30_days, users) = if is_admin {
            let since = Utc::now() - Duration::days(RECENT_DAYS);
            let added = self.store.count_created_since(since).await?;
            let mut users = Map::new();
            for (status, count) in self.store.user_status_counts().await? {
                users.insert(status.as_str().to_string(), JsonValue::from(count));
            }
            (Some(added), Some(users))
        } else {
            (None, None)
        };

        Ok(Dashboard {
            stats: DashboardStats {
                total_certificates,
                total_manufacturers,
                total_makes,
                latest_year,
                added_last_30_days,
                users,
            },
            charts: DashboardCharts {
                by_year,
                by_manufacturer,
                by_make,
            },
        })
    }
}
