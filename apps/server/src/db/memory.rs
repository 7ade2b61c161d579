//! In-memory implementation of [`CertificateStore`].
//!
//! Evaluates the same [`Predicate`](super::query::Predicate) and ordering
//! rules as the PostgreSQL store, without a database. Used by tests and for
//! local experimentation.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;

use super::columns::{Column, ColumnKind};
use super::query::{integer_value, text_value, GroupOrder, GroupQuery, OrderSpec, QueryBuilder};
use super::traits::{CertificateStore, GroupCount, ImportTransaction};
use crate::{
    models::{Certificate, CertificatePatch, NewCertificate, UserStatus},
    Error, Result,
};

#[derive(Debug, Default)]
struct Inner {
    certificates: BTreeMap<i64, Certificate>,
    next_id: i64,
    users: Vec<UserStatus>,
}

impl Inner {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn eo_number_taken(&self, eo_number: &str, except: Option<i64>) -> bool {
        self.certificates
            .values()
            .any(|c| c.eo_number == eo_number && Some(c.id) != except)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCertificateStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryCertificateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user account with the given status (for dashboard counts).
    pub async fn add_user(&self, status: UserStatus) {
        self.inner.write().await.users.push(status);
    }

    /// Overwrite `created_at` of a row.
    pub async fn set_created_at(&self, id: i64, created_at: DateTime<Utc>) -> bool {
        match self.inner.write().await.certificates.get_mut(&id) {
            Some(row) => {
                row.created_at = created_at;
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.certificates.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn materialize(id: i64, certificate: &NewCertificate) -> Certificate {
    let now = Utc::now();
    Certificate {
        id,
        eo_number: certificate.eo_number.clone(),
        year: certificate.year,
        vehicle_make: certificate.vehicle_make.clone(),
        vehicle_model: certificate.vehicle_model.clone(),
        manufacturer: certificate.manufacturer.clone(),
        test_group: certificate.test_group.clone(),
        engine_size: certificate.engine_size.clone(),
        evaporative_family: certificate.evaporative_family.clone(),
        vehicle_class: certificate.vehicle_class.clone(),
        exhaust_ecs_features: certificate.exhaust_ecs_features.clone(),
        created_at: now,
        updated_at: now,
    }
}

/// Comparable column value. `None` is SQL NULL.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Value {
    Int(i64),
    Text(String),
    Time(DateTime<Utc>),
}

impl Value {
    fn to_json(&self) -> JsonValue {
        match self {
            Value::Int(v) => JsonValue::from(*v),
            Value::Text(v) => JsonValue::from(v.clone()),
            Value::Time(v) => JsonValue::from(v.to_rfc3339()),
        }
    }
}

fn value_of(certificate: &Certificate, column: Column) -> Option<Value> {
    match column.kind() {
        ColumnKind::Text => text_value(certificate, column).map(|v| Value::Text(v.to_string())),
        ColumnKind::Integer => match column {
            Column::Id => Some(Value::Int(certificate.id)),
            _ => integer_value(certificate, column).map(|v| Value::Int(i64::from(v))),
        },
        ColumnKind::Timestamp => match column {
            Column::CreatedAt => Some(Value::Time(certificate.created_at)),
            _ => Some(Value::Time(certificate.updated_at)),
        },
    }
}

/// Ascending order with NULL last.
fn compare_nulls_last(a: &Option<Value>, b: &Option<Value>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare_rows(order: &OrderSpec, a: &Certificate, b: &Certificate) -> Ordering {
    let (va, vb) = (value_of(a, order.column), value_of(b, order.column));
    let primary = match (&va, &vb) {
        // NULLS LAST in either direction
        (Some(_), None) | (None, Some(_)) => compare_nulls_last(&va, &vb),
        _ => order.direction.apply(compare_nulls_last(&va, &vb)),
    };
    primary.then_with(|| order.direction.apply(a.id.cmp(&b.id)))
}

#[async_trait]
impl CertificateStore for InMemoryCertificateStore {
    async fn fetch_page(&self, query: &QueryBuilder) -> Result<Vec<Certificate>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<&Certificate> = inner
            .certificates
            .values()
            .filter(|c| query.predicate().matches(c))
            .collect();

        let request = query.request();
        rows.sort_by(|a, b| compare_rows(&request.order, a, b));

        let offset = usize::try_from(request.page.offset()).unwrap_or(usize::MAX);
        Ok(rows
            .into_iter()
            .skip(offset)
            .take(request.page.limit as usize)
            .cloned()
            .collect())
    }

    async fn count(&self, query: &QueryBuilder) -> Result<u64> {
        let inner = self.inner.read().await;
        Ok(inner
            .certificates
            .values()
            .filter(|c| query.predicate().matches(c))
            .count() as u64)
    }

    async fn get(&self, id: i64) -> Result<Option<Certificate>> {
        Ok(self.inner.read().await.certificates.get(&id).cloned())
    }

    async fn insert(&self, certificate: &NewCertificate) -> Result<Certificate> {
        let mut inner = self.inner.write().await;
        if inner.eo_number_taken(&certificate.eo_number, None) {
            return Err(Error::Duplicate {
                eo_number: certificate.eo_number.clone(),
            });
        }
        let id = inner.allocate_id();
        let row = materialize(id, certificate);
        inner.certificates.insert(id, row.clone());
        Ok(row)
    }

    async fn update(&self, id: i64, patch: &CertificatePatch) -> Result<Option<Certificate>> {
        let mut inner = self.inner.write().await;
        if let Some(eo_number) = &patch.eo_number {
            if inner.eo_number_taken(eo_number, Some(id)) && inner.certificates.contains_key(&id) {
                return Err(Error::Duplicate {
                    eo_number: eo_number.clone(),
                });
            }
        }
        let Some(row) = inner.certificates.get_mut(&id) else {
            return Ok(None);
        };
        patch.apply(row);
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        Ok(self.inner.write().await.certificates.remove(&id).is_some())
    }

    async fn delete_many(&self, ids: &[i64]) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let mut deleted = 0;
        for id in ids {
            if inner.certificates.remove(id).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn distinct_values(&self, column: Column) -> Result<Vec<JsonValue>> {
        if column.kind() == ColumnKind::Timestamp {
            return Err(Error::Validation(format!(
                "Column '{}' has no filter options",
                column.field_name()
            )));
        }
        let inner = self.inner.read().await;
        let mut values: Vec<Value> = inner
            .certificates
            .values()
            .filter_map(|c| value_of(c, column))
            .collect();
        values.sort();
        values.dedup();
        Ok(values.iter().map(Value::to_json).collect())
    }

    async fn count_distinct(&self, column: Column) -> Result<u64> {
        let inner = self.inner.read().await;
        let values: BTreeSet<Value> = inner
            .certificates
            .values()
            .filter_map(|c| value_of(c, column))
            .collect();
        Ok(values.len() as u64)
    }

    async fn count_by(&self, group: &GroupQuery) -> Result<Vec<GroupCount>> {
        let inner = self.inner.read().await;
        let mut counts: HashMap<Vec<Option<Value>>, i64> = HashMap::new();
        for row in inner.certificates.values() {
            let key: Vec<Option<Value>> = group.keys.iter().map(|c| value_of(row, *c)).collect();
            *counts.entry(key).or_insert(0) += 1;
        }

        let compare_keys = |a: &Vec<Option<Value>>, b: &Vec<Option<Value>>| {
            a.iter()
                .zip(b.iter())
                .map(|(x, y)| compare_nulls_last(x, y))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        };

        let mut grouped: Vec<(Vec<Option<Value>>, i64)> = counts.into_iter().collect();
        match group.order {
            GroupOrder::CountDesc => {
                grouped.sort_by(|(ka, ca), (kb, cb)| cb.cmp(ca).then_with(|| compare_keys(ka, kb)))
            }
            GroupOrder::KeyAsc => grouped.sort_by(|(ka, _), (kb, _)| compare_keys(ka, kb)),
        }
        if let Some(limit) = group.limit {
            grouped.truncate(limit as usize);
        }

        Ok(grouped
            .into_iter()
            .map(|(key, count)| GroupCount {
                keys: group
                    .keys
                    .iter()
                    .zip(key)
                    .map(|(column, value)| {
                        (*column, value.map(|v| v.to_json()).unwrap_or(JsonValue::Null))
                    })
                    .collect(),
                count,
            })
            .collect())
    }

    async fn count_created_since(&self, since: DateTime<Utc>) -> Result<u64> {
        let inner = self.inner.read().await;
        Ok(inner
            .certificates
            .values()
            .filter(|c| c.created_at >= since)
            .count() as u64)
    }

    async fn user_status_counts(&self) -> Result<Vec<(UserStatus, i64)>> {
        let inner = self.inner.read().await;
        Ok(UserStatus::ALL
            .iter()
            .map(|status| {
                let n = inner.users.iter().filter(|s| *s == status).count();
                (*status, n as i64)
            })
            .collect())
    }

    async fn begin_import(&self) -> Result<Box<dyn ImportTransaction>> {
        Ok(Box::new(InMemoryImportTransaction {
            inner: Arc::clone(&self.inner),
            pending: Vec::new(),
        }))
    }
}

/// Buffers inserted rows and publishes them on commit.
pub struct InMemoryImportTransaction {
    inner: Arc<RwLock<Inner>>,
    pending: Vec<Certificate>,
}

#[async_trait]
impl ImportTransaction for InMemoryImportTransaction {
    async fn insert(&mut self, certificate: &NewCertificate) -> Result<Certificate> {
        let mut inner = self.inner.write().await;
        let pending_dup = self
            .pending
            .iter()
            .any(|c| c.eo_number == certificate.eo_number);
        if pending_dup || inner.eo_number_taken(&certificate.eo_number, None) {
            return Err(Error::Duplicate {
                eo_number: certificate.eo_number.clone(),
            });
        }
        let row = materialize(inner.allocate_id(), certificate);
        self.pending.push(row.clone());
        Ok(row)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut inner = self.inner.write().await;
        for row in self.pending {
            if inner.eo_number_taken(&row.eo_number, None) {
                return Err(Error::Duplicate {
                    eo_number: row.eo_number,
                });
            }
            inner.certificates.insert(row.id, row);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueryConfig;
    use crate::db::query::{resolve, Predicate};

    fn new_cert(eo: &str, year: i32, make: &str, manufacturer: Option<&str>) -> NewCertificate {
        NewCertificate {
            eo_number: eo.to_string(),
            year,
            vehicle_make: make.to_string(),
            vehicle_model: "Model".to_string(),
            manufacturer: manufacturer.map(str::to_string),
            test_group: None,
            engine_size: None,
            evaporative_family: None,
            vehicle_class: None,
            exhaust_ecs_features: None,
        }
    }

    #[tokio::test]
    async fn duplicate_eo_number_is_rejected() {
        let store = InMemoryCertificateStore::new();
        store.insert(&new_cert("A-1", 2020, "Toyota", None)).await.unwrap();
        let err = store
            .insert(&new_cert("A-1", 2021, "Honda", None))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Duplicate { .. }));
    }

    #[tokio::test]
    async fn sorts_with_nulls_last_and_id_tie_breaker() {
        let store = InMemoryCertificateStore::new();
        store.insert(&new_cert("A-1", 2020, "Toyota", Some("B"))).await.unwrap();
        store.insert(&new_cert("A-2", 2020, "Toyota", None)).await.unwrap();
        store.insert(&new_cert("A-3", 2020, "Toyota", Some("A"))).await.unwrap();

        let request = resolve(
            Some("manufacturer"),
            Some("desc"),
            None,
            None,
            &QueryConfig::default(),
        );
        let rows = store
            .fetch_page(&QueryBuilder::new(Predicate::all(), request))
            .await
            .unwrap();
        let order: Vec<&str> = rows.iter().map(|r| r.eo_number.as_str()).collect();
        assert_eq!(order, vec!["A-1", "A-3", "A-2"]);
    }

    #[tokio::test]
    async fn import_rows_are_invisible_until_commit() {
        let store = InMemoryCertificateStore::new();
        let mut tx = store.begin_import().await.unwrap();
        tx.insert(&new_cert("A-1", 2020, "Toyota", None)).await.unwrap();
        let err = tx
            .insert(&new_cert("A-1", 2020, "Toyota", None))
            .await
            .unwrap_err();
        assert!(err.is_row_scoped());
        assert!(store.is_empty().await);

        tx.commit().await.unwrap();
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn count_by_orders_by_count_then_key() {
        let store = InMemoryCertificateStore::new();
        store.insert(&new_cert("A-1", 2020, "Toyota", None)).await.unwrap();
        store.insert(&new_cert("A-2", 2021, "Honda", None)).await.unwrap();
        store.insert(&new_cert("A-3", 2022, "Honda", None)).await.unwrap();
        store.insert(&new_cert("A-4", 2022, "Acura", None)).await.unwrap();

        let rows = store
            .count_by(&GroupQuery::new(vec![Column::VehicleMake], GroupOrder::CountDesc).with_limit(2))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].keys[0].1, JsonValue::from("Honda"));
        assert_eq!(rows[0].count, 2);
        assert_eq!(rows[1].keys[0].1, JsonValue::from("Acura"));
    }

    #[tokio::test]
    async fn count_distinct_skips_nulls() {
        let store = InMemoryCertificateStore::new();
        store.insert(&new_cert("A-1", 2020, "Toyota", Some("TMC"))).await.unwrap();
        store.insert(&new_cert("A-2", 2021, "Toyota", Some("TMC"))).await.unwrap();
        store.insert(&new_cert("A-3", 2021, "Honda", None)).await.unwrap();

        assert_eq!(store.count_distinct(Column::Manufacturer).await.unwrap(), 1);
        assert_eq!(store.count_distinct(Column::VehicleMake).await.unwrap(), 2);
        assert_eq!(store.count_distinct(Column::Year).await.unwrap(), 2);
    }
}
