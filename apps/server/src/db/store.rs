//! PostgreSQL implementation of [`CertificateStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{PgExecutor, PgPool, Row};

use super::columns::{Column, ColumnKind};
use super::query::{self, GroupQuery, QueryBuilder, SELECT_COLUMNS};
use super::traits::{CertificateStore, GroupCount, ImportTransaction};
use super::transaction::PostgresImportTransaction;
use crate::{
    models::{Certificate, CertificatePatch, NewCertificate, UserStatus},
    Error, Result,
};

#[derive(Clone)]
pub struct PostgresCertificateStore {
    pool: PgPool,
}

impl PostgresCertificateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Insert one row with the given executor (pool, connection or transaction).
pub(crate) async fn insert_row<'e, E>(executor: E, certificate: &NewCertificate) -> Result<Certificate>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        r#"INSERT INTO eo_certificates
             ("EO Number", "Year", "Vehicle Make", "Vehicle Model", "Manufacturer",
              "Test Group", "Engine Size (L)", "Evaporative Family", "Vehicle Class",
              "Exhaust ECS Features")
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
           RETURNING {SELECT_COLUMNS}"#
    );

    sqlx::query_as::<_, Certificate>(&sql)
        .bind(&certificate.eo_number)
        .bind(certificate.year)
        .bind(&certificate.vehicle_make)
        .bind(&certificate.vehicle_model)
        .bind(&certificate.manufacturer)
        .bind(&certificate.test_group)
        .bind(&certificate.engine_size)
        .bind(&certificate.evaporative_family)
        .bind(&certificate.vehicle_class)
        .bind(&certificate.exhaust_ecs_features)
        .fetch_one(executor)
        .await
        .map_err(|e| Error::from_write(e, &certificate.eo_number))
}

fn to_count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

#[async_trait]
impl CertificateStore for PostgresCertificateStore {
    async fn fetch_page(&self, query: &QueryBuilder) -> Result<Vec<Certificate>> {
        let (sql, bind_values) = query.build_sql();
        let rows = query::bind_all_as(sqlx::query_as::<_, Certificate>(&sql), bind_values)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows)
    }

    async fn count(&self, query: &QueryBuilder) -> Result<u64> {
        let (sql, bind_values) = query.build_count_sql();
        let total = query::bind_all_scalar(sqlx::query_scalar::<_, i64>(&sql), bind_values)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(to_count(total))
    }

    async fn get(&self, id: i64) -> Result<Option<Certificate>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM eo_certificates WHERE id = $1");
        let row = sqlx::query_as::<_, Certificate>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row)
    }

    async fn insert(&self, certificate: &NewCertificate) -> Result<Certificate> {
        insert_row(&self.pool, certificate).await
    }

    async fn update(&self, id: i64, patch: &CertificatePatch) -> Result<Option<Certificate>> {
        // Required columns keep their value on NULL; optional columns use an
        // explicit "present" flag so NULL can clear them.
        let sql = format!(
            r#"UPDATE eo_certificates SET
                 "EO Number" = COALESCE($2, "EO Number"),
                 "Year" = COALESCE($3, "Year"),
                 "Vehicle Make" = COALESCE($4, "Vehicle Make"),
                 "Vehicle Model" = COALESCE($5, "Vehicle Model"),
                 "Manufacturer" = CASE WHEN $6 THEN $7 ELSE "Manufacturer" END,
                 "Test Group" = CASE WHEN $8 THEN $9 ELSE "Test Group" END,
                 "Engine Size (L)" = CASE WHEN $10 THEN $11 ELSE "Engine Size (L)" END,
                 "Evaporative Family" = CASE WHEN $12 THEN $13 ELSE "Evaporative Family" END,
                 "Vehicle Class" = CASE WHEN $14 THEN $15 ELSE "Vehicle Class" END,
                 "Exhaust ECS Features" = CASE WHEN $16 THEN $17 ELSE "Exhaust ECS Features" END,
                 updated_at = NOW()
               WHERE id = $1
               RETURNING {SELECT_COLUMNS}"#
        );

        fn flag(value: &Option<Option<String>>) -> (bool, Option<String>) {
            match value {
                Some(v) => (true, v.clone()),
                None => (false, None),
            }
        }

        let (set_manufacturer, manufacturer) = flag(&patch.manufacturer);
        let (set_test_group, test_group) = flag(&patch.test_group);
        let (set_engine_size, engine_size) = flag(&patch.engine_size);
        let (set_evap, evaporative_family) = flag(&patch.evaporative_family);
        let (set_class, vehicle_class) = flag(&patch.vehicle_class);
        let (set_ecs, exhaust_ecs_features) = flag(&patch.exhaust_ecs_features);

        let eo_number = patch.eo_number.clone().unwrap_or_default();
        sqlx::query_as::<_, Certificate>(&sql)
            .bind(id)
            .bind(&patch.eo_number)
            .bind(patch.year)
            .bind(&patch.vehicle_make)
            .bind(&patch.vehicle_model)
            .bind(set_manufacturer)
            .bind(manufacturer)
            .bind(set_test_group)
            .bind(test_group)
            .bind(set_engine_size)
            .bind(engine_size)
            .bind(set_evap)
            .bind(evaporative_family)
            .bind(set_class)
            .bind(vehicle_class)
            .bind(set_ecs)
            .bind(exhaust_ecs_features)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::from_write(e, &eo_number))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM eo_certificates WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_many(&self, ids: &[i64]) -> Result<u64> {
        let result = query::bind_all(
            sqlx::query("DELETE FROM eo_certificates WHERE id = ANY($1)"),
            vec![query::BindValue::BigIntArray(ids.to_vec())],
        )
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    async fn distinct_values(&self, column: Column) -> Result<Vec<JsonValue>> {
        let sql = query::build_distinct_sql(column);
        let values = match column.kind() {
            ColumnKind::Integer => sqlx::query_scalar::<_, i32>(&sql)
                .fetch_all(&self.pool)
                .await
                .map_err(Error::Database)?
                .into_iter()
                .map(JsonValue::from)
                .collect(),
            ColumnKind::Text => sqlx::query_scalar::<_, String>(&sql)
                .fetch_all(&self.pool)
                .await
                .map_err(Error::Database)?
                .into_iter()
                .map(JsonValue::from)
                .collect(),
            ColumnKind::Timestamp => {
                return Err(Error::Validation(format!(
                    "Column '{}' has no filter options",
                    column.field_name()
                )))
            }
        };
        Ok(values)
    }

    async fn count_distinct(&self, column: Column) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(&query::build_count_distinct_sql(column))
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(count as u64)
    }

    async fn count_by(&self, group: &GroupQuery) -> Result<Vec<GroupCount>> {
        let (sql, bind_values) = group.build_sql();
        let rows = query::bind_all(sqlx::query(&sql), bind_values)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut keys = Vec::with_capacity(group.keys.len());
            for (idx, column) in group.keys.iter().enumerate() {
                let value = match column.kind() {
                    ColumnKind::Integer => row
                        .try_get::<Option<i32>, _>(idx)
                        .map_err(Error::Database)?
                        .map(JsonValue::from),
                    ColumnKind::Text => row
                        .try_get::<Option<String>, _>(idx)
                        .map_err(Error::Database)?
                        .map(JsonValue::from),
                    ColumnKind::Timestamp => row
                        .try_get::<Option<DateTime<Utc>>, _>(idx)
                        .map_err(Error::Database)?
                        .map(|t| JsonValue::from(t.to_rfc3339())),
                };
                keys.push((*column, value.unwrap_or(JsonValue::Null)));
            }
            let count: i64 = row.try_get("count").map_err(Error::Database)?;
            out.push(GroupCount { keys, count });
        }
        Ok(out)
    }

    async fn count_created_since(&self, since: DateTime<Utc>) -> Result<u64> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM eo_certificates WHERE created_at >= $1")
                .bind(since)
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(to_count(total))
    }

    async fn user_status_counts(&self) -> Result<Vec<(UserStatus, i64)>> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS count FROM users GROUP BY status")
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let mut counts: Vec<(UserStatus, i64)> =
            UserStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for row in rows {
            let status: String = row.try_get("status").map_err(Error::Database)?;
            let count: i64 = row.try_get("count").map_err(Error::Database)?;
            match status.parse::<UserStatus>() {
                Ok(parsed) => {
                    if let Some(slot) = counts.iter_mut().find(|(s, _)| *s == parsed) {
                        slot.1 = count;
                    }
                }
                Err(_) => tracing::warn!(status = %status, "Ignoring unknown user status"),
            }
        }
        Ok(counts)
    }

    async fn begin_import(&self) -> Result<Box<dyn ImportTransaction>> {
        let tx = self.pool.begin().await.map_err(Error::Database)?;
        Ok(Box::new(PostgresImportTransaction::new(tx)))
    }
}
