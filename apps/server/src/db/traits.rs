//! Core traits for certificate storage backends

use crate::{
    db::columns::Column,
    db::query::{GroupQuery, QueryBuilder},
    models::{Certificate, CertificatePatch, NewCertificate, UserStatus},
    Result,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value as JsonValue;

/// One row of a group-by/count aggregation.
///
/// `keys` holds the group key values in the order of [`GroupQuery::keys`];
/// a null key is reported as `JsonValue::Null`.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupCount {
    pub keys: Vec<(Column, JsonValue)>,
    pub count: i64,
}

impl Serialize for GroupCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.keys.len() + 1))?;
        for (column, value) in &self.keys {
            map.serialize_entry(column.field_name(), value)?;
        }
        map.serialize_entry("count", &self.count)?;
        map.end()
    }
}

/// Storage operations for EO certificates.
///
/// Any backend (PostgreSQL, in-memory, ...) can implement this trait.
/// Unique violations on `EO Number` must surface as [`crate::Error::Duplicate`].
#[async_trait]
pub trait CertificateStore: Send + Sync {
    /// Fetch one page of rows for the query's predicate and ordering.
    async fn fetch_page(&self, query: &QueryBuilder) -> Result<Vec<Certificate>>;

    /// Count every row matching the query's predicate, ignoring paging.
    async fn count(&self, query: &QueryBuilder) -> Result<u64>;

    /// Read one certificate. `Ok(None)` when it does not exist.
    async fn get(&self, id: i64) -> Result<Option<Certificate>>;

    async fn insert(&self, certificate: &NewCertificate) -> Result<Certificate>;

    /// Apply a partial update. `Ok(None)` when the id does not exist.
    async fn update(&self, id: i64, patch: &CertificatePatch) -> Result<Option<Certificate>>;

    /// Delete one certificate. Returns whether a row was removed.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Delete many certificates; unknown ids are skipped. Returns rows removed.
    async fn delete_many(&self, ids: &[i64]) -> Result<u64>;

    /// Distinct non-null values of a column, ascending.
    async fn distinct_values(&self, column: Column) -> Result<Vec<JsonValue>>;

    /// Number of distinct non-null values of a column.
    async fn count_distinct(&self, column: Column) -> Result<u64>;

    async fn count_by(&self, query: &GroupQuery) -> Result<Vec<GroupCount>>;

    /// Number of certificates created at or after `since`.
    async fn count_created_since(&self, since: DateTime<Utc>) -> Result<u64>;

    /// Number of users per status. Every status is present, zero when absent.
    async fn user_status_counts(&self) -> Result<Vec<(UserStatus, i64)>>;

    /// Begin the enclosing transaction of a bulk import.
    async fn begin_import(&self) -> Result<Box<dyn ImportTransaction>>;
}

/// Transaction scope for a bulk import.
///
/// Each `insert` is isolated: a rejected row leaves the transaction usable and
/// earlier rows intact. Nothing is visible to other readers until `commit`.
#[async_trait]
pub trait ImportTransaction: Send {
    /// Insert one row.
    ///
    /// Row-scoped failures (validation, duplicates, constraint violations) are
    /// returned as errors for which [`crate::Error::is_row_scoped`] holds; any
    /// other error means the transaction is no longer usable.
    async fn insert(&mut self, certificate: &NewCertificate) -> Result<Certificate>;

    /// Commit every successful insert.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discard every insert.
    async fn rollback(self: Box<Self>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_count_serializes_field_names() {
        let row = GroupCount {
            keys: vec![(Column::Manufacturer, JsonValue::Null)],
            count: 3,
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json, serde_json::json!({"manufacturer": null, "count": 3}));
    }
}
