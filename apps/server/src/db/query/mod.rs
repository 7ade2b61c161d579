//! SQL query builder for certificate listings.
//!
//! Builds parameterized SQL from a compiled [`Predicate`] and a resolved
//! [`PageRequest`]. Identifiers come exclusively from the column registry;
//! every user-supplied value is bound.

mod bind;
mod execute;
mod filter;
mod sort;

use bind::push_big_int;
pub use execute::{bind_all, Pagination};
pub(crate) use execute::{bind_all_as, bind_all_scalar};
pub(crate) use filter::{integer_value, text_value};
pub use filter::{Condition, Predicate};
pub use sort::{resolve, OrderSpec, PageRequest, PageSpec, SortDirection};

use crate::db::columns::{Column, TABLE};

/// Bind values for `sqlx` queries.
#[derive(Debug, Clone)]
pub enum BindValue {
    Text(String),
    Int(i32),
    BigInt(i64),
    BigIntArray(Vec<i64>),
}

/// Every column of `eo_certificates`, in table order.
pub const SELECT_COLUMNS: &str = r#"id, "EO Number", "Year", "Vehicle Make", "Vehicle Model", "Manufacturer", "Test Group", "Engine Size (L)", "Evaporative Family", "Vehicle Class", "Exhaust ECS Features", created_at, updated_at"#;

/// Page query over `eo_certificates`.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    predicate: Predicate,
    request: PageRequest,
}

impl QueryBuilder {
    pub fn new(predicate: Predicate, request: PageRequest) -> Self {
        Self { predicate, request }
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn request(&self) -> &PageRequest {
        &self.request
    }

    /// Page of rows: `SELECT ... WHERE ... ORDER BY ... LIMIT ... OFFSET ...`.
    pub fn build_sql(&self) -> (String, Vec<BindValue>) {
        let mut bind_params = Vec::new();
        let mut sql = format!("SELECT {SELECT_COLUMNS} FROM {TABLE}");
        self.predicate.push_where(&mut sql, &mut bind_params);
        sql.push_str(&self.request.order.sql());

        let limit_idx = push_big_int(&mut bind_params, i64::from(self.request.page.limit));
        let offset_idx = push_big_int(&mut bind_params, self.request.page.offset());
        sql.push_str(&format!(" LIMIT ${limit_idx} OFFSET ${offset_idx}"));

        (sql, bind_params)
    }

    /// Count of all rows matching the same predicate.
    pub fn build_count_sql(&self) -> (String, Vec<BindValue>) {
        let mut bind_params = Vec::new();
        let mut sql = format!("SELECT COUNT(*) FROM {TABLE}");
        self.predicate.push_where(&mut sql, &mut bind_params);
        (sql, bind_params)
    }
}

/// Ordering used by `count_by` queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupOrder {
    /// Largest groups first; ties broken by key ascending.
    CountDesc,
    /// Keys ascending, for time series.
    KeyAsc,
}

/// A group-by/count request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupQuery {
    pub keys: Vec<Column>,
    pub order: GroupOrder,
    pub limit: Option<u32>,
}

impl GroupQuery {
    pub fn new(keys: Vec<Column>, order: GroupOrder) -> Self {
        Self {
            keys,
            order,
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn build_sql(&self) -> (String, Vec<BindValue>) {
        let mut bind_params = Vec::new();
        let keys: Vec<&str> = self.keys.iter().map(|c| c.sql()).collect();
        let key_list = keys.join(", ");

        let mut sql = format!(
            "SELECT {key_list}, COUNT(*) AS count FROM {TABLE} GROUP BY {key_list}"
        );
        let key_order: Vec<String> = keys.iter().map(|k| format!("{k} ASC NULLS LAST")).collect();
        match self.order {
            GroupOrder::CountDesc => {
                sql.push_str(&format!(" ORDER BY count DESC, {}", key_order.join(", ")));
            }
            GroupOrder::KeyAsc => {
                sql.push_str(&format!(" ORDER BY {}", key_order.join(", ")));
            }
        }
        if let Some(limit) = self.limit {
            let idx = push_big_int(&mut bind_params, i64::from(limit));
            sql.push_str(&format!(" LIMIT ${idx}"));
        }

        (sql, bind_params)
    }
}

/// `SELECT DISTINCT` over a single column, nulls excluded.
pub fn build_distinct_sql(column: Column) -> String {
    let col = column.sql();
    format!("SELECT DISTINCT {col} FROM {TABLE} WHERE {col} IS NOT NULL ORDER BY {col} ASC")
}

/// Number of distinct non-null values of a column.
pub fn build_count_distinct_sql(column: Column) -> String {
    format!("SELECT COUNT(DISTINCT {}) FROM {TABLE}", column.sql())
}
