use super::BindValue;
use serde::Serialize;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::{Query, QueryAs, QueryScalar};

/// Bind values onto a plain `sqlx::query`.
pub fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    bind_values: Vec<BindValue>,
) -> Query<'q, Postgres, PgArguments> {
    for value in bind_values {
        query = match value {
            BindValue::Text(v) => query.bind(v),
            BindValue::Int(v) => query.bind(v),
            BindValue::BigInt(v) => query.bind(v),
            BindValue::BigIntArray(vs) => query.bind(vs),
        };
    }
    query
}

pub(crate) fn bind_all_as<'q, O>(
    mut query: QueryAs<'q, Postgres, O, PgArguments>,
    bind_values: Vec<BindValue>,
) -> QueryAs<'q, Postgres, O, PgArguments> {
    for value in bind_values {
        query = match value {
            BindValue::Text(v) => query.bind(v),
            BindValue::Int(v) => query.bind(v),
            BindValue::BigInt(v) => query.bind(v),
            BindValue::BigIntArray(vs) => query.bind(vs),
        };
    }
    query
}

pub(crate) fn bind_all_scalar<'q, O>(
    mut query: QueryScalar<'q, Postgres, O, PgArguments>,
    bind_values: Vec<BindValue>,
) -> QueryScalar<'q, Postgres, O, PgArguments> {
    for value in bind_values {
        query = match value {
            BindValue::Text(v) => query.bind(v),
            BindValue::Int(v) => query.bind(v),
            BindValue::BigInt(v) => query.bind(v),
            BindValue::BigIntArray(vs) => query.bind(vs),
        };
    }
    query
}

/// Paging metadata returned alongside a page of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let limit = limit.max(1);
        let total_pages = total.div_ceil(u64::from(limit));
        Self {
            page,
            limit,
            total,
            total_pages,
            has_next: u64::from(page) < total_pages,
            has_prev: page > 1,
        }
    }
}
