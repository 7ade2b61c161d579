//! Sort and page resolution.

use crate::config::QueryConfig;
use crate::db::columns::Column;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Case-insensitive `asc`/`desc`; anything else is `Desc`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("asc") => Self::Asc,
            _ => Self::Desc,
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderSpec {
    pub column: Column,
    pub direction: SortDirection,
}

impl Default for OrderSpec {
    fn default() -> Self {
        Self {
            column: Column::DEFAULT_SORT,
            direction: SortDirection::Desc,
        }
    }
}

impl OrderSpec {
    /// `ORDER BY` clause. `id` breaks ties so paging is deterministic.
    pub fn sql(&self) -> String {
        let dir = self.direction.sql();
        if self.column == Column::Id {
            format!(" ORDER BY id {dir}")
        } else {
            format!(" ORDER BY {} {dir} NULLS LAST, id {dir}", self.column.sql())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpec {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageSpec {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

impl PageSpec {
    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.limit)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub order: OrderSpec,
    pub page: PageSpec,
}

/// Resolve raw sort and paging parameters. Never fails.
///
/// An unknown `sort_by` falls back to the default order (year, descending);
/// an absent one keeps the requested direction. Non-positive or non-numeric
/// `page` becomes 1 and `limit` the default page size. `limit` is clamped to
/// the maximum.
pub fn resolve(
    sort_by: Option<&str>,
    sort_order: Option<&str>,
    page: Option<&str>,
    limit: Option<&str>,
    config: &QueryConfig,
) -> PageRequest {
    let order = match sort_by.filter(|key| !key.trim().is_empty()) {
        None => OrderSpec {
            column: Column::DEFAULT_SORT,
            direction: SortDirection::parse(sort_order),
        },
        Some(key) => match Column::resolve_sortable(key) {
            Some(column) => OrderSpec {
                column,
                direction: SortDirection::parse(sort_order),
            },
            None => {
                tracing::debug!(sort_by = key, "Unknown sort key, using default order");
                OrderSpec::default()
            }
        },
    };

    let page = positive(page).unwrap_or(1);
    let limit = positive(limit)
        .unwrap_or(config.default_page_size)
        .min(config.max_page_size);

    PageRequest {
        order,
        page: PageSpec { page, limit },
    }
}

fn positive(raw: Option<&str>) -> Option<u32> {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|n| *n >= 1)
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
}
