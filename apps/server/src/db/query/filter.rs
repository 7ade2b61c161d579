//! Filter compiler.
//!
//! Turns loosely-typed request filters into a typed, conjunctive [`Predicate`].
//! A predicate renders to parameterized SQL for PostgreSQL and can also be
//! evaluated directly against a [`Certificate`] for non-SQL stores.

use super::bind::{escape_like_pattern, push_int, push_text};
use super::BindValue;
use crate::db::columns::{Column, ColumnKind};
use crate::models::Certificate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Case-insensitive substring match on a text column.
    Contains { column: Column, term: String },
    /// Exact match on an integer column.
    Equals { column: Column, value: i32 },
    /// Case-insensitive substring match on any of the given text columns.
    AnyContains {
        columns: &'static [Column],
        term: String,
    },
}

/// Conjunction of [`Condition`]s. An empty predicate matches every row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Predicate {
    conditions: Vec<Condition>,
}

impl Predicate {
    /// Predicate matching every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Compile per-field filters.
    ///
    /// - unknown or non-filterable keys are ignored
    /// - absent, empty and whitespace-only values add no condition
    /// - integer columns need a parseable value; otherwise the filter is dropped
    /// - text columns become case-insensitive "contains" conditions
    pub fn compile<I, K, V>(filters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut conditions = Vec::new();

        for (key, value) in filters {
            let key = key.as_ref();
            let value = value.as_ref().trim();
            if value.is_empty() {
                continue;
            }

            let Some(column) = Column::resolve_filterable(key) else {
                tracing::debug!(key, "Ignoring unknown filter key");
                continue;
            };

            match column.kind() {
                ColumnKind::Integer => match value.parse::<i32>() {
                    Ok(parsed) => conditions.push(Condition::Equals {
                        column,
                        value: parsed,
                    }),
                    Err(_) => {
                        tracing::debug!(key, value, "Dropping unparseable numeric filter");
                    }
                },
                ColumnKind::Text => conditions.push(Condition::Contains {
                    column,
                    term: value.to_string(),
                }),
                ColumnKind::Timestamp => {}
            }
        }

        conditions.sort_by_key(condition_order);
        Self { conditions }
    }

    /// Global search: one term matched against every searchable text column (OR).
    pub fn global_search(term: &str) -> Self {
        let term = term.trim();
        if term.is_empty() {
            return Self::all();
        }
        Self {
            conditions: vec![Condition::AnyContains {
                columns: &Column::SEARCHABLE,
                term: term.to_string(),
            }],
        }
    }

    /// Combine two predicates with AND.
    pub fn and(mut self, other: Predicate) -> Self {
        self.conditions.extend(other.conditions);
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Append ` WHERE ...` (or nothing, for an empty predicate).
    pub fn push_where(&self, sql: &mut String, bind_params: &mut Vec<BindValue>) {
        if self.conditions.is_empty() {
            return;
        }
        let clauses: Vec<String> = self
            .conditions
            .iter()
            .map(|c| condition_sql(c, bind_params))
            .collect();
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }

    /// Evaluate the predicate against an in-memory record.
    pub fn matches(&self, certificate: &Certificate) -> bool {
        self.conditions.iter().all(|c| condition_matches(c, certificate))
    }
}

fn condition_order(condition: &Condition) -> (Column, u8) {
    match condition {
        Condition::Equals { column, .. } => (*column, 0),
        Condition::Contains { column, .. } => (*column, 1),
        Condition::AnyContains { .. } => (Column::Id, 2),
    }
}

fn contains_sql(column: Column, term: &str, bind_params: &mut Vec<BindValue>) -> String {
    let idx = push_text(bind_params, format!("%{}%", escape_like_pattern(term)));
    format!("{} ILIKE ${} ESCAPE E'\\\\'", column.sql(), idx)
}

fn condition_sql(condition: &Condition, bind_params: &mut Vec<BindValue>) -> String {
    match condition {
        Condition::Contains { column, term } => contains_sql(*column, term, bind_params),
        Condition::Equals { column, value } => {
            let idx = push_int(bind_params, *value);
            format!("{} = ${}", column.sql(), idx)
        }
        Condition::AnyContains { columns, term } => {
            // One bind shared by every column.
            let idx = push_text(bind_params, format!("%{}%", escape_like_pattern(term)));
            let parts: Vec<String> = columns
                .iter()
                .map(|c| format!("{} ILIKE ${} ESCAPE E'\\\\'", c.sql(), idx))
                .collect();
            format!("({})", parts.join(" OR "))
        }
    }
}

fn condition_matches(condition: &Condition, certificate: &Certificate) -> bool {
    match condition {
        Condition::Contains { column, term } => text_contains(certificate, *column, term),
        Condition::Equals { column, value } => integer_value(certificate, *column) == Some(*value),
        Condition::AnyContains { columns, term } => columns
            .iter()
            .any(|c| text_contains(certificate, *c, term)),
    }
}

fn text_contains(certificate: &Certificate, column: Column, term: &str) -> bool {
    text_value(certificate, column)
        .map(|v| v.to_lowercase().contains(&term.to_lowercase()))
        .unwrap_or(false)
}

/// Text value of a column, `None` for SQL NULL or non-text columns.
pub(crate) fn text_value(certificate: &Certificate, column: Column) -> Option<&str> {
    match column {
        Column::EoNumber => Some(&certificate.eo_number),
        Column::VehicleMake => Some(&certificate.vehicle_make),
        Column::VehicleModel => Some(&certificate.vehicle_model),
        Column::Manufacturer => certificate.manufacturer.as_deref(),
        Column::TestGroup => certificate.test_group.as_deref(),
        Column::EngineSize => certificate.engine_size.as_deref(),
        Column::EvaporativeFamily => certificate.evaporative_family.as_deref(),
        Column::VehicleClass => certificate.vehicle_class.as_deref(),
        Column::ExhaustEcsFeatures => certificate.exhaust_ecs_features.as_deref(),
        Column::Id | Column::Year | Column::CreatedAt | Column::UpdatedAt => None,
    }
}

pub(crate) fn integer_value(certificate: &Certificate, column: Column) -> Option<i32> {
    match column {
        Column::Year => Some(certificate.year),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn certificate() -> Certificate {
        Certificate {
            id: 1,
            eo_number: "A-001-0001".to_string(),
            year: 2020,
            vehicle_make: "Toyota".to_string(),
            vehicle_model: "Corolla 50%".to_string(),
            manufacturer: Some("Toyota Motor Corp".to_string()),
            test_group: None,
            engine_size: Some("1.8".to_string()),
            evaporative_family: None,
            vehicle_class: Some("PC".to_string()),
            exhaust_ecs_features: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn build(predicate: &Predicate) -> (String, Vec<BindValue>) {
        let mut sql = String::from("SELECT 1 FROM eo_certificates");
        let mut binds = Vec::new();
        predicate.push_where(&mut sql, &mut binds);
        (sql, binds)
    }

    #[test]
    fn empty_and_blank_filters_add_no_clause() {
        let predicate = Predicate::compile([("make", ""), ("model", "   ")]);
        assert!(predicate.is_empty());
        let (sql, binds) = build(&predicate);
        assert_eq!(sql, "SELECT 1 FROM eo_certificates");
        assert!(binds.is_empty());
    }

    #[test]
    fn compiles_year_and_text_filters_with_and() {
        let predicate = Predicate::compile([("make", "toy"), ("year", "2020")]);
        let (sql, binds) = build(&predicate);
        assert_eq!(
            sql,
            "SELECT 1 FROM eo_certificates WHERE \"Year\" = $1 AND \"Vehicle Make\" ILIKE $2 ESCAPE E'\\\\'"
        );
        assert!(matches!(binds[0], BindValue::Int(2020)));
        assert!(matches!(&binds[1], BindValue::Text(p) if p == "%toy%"));
    }

    #[test]
    fn unparseable_year_is_dropped() {
        let predicate = Predicate::compile([("year", "twenty"), ("make", "Toyota")]);
        assert_eq!(
            predicate.conditions(),
            &[Condition::Contains {
                column: Column::VehicleMake,
                term: "Toyota".to_string()
            }]
        );
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let predicate = Predicate::compile([("\"Year\" OR 1=1 --", "2020"), ("created_at", "x")]);
        assert!(predicate.is_empty());
    }

    #[test]
    fn metacharacters_are_bound_not_interpolated() {
        let predicate = Predicate::compile([("eo_number", "'; DROP TABLE users; --%")]);
        let (sql, binds) = build(&predicate);
        assert!(!sql.contains("DROP"));
        assert!(matches!(&binds[0], BindValue::Text(p) if p == "%'; DROP TABLE users; --\\%%"));
    }

    #[test]
    fn global_search_ors_searchable_columns_with_one_bind() {
        let (sql, binds) = build(&Predicate::global_search("corolla"));
        assert_eq!(binds.len(), 1);
        assert_eq!(sql.matches(" OR ").count(), Column::SEARCHABLE.len() - 1);
        assert!(sql.contains("\"Evaporative Family\" ILIKE $1"));
    }

    #[test]
    fn matches_is_case_insensitive_and_literal() {
        let cert = certificate();
        assert!(Predicate::compile([("make", "TOY"), ("year", "2020")]).matches(&cert));
        assert!(!Predicate::compile([("year", "2021")]).matches(&cert));
        assert!(Predicate::compile([("model", "50%")]).matches(&cert));
        assert!(!Predicate::compile([("model", "5_%")]).matches(&cert));
        assert!(!Predicate::compile([("test_group", "a")]).matches(&cert));
        assert!(Predicate::global_search("motor").matches(&cert));
        assert!(Predicate::all().matches(&cert));
    }
}
