//! Certificate service - listing, search and CRUD
//!
//! Orchestrates certificate operations by:
//! - Compiling request filters into a predicate via the column registry
//! - Running the count + paged fetch against the store
//! - Validating writes and mapping store outcomes to domain errors

use crate::{
    config::QueryConfig,
    db::{
        columns::Column,
        query::{self, Pagination, Predicate, QueryBuilder},
        CertificateStore,
    },
    metrics::{CERTIFICATE_QUERIES_TOTAL, CERTIFICATE_QUERY_TOTAL_ROWS, CERTIFICATE_WRITES_TOTAL},
    models::{CandidateRecord, Certificate, CertificateFields, CertificatePatchInput},
    Error, Result,
};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;

/// Reserved query parameters; everything else is treated as a filter.
const SORT_BY: &str = "sortBy";
const SORT_ORDER: &str = "sortOrder";
const PAGE: &str = "page";
const LIMIT: &str = "limit";
const SEARCH_TERM: &str = "q";

/// Raw listing parameters as received from a caller.
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    pub filters: Vec<(String, String)>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    pub term: Option<String>,
}

impl ListParams {
    /// Split query-string items into sort/page parameters, the search term and filters.
    ///
    /// Repeated keys keep the last value for reserved parameters.
    pub fn from_query_items(items: &[(String, String)]) -> Self {
        let mut params = ListParams::default();
        for (key, value) in items {
            match key.as_str() {
                SORT_BY | "sort_by" => params.sort_by = Some(value.clone()),
                SORT_ORDER | "sort_order" => params.sort_order = Some(value.clone()),
                PAGE => params.page = Some(value.clone()),
                LIMIT => params.limit = Some(value.clone()),
                SEARCH_TERM => params.term = Some(value.clone()),
                _ => params.filters.push((key.clone(), value.clone())),
            }
        }
        params
    }

    fn page_request(&self, config: &QueryConfig) -> query::PageRequest {
        query::resolve(
            self.sort_by.as_deref(),
            self.sort_order.as_deref(),
            self.page.as_deref(),
            self.limit.as_deref(),
            config,
        )
    }
}

/// One page of certificates plus paging metadata.
#[derive(Debug, Clone, Serialize)]
pub struct CertificatePage {
    pub data: Vec<Certificate>,
    pub pagination: Pagination,
}

pub struct CertificateService {
    store: Arc<dyn CertificateStore>,
    query_config: QueryConfig,
}

impl CertificateService {
    pub fn new(store: Arc<dyn CertificateStore>, query_config: QueryConfig) -> Self {
        Self {
            store,
            query_config,
        }
    }

    pub fn store(&self) -> &Arc<dyn CertificateStore> {
        &self.store
    }

    /// List certificates matching per-field filters.
    #[tracing::instrument(skip(self, params), fields(filters = params.filters.len()))]
    pub async fn list(&self, params: &ListParams) -> Result<CertificatePage> {
        let predicate = Predicate::compile(params.filters.iter().map(|(k, v)| (k, v)));
        self.run("list", predicate, params).await
    }

    /// Global search: one term across every searchable text column.
    ///
    /// A blank term lists everything.
    #[tracing::instrument(skip(self, params))]
    pub async fn search(&self, term: &str, params: &ListParams) -> Result<CertificatePage> {
        self.run("search", Predicate::global_search(term), params)
            .await
    }

    async fn run(
        &self,
        mode: &'static str,
        predicate: Predicate,
        params: &ListParams,
    ) -> Result<CertificatePage> {
        let request = params.page_request(&self.query_config);
        let query = QueryBuilder::new(predicate, request);

        // Not wrapped in one transaction; total may drift from rows under concurrent writes.
        let total = self.store.count(&query).await?;
        let data = if total == 0 {
            Vec::new()
        } else {
            self.store.fetch_page(&query).await?
        };

        CERTIFICATE_QUERIES_TOTAL.with_label_values(&[mode]).inc();
        CERTIFICATE_QUERY_TOTAL_ROWS
            .with_label_values(&[mode])
            .observe(total as f64);

        tracing::debug!(mode, total, returned = data.len(), "Certificate query executed");

        Ok(CertificatePage {
            data,
            pagination: Pagination::new(request.page.page, request.page.limit, total),
        })
    }

    pub async fn get(&self, id: i64) -> Result<Certificate> {
        self.store
            .get(id)
            .await?
            .ok_or(Error::CertificateNotFound { id })
    }

    #[tracing::instrument(skip(self, fields))]
    pub async fn create(&self, fields: CertificateFields) -> Result<Certificate> {
        let new = CandidateRecord::from(fields).validate()?;
        let result = self.store.insert(&new).await;
        record_write("create", &result);
        let created = result?;
        tracing::info!(id = created.id, eo_number = %created.eo_number, "Certificate created");
        Ok(created)
    }

    /// Partial update. Absent fields are left unchanged.
    #[tracing::instrument(skip(self, input))]
    pub async fn update(&self, id: i64, input: CertificatePatchInput) -> Result<Certificate> {
        let patch = input.validate()?;
        if patch.is_empty() {
            return self.get(id).await;
        }
        let result = self
            .store
            .update(id, &patch)
            .await
            .and_then(|row| row.ok_or(Error::CertificateNotFound { id }));
        record_write("update", &result);
        result
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = self.store.delete(id).await.and_then(|deleted| {
            if deleted {
                Ok(())
            } else {
                Err(Error::CertificateNotFound { id })
            }
        });
        record_write("delete", &result);
        result
    }

    /// Delete every listed id that exists. Returns the number removed.
    #[tracing::instrument(skip(self, ids), fields(requested = ids.len()))]
    pub async fn bulk_delete(&self, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Err(Error::Validation(
                "ids must contain at least one certificate id".to_string(),
            ));
        }
        let mut unique = ids.to_vec();
        unique.sort_unstable();
        unique.dedup();

        let result = self.store.delete_many(&unique).await;
        record_write("bulk_delete", &result);
        let deleted = result?;
        tracing::info!(deleted, "Certificates bulk deleted");
        Ok(deleted)
    }

    /// Distinct values of every filterable column, keyed by field name.
    pub async fn filter_options(&self) -> Result<Map<String, JsonValue>> {
        let mut options = Map::new();
        for column in Column::FILTERABLE {
            let values = self.store.distinct_values(column).await?;
            options.insert(column.field_name().to_string(), JsonValue::Array(values));
        }
        Ok(options)
    }
}

fn record_write<T>(operation: &str, result: &Result<T>) {
    let status = match result {
        Ok(_) => "success",
        Err(Error::Duplicate { .. }) => "duplicate",
        Err(Error::CertificateNotFound { .. }) => "not_found",
        Err(_) => "error",
    };
    CERTIFICATE_WRITES_TOTAL
        .with_label_values(&[operation, status])
        .inc();
}
