//! Bulk import of certificate spreadsheets.
//!
//! Rows are normalized, validated and inserted one at a time inside a single
//! enclosing transaction. A failing row is recorded and skipped; the rows
//! around it are still committed. Only a failure of the transaction itself
//! aborts the import.

pub mod normalize;
pub mod reader;

use crate::{
    config::ImportConfig,
    db::{CertificateStore, ImportTransaction},
    metrics::{self, IMPORT_DURATION_SECONDS},
    Error, Result,
};
use normalize::{normalize, RawRow};
use reader::{reader_for_path, NumberedRow};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// A row that could not be imported.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    /// 1-based position of the data row in the file (header excluded).
    pub row_index: usize,
    pub raw_row: RawRow,
    pub error_message: String,
}

/// Summary of a bulk import.
///
/// Every failure is counted in `error_count`; only the first few are kept in `errors`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub success_count: usize,
    pub error_count: usize,
    pub errors: Vec<RowError>,
}

impl ImportOutcome {
    fn record_success(mut self) -> Self {
        self.success_count += 1;
        self
    }

    fn record_error(mut self, error: RowError, max_reported: usize) -> Self {
        self.error_count += 1;
        if self.errors.len() < max_reported {
            self.errors.push(error);
        }
        self
    }
}

pub struct BulkImporter {
    store: Arc<dyn CertificateStore>,
    config: ImportConfig,
}

impl BulkImporter {
    pub fn new(store: Arc<dyn CertificateStore>, config: ImportConfig) -> Self {
        Self { store, config }
    }

    /// Import a workbook, CSV or JSON file. The reader is picked from the extension.
    #[tracing::instrument(skip(self), fields(path = %path.display()))]
    pub async fn import_file(&self, path: &Path) -> Result<ImportOutcome> {
        let reader = reader_for_path(path)?;
        let owned: PathBuf = path.to_path_buf();
        let max_rows = self.config.max_rows;

        let rows = tokio::task::spawn_blocking(move || reader.read(&owned, max_rows))
            .await
            .map_err(|e| Error::Internal(format!("Spreadsheet reader task failed: {e}")))??;

        self.import_rows(rows).await
    }

    /// Import already-parsed rows, each tagged with its position in the source file.
    pub async fn import_rows(&self, rows: Vec<NumberedRow>) -> Result<ImportOutcome> {
        if rows.len() > self.config.max_rows {
            return Err(Error::Validation(format!(
                "File exceeds the maximum of {} rows",
                self.config.max_rows
            )));
        }
        if rows.is_empty() {
            return Ok(ImportOutcome::default());
        }

        let started = Instant::now();
        let total = rows.len();
        let tx = self.store.begin_import().await?;

        match self.run(tx, rows).await {
            Ok(outcome) => {
                IMPORT_DURATION_SECONDS
                    .with_label_values(&["success"])
                    .observe(started.elapsed().as_secs_f64());
                metrics::record_import_rows(outcome.success_count, outcome.error_count);
                tracing::info!(
                    rows = total,
                    success = outcome.success_count,
                    errors = outcome.error_count,
                    "Bulk import finished"
                );
                Ok(outcome)
            }
            Err(err) => {
                IMPORT_DURATION_SECONDS
                    .with_label_values(&["error"])
                    .observe(started.elapsed().as_secs_f64());
                tracing::error!(error = %err, rows = total, "Bulk import aborted");
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        mut tx: Box<dyn ImportTransaction>,
        rows: Vec<NumberedRow>,
    ) -> Result<ImportOutcome> {
        let max_reported = self.config.max_reported_errors;
        let mut outcome = ImportOutcome::default();

        for (row_index, raw_row) in rows {
            match import_row(tx.as_mut(), &raw_row).await {
                Ok(()) => outcome = outcome.record_success(),
                Err(err) if err.is_row_scoped() => {
                    tracing::debug!(row_index, error = %err, "Import row rejected");
                    let error = RowError {
                        row_index,
                        raw_row,
                        error_message: row_message(&err),
                    };
                    outcome = outcome.record_error(error, max_reported);
                }
                Err(err) => {
                    if let Err(rollback_err) = tx.rollback().await {
                        tracing::warn!(error = %rollback_err, "Import rollback failed");
                    }
                    return Err(err);
                }
            }
        }

        tx.commit().await?;
        Ok(outcome)
    }
}

async fn import_row(tx: &mut dyn ImportTransaction, raw_row: &RawRow) -> Result<()> {
    let certificate = normalize(raw_row).validate()?;
    tx.insert(&certificate).await?;
    Ok(())
}

fn row_message(err: &Error) -> String {
    match err {
        Error::Validation(message) => message.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryCertificateStore;
    use serde_json::json;

    fn importer(store: &InMemoryCertificateStore) -> BulkImporter {
        BulkImporter::new(Arc::new(store.clone()), ImportConfig::default())
    }

    /// Number rows consecutively from 1.
    fn numbered(rows: Vec<RawRow>) -> Vec<NumberedRow> {
        rows.into_iter().enumerate().map(|(idx, row)| (idx + 1, row)).collect()
    }

    fn row(eo: &str, year: serde_json::Value) -> RawRow {
        json!({
            "EO Number": eo,
            "Year": year,
            "Vehicle Make": "Toyota",
            "Vehicle Model": "Corolla",
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[tokio::test]
    async fn failing_row_does_not_abort_batch() {
        let store = InMemoryCertificateStore::new();
        let rows = numbered(vec![
            row("A-1", json!(2020)),
            row("A-2", json!(2021)),
            row("A-3", json!("not a year")),
            row("A-4", json!(2022)),
            row("A-5", json!(2023)),
        ]);
        let outcome = importer(&store).import_rows(rows).await.unwrap();
        assert_eq!(outcome.success_count, 4);
        assert_eq!(outcome.error_count, 1);
        assert_eq!(outcome.errors[0].row_index, 3);
        assert!(outcome.errors[0].error_message.starts_with("Invalid year"));
        assert_eq!(store.len().await, 4);
    }

    #[tokio::test]
    async fn duplicates_are_recorded_per_row() {
        let store = InMemoryCertificateStore::new();
        let rows = numbered(vec![
            row("A-1", json!(2020)),
            row("A-1", json!(2020)),
            row("A-2", json!(2020)),
        ]);
        let outcome = importer(&store).import_rows(rows).await.unwrap();
        assert_eq!(outcome.success_count, 2);
        assert_eq!(outcome.errors[0].row_index, 2);
        assert_eq!(outcome.errors[0].error_message, "Duplicate EO Number: A-1");
        assert_eq!(outcome.errors[0].raw_row["EO Number"], json!("A-1"));
    }

    #[tokio::test]
    async fn reported_errors_are_capped_but_all_counted() {
        let store = InMemoryCertificateStore::new();
        let rows: Vec<RawRow> = (0..25)
            .map(|i| {
                json!({ "EO Number": format!("X-{i}") })
                    .as_object()
                    .cloned()
                    .unwrap()
            })
            .collect();
        let outcome = importer(&store).import_rows(numbered(rows)).await.unwrap();
        assert_eq!(outcome.error_count, 25);
        assert_eq!(outcome.errors.len(), 10);
        assert_eq!(
            outcome.errors[0].error_message,
            "Missing required fields: year, vehicleMake, vehicleModel"
        );
    }

    #[tokio::test]
    async fn empty_input_is_a_no_op() {
        let store = InMemoryCertificateStore::new();
        let outcome = importer(&store).import_rows(Vec::new()).await.unwrap();
        assert_eq!(outcome.success_count, 0);
        assert_eq!(outcome.error_count, 0);
    }

    #[tokio::test]
    async fn too_many_rows_are_rejected_before_insert() {
        let store = InMemoryCertificateStore::new();
        let importer = BulkImporter::new(
            Arc::new(store.clone()),
            ImportConfig {
                max_rows: 1,
                max_reported_errors: 10,
            },
        );
        let err = importer
            .import_rows(numbered(vec![row("A-1", json!(2020)), row("A-2", json!(2020))]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn errors_report_the_file_position_of_the_row() {
        let store = InMemoryCertificateStore::new();
        // Data row 2 was blank and dropped by the reader.
        let rows = vec![(1, row("A-1", json!(2020))), (3, row("A-2", json!("19x9")))];
        let outcome = importer(&store).import_rows(rows).await.unwrap();
        assert_eq!(outcome.success_count, 1);
        assert_eq!(outcome.errors[0].row_index, 3);
    }

    #[tokio::test]
    async fn csv_file_rows_keep_decimal_text_and_positions() {
        let store = InMemoryCertificateStore::new();
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        std::io::Write::write_all(
            &mut file,
            b"EO Number,Year,Vehicle Make,Vehicle Model,Engine Size (L),Test Group\n\
              A-1,2020,Ford,F150,2.0,1.10\n\
              ,,,,,\n\
              A-2,not a year,Ford,F250,,\n",
        )
        .unwrap();

        let outcome = importer(&store).import_file(file.path()).await.unwrap();
        assert_eq!(outcome.success_count, 1);
        assert_eq!(outcome.errors[0].row_index, 3);

        let stored = store.get(1).await.unwrap().unwrap();
        assert_eq!(stored.engine_size.as_deref(), Some("2.0"));
        assert_eq!(stored.test_group.as_deref(), Some("1.10"));
    }
}
