//! Service layer - business logic between the HTTP API and the store

pub mod certificates;
pub mod import;
pub mod stats;

pub use certificates::{CertificatePage, CertificateService, ListParams};
pub use import::{BulkImporter, ImportOutcome, RowError};
pub use stats::{Dashboard, StatsService};
