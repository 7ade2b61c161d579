//! Database layer - column registry, query building and storage backends

pub mod columns;
pub mod memory;
pub mod query;
pub mod store;
pub mod traits;
pub mod transaction;

pub use columns::Column;
pub use memory::InMemoryCertificateStore;
pub use store::PostgresCertificateStore;
pub use traits::{CertificateStore, GroupCount, ImportTransaction};
pub use transaction::PostgresImportTransaction;
