//! EO certificate registry
//!
//! Stores Executive Order certificates and exposes:
//! - Filtered, sorted and paginated queries over a fixed column registry
//! - Global search across the text columns
//! - Spreadsheet bulk import with per-row error reporting
//! - Dashboard aggregates
//!
//! The HTTP surface lives in [`api`]; persistence sits behind
//! [`db::CertificateStore`] so services run against Postgres or memory.

#![allow(
    clippy::too_many_arguments,      // Store constructors take the full column set
    clippy::large_enum_variant,      // Error carries sqlx errors inline
)]

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod request_context;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{Error, Result};
pub use state::AppState;
