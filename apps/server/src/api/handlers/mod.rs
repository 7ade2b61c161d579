//! Request handlers for API endpoints
//!
//! Handlers extract and validate the request, call a service, and shape the
//! response. Errors propagate as [`crate::Error`] and render through its
//! `IntoResponse` impl.

pub mod certificates;
pub mod dashboard;
pub mod metrics;

pub use certificates::*;
pub use dashboard::*;
pub use metrics::*;
