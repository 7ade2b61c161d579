//! Route tables. Handlers live in [`crate::api::handlers`].

pub mod certificates;
pub mod dashboard;
pub mod metrics;
