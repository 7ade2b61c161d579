use crate::api::handlers::dashboard;
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn dashboard_routes() -> Router<AppState> {
    Router::new().route("/dashboard/stats", get(dashboard::dashboard_stats))
}
