//! Dashboard handlers

use axum::{
    extract::State,
    response::{IntoResponse, Json},
};

use crate::{models::Principal, state::AppState, Result};

/// GET /api/dashboard/stats
///
/// Admins additionally receive recent-activity and user-status figures.
pub async fn dashboard_stats(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<impl IntoResponse> {
    let dashboard = state.stats.dashboard(principal.is_admin()).await?;
    Ok(Json(dashboard))
}
