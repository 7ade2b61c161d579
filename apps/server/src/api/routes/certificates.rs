//! Certificate routes, mounted under `/api`.

use crate::api::handlers::certificates;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn certificate_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/certificates",
            get(certificates::list_certificates).post(certificates::create_certificate),
        )
        .route("/certificates/search", get(certificates::search_certificates))
        .route(
            "/certificates/filter-options",
            get(certificates::filter_options),
        )
        .route(
            "/certificates/bulk-delete",
            post(certificates::bulk_delete_certificates),
        )
        .route(
            "/certificates/import",
            post(certificates::import_certificates),
        )
        .route(
            "/certificates/:id",
            get(certificates::get_certificate)
                .put(certificates::update_certificate)
                .delete(certificates::delete_certificate),
        )
}
