//! Certificate handlers

use crate::{
    api::extractors::{CertificateId, JsonBody},
    auth::AdminPrincipal,
    models::{CertificateFields, CertificatePatchInput, Principal},
    services::{ImportOutcome, ListParams},
    state::AppState,
    Error, Result,
};
use axum::{
    extract::{multipart::MultipartRejection, Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::io::Write;
use tempfile::NamedTempFile;

/// Multipart field carrying the uploaded spreadsheet.
const UPLOAD_FIELD: &str = "file";

/// GET /api/certificates
pub async fn list_certificates(
    State(state): State<AppState>,
    _principal: Principal,
    Query(items): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse> {
    let params = ListParams::from_query_items(&items);
    let page = state.certificates.list(&params).await?;
    Ok(Json(page))
}

/// GET /api/certificates/search?q=
pub async fn search_certificates(
    State(state): State<AppState>,
    _principal: Principal,
    Query(items): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse> {
    let params = ListParams::from_query_items(&items);
    let term = params.term.clone().unwrap_or_default();
    let page = state.certificates.search(&term, &params).await?;
    Ok(Json(page))
}

/// GET /api/certificates/filter-options
pub async fn filter_options(
    State(state): State<AppState>,
    _principal: Principal,
) -> Result<impl IntoResponse> {
    Ok(Json(state.certificates.filter_options().await?))
}

/// GET /api/certificates/:id
pub async fn get_certificate(
    State(state): State<AppState>,
    _principal: Principal,
    CertificateId(id): CertificateId,
) -> Result<impl IntoResponse> {
    Ok(Json(state.certificates.get(id).await?))
}

/// POST /api/certificates
pub async fn create_certificate(
    State(state): State<AppState>,
    AdminPrincipal(admin): AdminPrincipal,
    JsonBody(fields): JsonBody<CertificateFields>,
) -> Result<impl IntoResponse> {
    let created = state.certificates.create(fields).await?;
    tracing::info!(admin = %admin.id, id = created.id, "Certificate created via API");
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /api/certificates/:id
pub async fn update_certificate(
    State(state): State<AppState>,
    AdminPrincipal(admin): AdminPrincipal,
    CertificateId(id): CertificateId,
    JsonBody(input): JsonBody<CertificatePatchInput>,
) -> Result<impl IntoResponse> {
    let updated = state.certificates.update(id, input).await?;
    tracing::info!(admin = %admin.id, id, "Certificate updated via API");
    Ok(Json(updated))
}

/// DELETE /api/certificates/:id
pub async fn delete_certificate(
    State(state): State<AppState>,
    AdminPrincipal(admin): AdminPrincipal,
    CertificateId(id): CertificateId,
) -> Result<impl IntoResponse> {
    state.certificates.delete(id).await?;
    tracing::info!(admin = %admin.id, id, "Certificate deleted via API");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    #[serde(default)]
    pub ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteResponse {
    pub deleted_count: u64,
}

/// POST /api/certificates/bulk-delete
pub async fn bulk_delete_certificates(
    State(state): State<AppState>,
    AdminPrincipal(admin): AdminPrincipal,
    JsonBody(request): JsonBody<BulkDeleteRequest>,
) -> Result<impl IntoResponse> {
    let deleted_count = state.certificates.bulk_delete(&request.ids).await?;
    tracing::info!(admin = %admin.id, deleted_count, "Certificates bulk deleted via API");
    Ok(Json(BulkDeleteResponse { deleted_count }))
}

/// POST /api/certificates/import (multipart, field `file`)
///
/// The upload is spooled to a temporary file that is removed when the
/// handler returns, whatever the outcome.
pub async fn import_certificates(
    State(state): State<AppState>,
    AdminPrincipal(admin): AdminPrincipal,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse> {
    let mut multipart =
        multipart.map_err(|e| Error::Validation(format!("Expected a multipart upload: {e}")))?;
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| Error::Validation(format!("Failed to read upload: {e}")))?;
        upload = Some((file_name, bytes));
        break;
    }

    let Some((file_name, bytes)) = upload else {
        return Err(Error::Validation(format!(
            "Missing multipart field '{UPLOAD_FIELD}'"
        )));
    };

    let extension = std::path::Path::new(&file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();

    let size = bytes.len();
    let temp = tokio::task::spawn_blocking(move || spool_upload(&extension, &bytes))
        .await
        .map_err(|e| Error::Internal(format!("Upload spool task failed: {e}")))??;

    tracing::info!(
        admin = %admin.id,
        file_name = %file_name,
        size,
        "Bulk import started"
    );

    let outcome: ImportOutcome = state.importer.import_file(temp.path()).await?;
    Ok(Json(outcome))
}

/// Write an upload to a temporary file carrying the original extension.
fn spool_upload(extension: &str, bytes: &[u8]) -> Result<NamedTempFile> {
    let mut temp = tempfile::Builder::new()
        .prefix("eo-import-")
        .suffix(extension)
        .tempfile()
        .map_err(|e| Error::Internal(format!("Failed to create temporary file: {e}")))?;
    temp.write_all(bytes)
        .and_then(|_| temp.flush())
        .map_err(|e| Error::Internal(format!("Failed to write temporary file: {e}")))?;
    Ok(temp)
}
