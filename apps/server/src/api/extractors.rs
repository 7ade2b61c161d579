//! Custom Axum extractors.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

use crate::Error;

/// JSON request body whose rejections render as registry validation errors
/// instead of axum's plain-text responses.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> Error {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            Error::Validation("Expected Content-Type: application/json".to_string())
        }
        JsonRejection::JsonSyntaxError(e) => Error::Validation(format!("Malformed JSON: {e}")),
        JsonRejection::JsonDataError(e) => Error::Validation(format!("Invalid request body: {e}")),
        other => Error::Validation(other.body_text()),
    }
}

/// Certificate id from the `:id` path segment.
///
/// Non-numeric ids are validation errors rather than axum path rejections.
#[derive(Debug, Clone, Copy)]
pub struct CertificateId(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for CertificateId
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let axum::extract::Path(raw) =
            axum::extract::Path::<String>::from_request_parts(parts, state)
                .await
                .map_err(|e| Error::Validation(e.body_text()))?;
        raw.trim()
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .map(CertificateId)
            .ok_or_else(|| Error::Validation(format!("Invalid certificate id: '{raw}'")))
    }
}
