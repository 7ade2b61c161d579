//! Authentication / Authorization primitives.
//!
//! The registry does not issue tokens or manage accounts. It validates a
//! bearer token on each request, turns it into a [`Principal`] and enforces
//! two rules: the account must be approved, and writes require the admin role.

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, Method},
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    config::AuthConfig,
    models::{Principal, Role, UserStatus},
    state::AppState,
    Error,
};

/// JWT claims understood by [`JwtAuthProvider`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub status: UserStatus,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    MissingToken,
    InvalidToken(String),
    Misconfigured(String),
}

impl From<AuthError> for Error {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken => Error::Unauthorized("Missing bearer token".to_string()),
            AuthError::InvalidToken(msg) => {
                Error::Unauthorized(format!("Invalid bearer token: {msg}"))
            }
            AuthError::Misconfigured(msg) => {
                Error::Internal(format!("Authentication misconfigured: {msg}"))
            }
        }
    }
}

/// Resolves request headers into an authenticated principal.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthError>;
}

/// Validates HS256 bearer tokens signed with a shared secret.
pub struct JwtAuthProvider {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtAuthProvider {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        if config.jwt_secret.is_empty() {
            return Err(AuthError::Misconfigured(
                "auth.jwt_secret is not set".to_string(),
            ));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.leeway = 60;
        if let Some(issuer) = &config.jwt_issuer {
            validation.set_issuer(&[issuer]);
        }

        Ok(Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        })
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let Some(authz) = headers.get(header::AUTHORIZATION) else {
        return Err(AuthError::MissingToken);
    };
    let authz = authz.to_str().map_err(|_| {
        AuthError::InvalidToken("Authorization header is not valid UTF-8".to_string())
    })?;
    authz
        .strip_prefix("Bearer ")
        .or_else(|| authz.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            AuthError::InvalidToken("Authorization header must be 'Bearer <token>'".to_string())
        })
}

#[async_trait]
impl AuthProvider for JwtAuthProvider {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        let token = bearer_token(headers)?;
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        Ok(Principal {
            id: data.claims.sub,
            role: data.claims.role,
            status: data.claims.status,
        })
    }
}

/// Every request runs as an approved local admin. For development only.
pub struct DisabledAuthProvider;

#[async_trait]
impl AuthProvider for DisabledAuthProvider {
    async fn authenticate(&self, _headers: &HeaderMap) -> Result<Principal, AuthError> {
        Ok(Principal {
            id: "local".to_string(),
            role: Role::Admin,
            status: UserStatus::Approved,
        })
    }
}

#[derive(Clone)]
pub struct AuthManager {
    provider: Arc<dyn AuthProvider>,
    public_paths: Arc<Vec<String>>,
}

impl AuthManager {
    pub fn new(provider: Arc<dyn AuthProvider>, public_paths: Vec<String>) -> Self {
        Self {
            provider,
            public_paths: Arc::new(public_paths),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let provider: Arc<dyn AuthProvider> = if config.enabled {
            Arc::new(JwtAuthProvider::new(config)?)
        } else {
            tracing::warn!("Authentication is disabled; all requests run as admin");
            Arc::new(DisabledAuthProvider)
        };
        Ok(Self::new(provider, config.public_paths.clone()))
    }

    pub fn is_public_path(&self, path: &str) -> bool {
        self.public_paths.iter().any(|p| p == path)
    }

    /// Authenticate and require an approved account.
    pub async fn authorize(&self, headers: &HeaderMap) -> crate::Result<Principal> {
        let principal = self.provider.authenticate(headers).await?;
        match principal.status {
            UserStatus::Approved => Ok(principal),
            UserStatus::Pending => Err(Error::Forbidden(
                "Account is pending approval".to_string(),
            )),
            UserStatus::Denied => Err(Error::Forbidden("Account access denied".to_string())),
        }
    }
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let path = req.uri().path();
    if state.auth.is_public_path(path) || req.method() == Method::OPTIONS {
        return next.run(req).await;
    }

    match state.auth.authorize(req.headers()).await {
        Ok(principal) => {
            tracing::debug!(user_id = %principal.id, role = ?principal.role, "Request authenticated");
            req.extensions_mut().insert::<Principal>(principal);
            next.run(req).await
        }
        Err(err) => {
            tracing::debug!(error = %err, path = %req.uri().path(), "Request rejected by auth");
            err.into_response()
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or_else(|| Error::Unauthorized("Missing bearer token".to_string()))
    }
}

/// An approved principal with the admin role.
#[derive(Debug, Clone)]
pub struct AdminPrincipal(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for AdminPrincipal
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let principal = Principal::from_request_parts(parts, state).await?;
        if !principal.is_admin() {
            return Err(Error::Forbidden("Admin role required".to_string()));
        }
        Ok(AdminPrincipal(principal))
    }
}
