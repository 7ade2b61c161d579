pub mod assertions;
pub mod fixtures;
pub mod postgres;

use anyhow::Context as _;
use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode},
    Router,
};
use eo_registry::{api::create_router, db::InMemoryCertificateStore, AppState, Config};
use futures::FutureExt as _;
use std::sync::Arc;
use tower::ServiceExt as _;

// Re-export commonly used items
pub use assertions::*;
pub use fixtures::*;

const MULTIPART_BOUNDARY: &str = "eo-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: InMemoryCertificateStore,
}

impl TestApp {
    pub async fn new() -> anyhow::Result<Self> {
        Self::new_with_config(|_| {}).await
    }

    pub async fn new_with_config(configure: impl FnOnce(&mut Config)) -> anyhow::Result<Self> {
        init_tracing();

        let mut config = test_config();
        configure(&mut config);

        let store = InMemoryCertificateStore::new();
        let state = AppState::with_store(config, Arc::new(store.clone()))
            .context("initialize AppState")?;
        let router = create_router(state.clone());

        Ok(Self {
            router,
            state,
            store,
        })
    }

    /// Send a JSON request as an approved admin.
    pub async fn request(
        &self,
        method: Method,
        path_and_query: &str,
        body: Option<Bytes>,
    ) -> anyhow::Result<(StatusCode, HeaderMap, Bytes)> {
        let auth = bearer(&admin_token());
        self.request_with_extra_headers(method, path_and_query, body, &[("authorization", &auth)])
            .await
    }

    /// Send a JSON request with a caller-supplied token.
    pub async fn request_as(
        &self,
        token: &str,
        method: Method,
        path_and_query: &str,
        body: Option<Bytes>,
    ) -> anyhow::Result<(StatusCode, HeaderMap, Bytes)> {
        let auth = bearer(token);
        self.request_with_extra_headers(method, path_and_query, body, &[("authorization", &auth)])
            .await
    }

    /// Send a request with only the given headers on top of the JSON defaults.
    pub async fn request_with_extra_headers(
        &self,
        method: Method,
        path_and_query: &str,
        body: Option<Bytes>,
        extra_headers: &[(&str, &str)],
    ) -> anyhow::Result<(StatusCode, HeaderMap, Bytes)> {
        send(&self.router, method, path_and_query, body, extra_headers).await
    }

    /// Upload `contents` as the multipart `file` field of an import request.
    pub async fn upload(
        &self,
        token: &str,
        file_name: &str,
        contents: &[u8],
    ) -> anyhow::Result<(StatusCode, HeaderMap, Bytes)> {
        send_upload(&self.router, token, file_name, contents).await
    }
}

/// Build a JSON request, apply `extra_headers`, and run it through `router`.
pub(crate) async fn send(
    router: &Router,
    method: Method,
    path_and_query: &str,
    body: Option<Bytes>,
    extra_headers: &[(&str, &str)],
) -> anyhow::Result<(StatusCode, HeaderMap, Bytes)> {
    let mut request = Request::builder()
        .method(method)
        .uri(path_and_query)
        .header("host", "example.org")
        .header("accept", "application/json")
        .header("content-type", "application/json")
        .body(match body {
            Some(bytes) => Body::from(bytes),
            None => Body::empty(),
        })
        .context("build request")?;

    for (name, value) in extra_headers {
        request.headers_mut().insert(
            name.parse::<HeaderName>().context("parse header name")?,
            value.parse::<HeaderValue>().context("parse header value")?,
        );
    }

    dispatch(router, request).await
}

/// Post `contents` as the multipart `file` field of an import request.
pub(crate) async fn send_upload(
    router: &Router,
    token: &str,
    file_name: &str,
    contents: &[u8],
) -> anyhow::Result<(StatusCode, HeaderMap, Bytes)> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/certificates/import")
        .header("host", "example.org")
        .header("authorization", bearer(token))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
        )
        .body(Body::from(body))
        .context("build upload request")?;

    dispatch(router, request).await
}

async fn dispatch(
    router: &Router,
    request: Request<Body>,
) -> anyhow::Result<(StatusCode, HeaderMap, Bytes)> {
    let response = router
        .clone()
        .oneshot(request)
        .await
        .context("dispatch request")?;

    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .context("read response body")?;

    Ok((status, headers, body))
}

pub async fn with_test_app<F>(f: F) -> anyhow::Result<()>
where
    F: for<'a> FnOnce(
        &'a TestApp,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = anyhow::Result<()>> + 'a>,
    >,
{
    with_test_app_with_config(|_| {}, f).await
}

pub async fn with_test_app_with_config<C, F>(configure: C, f: F) -> anyhow::Result<()>
where
    C: FnOnce(&mut Config),
    F: for<'a> FnOnce(
        &'a TestApp,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = anyhow::Result<()>> + 'a>,
    >,
{
    let app = TestApp::new_with_config(configure).await?;

    let result = std::panic::AssertUnwindSafe(f(&app)).catch_unwind().await;

    match result {
        Ok(r) => r,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

pub(crate) fn test_config() -> Config {
    let mut config = Config::default();
    config.auth.enabled = true;
    config.auth.jwt_secret = TEST_JWT_SECRET.to_string();
    config.auth.jwt_issuer = None;
    // Individual tests opt back in.
    config.rate_limit.enabled = false;
    config
}

pub(crate) fn init_tracing() {
    use std::sync::OnceLock;
    use tracing_subscriber::prelude::*;
    static INIT: OnceLock<()> = OnceLock::new();
    INIT.get_or_init(|| {
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "eo_registry=warn".into()),
            )
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    });
}
