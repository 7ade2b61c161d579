//! Per-request context injected by middleware.

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    /// Identity used for rate limiting (first forwarded hop or peer hint).
    pub client_key: String,
}
