//! Request gating middleware.
//!
//! Wraps any axum route: the client key is derived from the request, the
//! limiter is consulted, and the request either passes through untouched or
//! is answered with `429 Too Many Requests`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::warn;

use super::client_key::ClientKeyExtractor;
use super::limiter::RateLimiter;
use super::window::Decision;

/// State handed to [`throttle`] through `from_fn_with_state`.
#[derive(Debug, Clone)]
pub struct RateLimitGate {
    limiter: Arc<RateLimiter>,
    extractor: ClientKeyExtractor,
    /// Name used in logs to tell the gated operations apart
    name: &'static str,
}

impl RateLimitGate {
    pub fn new(name: &'static str, limiter: Arc<RateLimiter>, extractor: ClientKeyExtractor) -> Self {
        Self {
            limiter,
            extractor,
            name,
        }
    }
}

/// Middleware that rejects requests once the client's window is full.
pub async fn throttle(
    State(gate): State<RateLimitGate>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = gate.extractor.extract(req.headers(), peer);

    match gate.limiter.check(&key) {
        Decision::Allowed => next.run(req).await,
        Decision::Rejected { retry_after } => {
            warn!(operation = gate.name, client = %key, "Throttled request");
            too_many_requests(retry_after.as_secs_f64().ceil() as u64)
        }
    }
}

fn too_many_requests(retry_after_secs: u64) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({ "error": "too many requests" })),
    )
        .into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
    response
}
