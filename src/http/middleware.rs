//! Cross-cutting request middleware: API key, bearer auth, CORS and
//! response hardening headers.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderName, HeaderValue, Method, Request};
use axum::middleware::Next;
use axum::response::Response;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

use super::error::ApiError;
use super::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// The account a verified bearer token belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthAccount {
    pub account_id: i64,
    pub email: String,
}

/// Reject requests without the configured `X-API-Key`. No key configured means open access.
pub async fn require_api_key(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let expected = state.config.auth.api_key.as_str();
    if expected.is_empty() {
        return Ok(next.run(req).await);
    }

    let provided = req
        .headers()
        .get(API_KEY_HEADER)
        .map(|v| v.as_bytes())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::forbidden("missing API key"))?;

    if provided != expected.as_bytes() {
        warn!(path = %req.uri().path(), "Invalid API key");
        return Err(ApiError::forbidden("invalid API key"));
    }

    Ok(next.run(req).await)
}

/// Verify the bearer token and attach the [`AuthAccount`] to the request.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("missing authorization header"))?;

    let token = auth_header
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::unauthorized("invalid authorization format"))?;

    let claims = state.tokens.verify(token).map_err(|e| {
        warn!(error = %e, "Rejected bearer token");
        ApiError::unauthorized("invalid or expired token")
    })?;

    req.extensions_mut().insert(AuthAccount {
        account_id: claims.account_id,
        email: claims.email,
    });

    Ok(next.run(req).await)
}

pub async fn security_headers(req: Request<Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "x-xss-protection",
        HeaderValue::from_static("1; mode=block"),
    );
    headers.insert(
        "referrer-policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        "strict-transport-security",
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    response
}

/// CORS policy from the configured origin list. `*` anywhere allows any origin.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(API_KEY_HEADER),
        ])
}
