//! HTTP API: shared state, routing and middleware wiring.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
mod server;

use std::sync::Arc;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::auth::TokenIssuer;
use crate::config::AppConfig;
use crate::mail::{self, Mailer};
use crate::ratelimit::{throttle, ClientKeyExtractor, RateLimitGate, RateLimiter};
use crate::store::{
    AccountRepository, MemoryStore, MetricRepository, ResetTokenRepository, UserRepository,
};

pub use server::HttpServer;

/// Everything handlers and middleware need, cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tokens: TokenIssuer,
    pub accounts: Arc<dyn AccountRepository>,
    pub users: Arc<dyn UserRepository>,
    pub metrics: Arc<dyn MetricRepository>,
    pub reset_tokens: Arc<dyn ResetTokenRepository>,
    pub mailer: Arc<dyn Mailer>,
    pub login_limiter: Arc<RateLimiter>,
    pub forgot_password_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Wire state around a store that implements every repository.
    pub fn new<S>(config: AppConfig, store: Arc<S>, mailer: Arc<dyn Mailer>) -> Self
    where
        S: AccountRepository + UserRepository + MetricRepository + ResetTokenRepository + 'static,
    {
        let limits = &config.rate_limiting;
        let login_limiter = Arc::new(RateLimiter::new(limits.login.capacity, limits.login.window()));
        let forgot_password_limiter = Arc::new(RateLimiter::new(
            limits.forgot_password.capacity,
            limits.forgot_password.window(),
        ));

        Self::with_limiters(config, store, mailer, login_limiter, forgot_password_limiter)
    }

    /// Like [`AppState::new`] but with caller-built limiters.
    pub fn with_limiters<S>(
        config: AppConfig,
        store: Arc<S>,
        mailer: Arc<dyn Mailer>,
        login_limiter: Arc<RateLimiter>,
        forgot_password_limiter: Arc<RateLimiter>,
    ) -> Self
    where
        S: AccountRepository + UserRepository + MetricRepository + ResetTokenRepository + 'static,
    {
        let tokens = TokenIssuer::new(&config.auth.jwt_secret, config.auth.token_ttl());

        Self {
            config: Arc::new(config),
            tokens,
            accounts: store.clone(),
            users: store.clone(),
            metrics: store.clone(),
            reset_tokens: store,
            mailer,
            login_limiter,
            forgot_password_limiter,
        }
    }

    /// State backed by a fresh [`MemoryStore`] and the configured mailer.
    pub fn in_memory(config: AppConfig) -> Self {
        let mailer = mail::from_config(&config.email);
        Self::new(config, Arc::new(MemoryStore::new()), mailer)
    }

    /// Both limiters, for the idle sweep.
    pub fn limiters(&self) -> Vec<Arc<RateLimiter>> {
        vec![
            Arc::clone(&self.login_limiter),
            Arc::clone(&self.forgot_password_limiter),
        ]
    }
}

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    let limits = &state.config.rate_limiting;
    let extractor = ClientKeyExtractor::new(limits.client_key, limits.trusted_proxy_hops);
    let login_gate = RateLimitGate::new("login", state.login_limiter.clone(), extractor);
    let forgot_gate = RateLimitGate::new(
        "forgot_password",
        state.forgot_password_limiter.clone(),
        extractor,
    );

    let auth_routes = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route(
            "/auth/login",
            post(handlers::auth::login).route_layer(from_fn_with_state(login_gate, throttle)),
        )
        .route(
            "/auth/forgot-password",
            post(handlers::auth::forgot_password)
                .route_layer(from_fn_with_state(forgot_gate, throttle)),
        )
        .route("/auth/reset-password", post(handlers::auth::reset_password));

    let protected_routes = Router::new()
        .route(
            "/users",
            post(handlers::users::create).get(handlers::users::list),
        )
        .route(
            "/users/{id}",
            get(handlers::users::get).patch(handlers::users::update),
        )
        .route(
            "/users/{id}/metrics",
            post(handlers::metrics::create).get(handlers::metrics::list),
        )
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    // Health stays reachable without an API key.
    let api = auth_routes
        .merge(protected_routes)
        .route_layer(from_fn_with_state(state.clone(), middleware::require_api_key))
        .route("/health", get(handlers::health));

    let max_body_bytes = state.config.server.max_body_bytes;
    let cors = middleware::cors_layer(&state.config.server.allowed_origins);

    Router::new()
        .nest("/api/v1", api)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(from_fn(middleware::security_headers))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests;
