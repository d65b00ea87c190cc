//! HTTP server lifecycle.

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::{router, AppState};
use crate::error::{BodyMetricsError, Result};

/// HTTP server for the BodyMetrics API.
pub struct HttpServer {
    /// Bound listener
    listener: TcpListener,
    /// Fully layered application
    app: Router,
}

impl HttpServer {
    /// Bind `addr` and build the router around `state`.
    pub async fn bind(addr: SocketAddr, state: AppState) -> Result<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            error!(addr = %addr, error = %e, "Failed to bind HTTP listener");
            BodyMetricsError::Server(format!("failed to bind {addr}: {e}"))
        })?;

        Ok(Self {
            listener,
            app: router(state),
        })
    }

    /// The address actually bound; differs from the requested one for port 0.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `signal` resolves, then drain in-flight requests.
    ///
    /// Peer addresses are exposed to handlers through `ConnectInfo`.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.local_addr()?;
        info!(addr = %addr, "Starting HTTP server with graceful shutdown");

        axum::serve(
            self.listener,
            self.app
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP server failed");
            BodyMetricsError::Server(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, LimitRule};
    use reqwest::StatusCode;
    use serde_json::json;
    use tokio::sync::oneshot;

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = "server-test-secret".to_string();
        config.rate_limiting.login = LimitRule {
            capacity: 2,
            window_secs: 60,
        };
        config
    }

    #[tokio::test]
    async fn test_serves_and_limits_over_tcp() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let server = HttpServer::bind(addr, AppState::in_memory(config()))
            .await
            .unwrap();
        let base = format!("http://{}/api/v1", server.local_addr().unwrap());

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve_with_shutdown(async move {
            let _ = stop_rx.await;
        }));

        let client = reqwest::Client::new();
        let health = client.get(format!("{base}/health")).send().await.unwrap();
        assert_eq!(health.status(), StatusCode::OK);

        let body = json!({ "email": "nobody@example.com", "password": "secret1" });
        let mut statuses = Vec::new();
        for _ in 0..3 {
            let res = client
                .post(format!("{base}/auth/login"))
                .json(&body)
                .send()
                .await
                .unwrap();
            statuses.push(res.status());
        }
        assert_eq!(
            statuses,
            vec![
                StatusCode::UNAUTHORIZED,
                StatusCode::UNAUTHORIZED,
                StatusCode::TOO_MANY_REQUESTS
            ]
        );

        stop_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_bind_conflict_is_server_error() {
        let first = HttpServer::bind("127.0.0.1:0".parse().unwrap(), AppState::in_memory(config()))
            .await
            .unwrap();
        let taken = first.local_addr().unwrap();

        let second = HttpServer::bind(taken, AppState::in_memory(config())).await;
        assert!(matches!(second, Err(BodyMetricsError::Server(_))));
    }
}
