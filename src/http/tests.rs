use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

use super::*;
use crate::config::LimitRule;
use crate::mail::MailError;

const API_KEY: &str = "test-api-key";

/// Hands every reset code to the test instead of sending it.
struct ChannelMailer(mpsc::UnboundedSender<(String, String)>);

#[async_trait]
impl Mailer for ChannelMailer {
    async fn send_password_reset(&self, to: &str, code: &str) -> Result<(), MailError> {
        let _ = self.0.send((to.to_string(), code.to_string()));
        Ok(())
    }
}

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = "router-test-secret".to_string();
    config.auth.api_key = API_KEY.to_string();
    config.rate_limiting.forgot_password = LimitRule {
        capacity: 2,
        window_secs: 3600,
    };
    config
}

fn test_app() -> (Router, mpsc::UnboundedReceiver<(String, String)>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let state = AppState::new(
        test_config(),
        Arc::new(MemoryStore::new()),
        Arc::new(ChannelMailer(tx)),
    );
    (router(state), rx)
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(middleware::API_KEY_HEADER, API_KEY);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn register(app: &Router, email: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        request(
            "POST",
            "/api/v1/auth/register",
            None,
            Some(json!({ "email": email, "password": password })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_needs_no_api_key() {
    let (app, _rx) = test_app();
    let req = Request::get("/api/v1/health").body(Body::empty()).unwrap();

    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-content-type-options"], "nosniff");
    assert_eq!(res.headers()["x-frame-options"], "DENY");
}

#[tokio::test]
async fn test_api_key_checks() {
    let (app, _rx) = test_app();

    let missing = Request::get("/api/v1/users").body(Body::empty()).unwrap();
    let (status, body) = send(&app, missing).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({ "error": "missing API key" }));

    let wrong = Request::get("/api/v1/users")
        .header(middleware::API_KEY_HEADER, "nope")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, wrong).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({ "error": "invalid API key" }));
}

#[tokio::test]
async fn test_bearer_token_checks() {
    let (app, _rx) = test_app();

    let (status, body) = send(&app, request("GET", "/api/v1/users", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "missing authorization header" }));

    let basic = Request::get("/api/v1/users")
        .header(middleware::API_KEY_HEADER, API_KEY)
        .header(header::AUTHORIZATION, "Basic abc")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, basic).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "invalid authorization format" }));

    let (status, body) = send(&app, request("GET", "/api/v1/users", Some("garbage"), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "invalid or expired token" }));
}

#[tokio::test]
async fn test_register_validation_and_conflict() {
    let (app, _rx) = test_app();

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/v1/auth/register",
            None,
            Some(json!({ "email": "not-an-email", "password": "secret1" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "invalid email format" }));

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/api/v1/auth/register",
            None,
            Some(json!({ "email": "ada@example.com", "password": "123" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    register(&app, "ada@example.com", "secret1").await;
    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/v1/auth/register",
            None,
            Some(json!({ "email": "ADA@example.com ", "password": "secret1" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, json!({ "error": "email already exists" }));
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let (app, _rx) = test_app();
    let req = Request::post("/api/v1/auth/login")
        .header(middleware::API_KEY_HEADER, API_KEY)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "invalid request body" }));
}

#[tokio::test]
async fn test_login_is_throttled_after_five_attempts() {
    let (app, _rx) = test_app();
    register(&app, "ada@example.com", "secret1").await;

    let wrong = json!({ "email": "ada@example.com", "password": "wrong-password" });
    for _ in 0..4 {
        let (status, _) = send(&app, request("POST", "/api/v1/auth/login", None, Some(wrong.clone()))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let right = json!({ "email": "ada@example.com", "password": "secret1" });
    let (status, body) = send(&app, request("POST", "/api/v1/auth/login", None, Some(right.clone()))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());

    // Correct credentials do not bypass a full window.
    let res = app
        .clone()
        .oneshot(request("POST", "/api/v1/auth/login", None, Some(right)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(res.headers().contains_key(header::RETRY_AFTER));

    // Other routes share nothing with the login limiter.
    let (status, _) = send(&app, request("POST", "/api/v1/auth/forgot-password", None, Some(json!({})))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_user_and_metric_crud() {
    let (app, _rx) = test_app();
    let token = register(&app, "ada@example.com", "secret1").await;
    let token = Some(token.as_str());

    let (status, user) = send(
        &app,
        request(
            "POST",
            "/api/v1/users",
            token,
            Some(json!({ "name": "Ada", "height": 170, "birthOfDate": "1990-01-01" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["name"], "Ada");
    assert_eq!(user["birthOfDate"], "1990-01-01");
    let id = user["id"].as_i64().unwrap();

    let (status, users) = send(&app, request("GET", "/api/v1/users", token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 1);

    let (status, patched) = send(
        &app,
        request(
            "PATCH",
            &format!("/api/v1/users/{id}"),
            token,
            Some(json!({ "surname": "Lovelace", "height": null })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["name"], "Ada");
    assert_eq!(patched["surname"], "Lovelace");
    assert_eq!(patched["height"], Value::Null);

    let (status, body) = send(&app, request("GET", "/api/v1/users/999", token, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "user not found" }));

    let (status, body) = send(&app, request("GET", "/api/v1/users/abc", token, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "invalid user id" }));

    let (status, metric) = send(
        &app,
        request(
            "POST",
            &format!("/api/v1/users/{id}/metrics"),
            token,
            Some(json!({ "date": "2024-03-01", "weight": 62.5, "height": 170, "bmi": 21.6 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(metric["user_id"], id);

    let (status, metrics) = send(
        &app,
        request("GET", &format!("/api/v1/users/{id}/metrics"), token, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metrics.as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        request("POST", "/api/v1/users/999/metrics", token, Some(json!({ "weight": 60.0 }))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_password_reset_flow() {
    let (app, mut rx) = test_app();
    register(&app, "ada@example.com", "secret1").await;

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/v1/auth/forgot-password",
            None,
            Some(json!({ "email": "ada@example.com" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "if the email exists, a code has been sent");

    let (to, code) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(to, "ada@example.com");
    assert_eq!(code.len(), 6);

    let reset = json!({ "email": "ada@example.com", "token": code, "password": "brand-new" });
    let (status, _) = send(&app, request("POST", "/api/v1/auth/reset-password", None, Some(reset.clone()))).await;
    assert_eq!(status, StatusCode::OK);

    // Codes are single use.
    let (status, body) = send(&app, request("POST", "/api/v1/auth/reset-password", None, Some(reset))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "invalid or expired token" }));

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "brand-new" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reset_code_redeemed_once_by_concurrent_requests() {
    let (app, mut rx) = test_app();
    register(&app, "ada@example.com", "secret1").await;

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/api/v1/auth/forgot-password",
            None,
            Some(json!({ "email": "ada@example.com" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, code) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();

    let first = json!({ "email": "ada@example.com", "token": code, "password": "first-pass" });
    let second = json!({ "email": "ada@example.com", "token": code, "password": "second-pass" });
    let ((a, _), (b, _)) = tokio::join!(
        send(&app, request("POST", "/api/v1/auth/reset-password", None, Some(first))),
        send(&app, request("POST", "/api/v1/auth/reset-password", None, Some(second))),
    );

    let mut statuses = [a, b];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::UNAUTHORIZED]);
}

#[tokio::test]
async fn test_forgot_password_hides_unknown_emails_and_throttles() {
    let (app, mut rx) = test_app();
    let body = json!({ "email": "ghost@example.com" });

    for _ in 0..2 {
        let (status, res) = send(&app, request("POST", "/api/v1/auth/forgot-password", None, Some(body.clone()))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(res["message"], "if the email exists, a code has been sent");
    }

    let (status, _) = send(&app, request("POST", "/api/v1/auth/forgot-password", None, Some(body))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let nothing = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(nothing.is_err());
}
