use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::auth::{generate_reset_code, hash_password, verify_password};
use crate::http::dto::{
    Credentials, ForgotPasswordRequest, MessageResponse, ResetPasswordRequest, TokenResponse,
};
use crate::http::error::{body_or_default, ApiError, JsonBody};
use crate::http::AppState;
use crate::store::StoreError;

const RESET_REQUESTED: &str = "if the email exists, a code has been sent";

pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<Credentials>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    let email = normalize_email(&req.email);
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("email and password are required"));
    }
    validate_email(&email)?;
    validate_password(&state, &req.password)?;

    let password_hash = hash_blocking(req.password).await?;

    let account_id = match state.accounts.create_account(&email, &password_hash).await {
        Ok(id) => id,
        Err(StoreError::Conflict(_)) => return Err(ApiError::conflict("email already exists")),
        Err(e) => return Err(ApiError::internal("failed to create account", e)),
    };

    let token = state
        .tokens
        .issue(account_id, &email)
        .map_err(|e| ApiError::internal("failed to generate token", e))?;

    info!(account_id = account_id, "Registered account");
    Ok((StatusCode::CREATED, Json(TokenResponse { token })))
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<Credentials>,
) -> Result<Json<TokenResponse>, ApiError> {
    let email = normalize_email(&req.email);
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("email and password are required"));
    }
    validate_email(&email)?;

    let account = state
        .accounts
        .account_by_email(&email)
        .await
        .map_err(|e| ApiError::internal("failed to login", e))?
        .ok_or_else(|| {
            warn!("Failed login attempt for unknown account");
            ApiError::unauthorized("invalid email or password")
        })?;

    let hash = account.password_hash.clone();
    let password = req.password;
    let valid = tokio::task::spawn_blocking(move || verify_password(&hash, &password))
        .await
        .map_err(|e| ApiError::internal("failed to login", e))?
        .map_err(|e| ApiError::internal("failed to login", e))?;

    if !valid {
        warn!(account_id = account.id, "Failed login attempt");
        return Err(ApiError::unauthorized("invalid email or password"));
    }

    let token = state
        .tokens
        .issue(account.id, &account.email)
        .map_err(|e| ApiError::internal("failed to generate token", e))?;

    info!(account_id = account.id, "Login succeeded");
    Ok(Json(TokenResponse { token }))
}

/// Always answers the same way so callers cannot probe which emails exist.
/// The code is issued and mailed in the background.
pub async fn forgot_password(
    State(state): State<AppState>,
    body: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> Json<MessageResponse> {
    let req = body_or_default(body);
    let email = normalize_email(&req.email);

    if !email.is_empty() {
        tokio::spawn(async move {
            if let Err(e) = issue_reset_code(&state, &email).await {
                error!(error = %e, "Failed to issue password reset code");
            }
        });
    }

    Json(MessageResponse {
        message: RESET_REQUESTED,
    })
}

pub async fn reset_password(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = normalize_email(&req.email);
    if email.is_empty() || req.token.is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("email, token and password are required"));
    }
    validate_password(&state, &req.password)?;

    // Claimed before hashing; a code is redeemed at most once.
    let reset_token = state
        .reset_tokens
        .consume_reset_token(&email, &req.token, Utc::now())
        .await
        .map_err(|e| ApiError::internal("failed to verify token", e))?
        .ok_or_else(|| ApiError::unauthorized("invalid or expired token"))?;

    let password_hash = hash_blocking(req.password).await?;

    state
        .accounts
        .update_password(reset_token.account_id, &password_hash)
        .await
        .map_err(|e| ApiError::internal("failed to update password", e))?;

    info!(account_id = reset_token.account_id, "Password reset");
    Ok(Json(MessageResponse {
        message: "password reset successful",
    }))
}

/// Replace any outstanding reset codes for `email` with a fresh one and mail it.
///
/// Unknown emails are a silent no-op.
pub async fn issue_reset_code(state: &AppState, email: &str) -> crate::error::Result<()> {
    let Some(account) = state.accounts.account_by_email(email).await? else {
        debug!("Password reset requested for unknown account");
        return Ok(());
    };

    if let Err(e) = state.reset_tokens.delete_reset_tokens(account.id).await {
        warn!(account_id = account.id, error = %e, "Failed to delete old reset codes");
    }

    let code = generate_reset_code();
    let ttl = chrono::Duration::from_std(state.config.auth.reset_code_ttl())
        .unwrap_or_else(|_| chrono::Duration::minutes(15));
    state
        .reset_tokens
        .create_reset_token(account.id, &code, Utc::now() + ttl)
        .await?;

    state.mailer.send_password_reset(&account.email, &code).await?;
    info!(account_id = account.id, "Password reset code sent");
    Ok(())
}

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// An `@` that is not the first character, followed somewhere by a `.`.
fn validate_email(email: &str) -> Result<(), ApiError> {
    match email.find('@') {
        Some(at) if at > 0 && email[at..].contains('.') => Ok(()),
        _ => Err(ApiError::bad_request("invalid email format")),
    }
}

fn validate_password(state: &AppState, password: &str) -> Result<(), ApiError> {
    let min = state.config.auth.min_password_len;
    if password.chars().count() < min {
        return Err(ApiError::bad_request(format!(
            "password must be at least {min} characters"
        )));
    }
    Ok(())
}

async fn hash_blocking(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::internal("failed to hash password", e))?
        .map_err(|e| ApiError::internal("failed to hash password", e))
}
