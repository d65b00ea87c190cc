use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use tracing::info;

use crate::http::error::{parse_id, ApiError, JsonBody};
use crate::http::middleware::AuthAccount;
use crate::http::AppState;
use crate::model::{NewUser, User, UserPatch};

pub async fn create(
    State(state): State<AppState>,
    Extension(account): Extension<AuthAccount>,
    JsonBody(new_user): JsonBody<NewUser>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = state
        .users
        .create_user(new_user)
        .await
        .map_err(|e| ApiError::internal("failed to create user", e))?;

    info!(account_id = account.account_id, user_id = user.id, "Created user");
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<User>>, ApiError> {
    let users = state
        .users
        .list_users()
        .await
        .map_err(|e| ApiError::internal("failed to list users", e))?;
    Ok(Json(users))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let id = parse_id(&id, "user")?;
    state
        .users
        .user_by_id(id)
        .await
        .map_err(|e| ApiError::internal("failed to get user", e))?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("user not found"))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<UserPatch>,
) -> Result<Json<User>, ApiError> {
    let id = parse_id(&id, "user")?;
    state
        .users
        .update_user(id, patch)
        .await
        .map_err(|e| ApiError::internal("failed to update user", e))?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("user not found"))
}
