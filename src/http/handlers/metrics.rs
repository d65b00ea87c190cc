use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use tracing::debug;

use crate::http::error::{parse_id, ApiError, JsonBody};
use crate::http::middleware::AuthAccount;
use crate::http::AppState;
use crate::model::UserMetric;
use crate::store::StoreError;

pub async fn create(
    State(state): State<AppState>,
    Extension(account): Extension<AuthAccount>,
    Path(user_id): Path<String>,
    JsonBody(mut metric): JsonBody<UserMetric>,
) -> Result<(StatusCode, Json<UserMetric>), ApiError> {
    metric.user_id = parse_id(&user_id, "user")?;

    let metric = match state.metrics.create_metric(metric).await {
        Ok(metric) => metric,
        Err(StoreError::NotFound(_)) => return Err(ApiError::not_found("user not found")),
        Err(e) => return Err(ApiError::internal("failed to create metric", e)),
    };

    debug!(
        account_id = account.account_id,
        user_id = metric.user_id,
        metric_id = metric.id,
        "Recorded metric"
    );
    Ok((StatusCode::CREATED, Json(metric)))
}

pub async fn list(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<UserMetric>>, ApiError> {
    let user_id = parse_id(&user_id, "user")?;
    let metrics = state
        .metrics
        .metrics_for_user(user_id)
        .await
        .map_err(|e| ApiError::internal("failed to list metrics", e))?;
    Ok(Json(metrics))
}
