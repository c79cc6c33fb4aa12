use axum::{
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct CleanupResponse {
    success: bool,
    released: usize,
    message: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/cron/cleanup", post(cleanup))
}

/// Run one expiry sweep on behalf of an external scheduler.
///
/// The caller proves itself with the shared cron secret, sent either raw or as a
/// bearer token in the `Authorization` header.
async fn cleanup(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<CleanupResponse>, AppError> {
    let secret = state
        .cron_secret
        .as_deref()
        .ok_or_else(|| AppError::AuthenticationError("Unauthorized".to_string()))?;

    let provided = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .map(|h| h.strip_prefix("Bearer ").unwrap_or(h));

    if provided != Some(secret) {
        return Err(AppError::AuthenticationError("Unauthorized".to_string()));
    }

    let now = Utc::now();
    let released = state.sweeper.tick(now).await?;

    let message = if released.is_empty() {
        "No booked spots to clean.".to_string()
    } else {
        format!("Cleared {} booked spots at {}.", released.len(), now.to_rfc3339())
    };

    Ok(Json(CleanupResponse {
        success: true,
        released: released.len(),
        message,
    }))
}
