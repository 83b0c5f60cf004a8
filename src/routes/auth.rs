use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::AppError;
use crate::gateway::events::ChatEvent;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub token: String,
}

/// Create a session and announce the arrival to everyone attached.
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let username = input.username.trim();
    if username.is_empty() || username.len() > 32 {
        return Err(AppError::BadRequest(
            "username must be between 1 and 32 characters".to_string(),
        ));
    }

    let token = state
        .registry
        .create(username)
        .await
        .map_err(|e| AppError::Internal(format!("token generation failed: {e}")))?;

    if state
        .hub
        .publish(ChatEvent::Login {
            name: username.to_string(),
        })
        .await
        .is_err()
    {
        state.registry.remove(&token).await;
        return Err(AppError::Internal("relay is shutting down".to_string()));
    }

    info!(name = %username, "session created");
    Ok(Json(serde_json::json!({
        "data": { "token": token }
    })))
}

/// End a session. An unknown token is treated as already logged out: the
/// call still succeeds and nothing is broadcast.
pub async fn logout(
    State(state): State<AppState>,
    Json(input): Json<LogoutRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    match state.registry.remove(&input.token).await {
        Some(name) => {
            if state
                .hub
                .publish(ChatEvent::Logout { name: name.clone() })
                .await
                .is_err()
            {
                debug!(name = %name, "logout during shutdown, notice suppressed");
            }
            info!(name = %name, "session removed");
        }
        None => {
            debug!("logout with unknown token, nothing to do");
        }
    }

    Ok(Json(serde_json::json!({
        "data": { "ok": true }
    })))
}
