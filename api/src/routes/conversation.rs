use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::agents::{ensure_conversation, require_non_empty, run_agent};
use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/conversation", post(converse))
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct ConverseRequest {
    pub user_id: String,
    pub session_id: String,
    pub message: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ConverseResponse {
    pub text: String,
}

/// Send one chat message to the conversation agent.
#[utoipa::path(
    post,
    path = "/conversation",
    request_body = ConverseRequest,
    responses(
        (status = 200, description = "Agent reply", body = ConverseResponse),
        (status = 400, description = "Invalid request", body = mugo_core::error::ApiError),
        (status = 502, description = "Agent service failed", body = mugo_core::error::ApiError)
    ),
    tag = "agents"
)]
pub async fn converse(
    State(state): State<AppState>,
    AppJson(req): AppJson<ConverseRequest>,
) -> Result<Json<ConverseResponse>, AppError> {
    require_non_empty("user_id", &req.user_id)?;
    require_non_empty("session_id", &req.session_id)?;
    require_non_empty("message", &req.message)?;

    let result = run_agent(
        &state,
        &state.apps.conversation,
        &req.user_id,
        &req.session_id,
        &req.message,
    )
    .await
    .map_err(|e| AppError::upstream("conversation agent processing failed", e))?;

    if let (Some(db), Ok(user_id)) = (&state.db, Uuid::parse_str(req.user_id.trim())) {
        let session_id = req.session_id.clone();
        let outcome = db
            .with_tx(move |tx| {
                Box::pin(async move { ensure_conversation(tx, user_id, &session_id).await })
            })
            .await;
        if let Err(err) = outcome {
            tracing::warn!(user_id = %user_id, error = %err, "failed to record conversation");
        }
    }

    Ok(Json(ConverseResponse {
        text: result.final_text,
    }))
}
