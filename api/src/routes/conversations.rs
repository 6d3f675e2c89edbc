use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use mugo_core::models::Conversation;
use serde::{Deserialize, Serialize};

use super::agents::require_non_empty;
use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

const MAX_TITLE_CHARS: usize = 200;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/conversations", post(create_conversation))
        .route("/conversations/user/{user_id}", get(list_conversations))
        .route(
            "/conversations/user/{user_id}/session/{session_id}",
            get(get_conversation_by_session),
        )
        .route(
            "/conversations/{conversation_id}",
            get(get_conversation)
                .patch(update_conversation_title)
                .delete(delete_conversation),
        )
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateConversationRequest {
    pub user_id: String,
    /// Agent session the conversation is held in
    pub session_id: String,
    pub title: Option<String>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateTitleRequest {
    /// New title; `null` clears it
    pub title: Option<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ConversationResponse {
    pub conversation: Conversation,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ConversationListResponse {
    pub conversations: Vec<Conversation>,
}

/// Trimmed title; blank means none.
fn normalize_title(title: Option<&str>) -> Result<Option<&str>, AppError> {
    let title = title.map(str::trim).filter(|t| !t.is_empty());
    if title.is_some_and(|t| t.chars().count() > MAX_TITLE_CHARS) {
        return Err(AppError::validation(
            "title",
            format!("title must be at most {MAX_TITLE_CHARS} characters"),
        ));
    }
    Ok(title)
}

#[utoipa::path(
    post,
    path = "/conversations",
    request_body = CreateConversationRequest,
    responses(
        (status = 201, description = "Conversation created", body = ConversationResponse),
        (status = 400, description = "Invalid IDs or title", body = mugo_core::error::ApiError),
        (status = 409, description = "The user already has a conversation for this session", body = mugo_core::error::ApiError)
    ),
    tag = "conversations"
)]
pub async fn create_conversation(
    State(state): State<AppState>,
    AppJson(req): AppJson<CreateConversationRequest>,
) -> Result<(StatusCode, Json<ConversationResponse>), AppError> {
    require_non_empty("session_id", &req.session_id)?;
    let title = normalize_title(req.title.as_deref())?;

    let conversation = state
        .db()?
        .repositories()
        .await?
        .conversations()
        .create(&req.user_id, req.session_id.trim(), title)
        .await?;

    tracing::info!(conversation_id = %conversation.id, user_id = %conversation.user_id, "conversation created");
    Ok((StatusCode::CREATED, Json(ConversationResponse { conversation })))
}

#[utoipa::path(
    get,
    path = "/conversations/user/{user_id}",
    params(("user_id" = String, Path, description = "User ID (UUID)")),
    responses(
        (status = 200, description = "Conversations, most recently active first", body = ConversationListResponse),
        (status = 400, description = "Malformed user ID", body = mugo_core::error::ApiError)
    ),
    tag = "conversations"
)]
pub async fn list_conversations(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ConversationListResponse>, AppError> {
    let conversations = state
        .db()?
        .repositories()
        .await?
        .conversations()
        .list_by_user(&user_id)
        .await?;
    Ok(Json(ConversationListResponse { conversations }))
}

#[utoipa::path(
    get,
    path = "/conversations/user/{user_id}/session/{session_id}",
    params(
        ("user_id" = String, Path, description = "User ID (UUID)"),
        ("session_id" = String, Path, description = "Agent session ID")
    ),
    responses(
        (status = 200, description = "Conversation", body = ConversationResponse),
        (status = 404, description = "No conversation for this session", body = mugo_core::error::ApiError)
    ),
    tag = "conversations"
)]
pub async fn get_conversation_by_session(
    State(state): State<AppState>,
    Path((user_id, session_id)): Path<(String, String)>,
) -> Result<Json<ConversationResponse>, AppError> {
    let conversation = state
        .db()?
        .repositories()
        .await?
        .conversations()
        .get_by_session_id(&user_id, &session_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Conversation for session {session_id}")))?;
    Ok(Json(ConversationResponse { conversation }))
}

#[utoipa::path(
    get,
    path = "/conversations/{conversation_id}",
    params(("conversation_id" = String, Path, description = "Conversation ID (UUID)")),
    responses(
        (status = 200, description = "Conversation", body = ConversationResponse),
        (status = 404, description = "Conversation not found", body = mugo_core::error::ApiError)
    ),
    tag = "conversations"
)]
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<ConversationResponse>, AppError> {
    let conversation = state
        .db()?
        .repositories()
        .await?
        .conversations()
        .get_by_id(&conversation_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Conversation {conversation_id}")))?;
    Ok(Json(ConversationResponse { conversation }))
}

#[utoipa::path(
    patch,
    path = "/conversations/{conversation_id}",
    params(("conversation_id" = String, Path, description = "Conversation ID (UUID)")),
    request_body = UpdateTitleRequest,
    responses(
        (status = 200, description = "Updated conversation", body = ConversationResponse),
        (status = 400, description = "Title too long", body = mugo_core::error::ApiError),
        (status = 404, description = "Conversation not found", body = mugo_core::error::ApiError)
    ),
    tag = "conversations"
)]
pub async fn update_conversation_title(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    AppJson(req): AppJson<UpdateTitleRequest>,
) -> Result<Json<ConversationResponse>, AppError> {
    let title = normalize_title(req.title.as_deref())?;

    let conversation = state
        .db()?
        .repositories()
        .await?
        .conversations()
        .update_title(&conversation_id, title)
        .await?;
    Ok(Json(ConversationResponse { conversation }))
}

#[utoipa::path(
    delete,
    path = "/conversations/{conversation_id}",
    params(("conversation_id" = String, Path, description = "Conversation ID (UUID)")),
    responses(
        (status = 204, description = "Conversation deleted; its meals are kept"),
        (status = 404, description = "Conversation not found", body = mugo_core::error::ApiError)
    ),
    tag = "conversations"
)]
pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .db()?
        .repositories()
        .await?
        .conversations()
        .delete(&conversation_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
