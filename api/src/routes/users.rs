use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use mugo_core::models::User;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

const MAX_USERNAME_CHARS: usize = 64;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/{user_id}",
            get(get_user).patch(update_user_metadata).delete(delete_user),
        )
        .route("/users/by-username/{username}", get(get_user_by_username))
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateUserRequest {
    pub username: String,
    /// Optional profile data; must be a JSON object
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateUserMetadataRequest {
    /// Replaces the stored metadata; `null` clears it
    pub metadata: Option<serde_json::Value>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct UserResponse {
    pub user: User,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct UserListResponse {
    pub users: Vec<User>,
}

fn validate_metadata(metadata: Option<&serde_json::Value>) -> Result<(), AppError> {
    match metadata {
        Some(value) if !value.is_object() => Err(AppError::Validation {
            message: "metadata must be a JSON object".to_string(),
            field: Some("metadata".to_string()),
            received: Some(value.clone()),
            docs_hint: None,
        }),
        _ => Ok(()),
    }
}

#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid username or metadata", body = mugo_core::error::ApiError),
        (status = 409, description = "Username already exists", body = mugo_core::error::ApiError),
        (status = 503, description = "Persistence unavailable", body = mugo_core::error::ApiError)
    ),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    AppJson(req): AppJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let username = req.username.trim();
    if username.is_empty() || username.chars().count() > MAX_USERNAME_CHARS {
        return Err(AppError::validation(
            "username",
            format!("username must be 1 to {MAX_USERNAME_CHARS} characters"),
        ));
    }
    validate_metadata(req.metadata.as_ref())?;

    let mut repos = state.db()?.repositories().await?;
    if repos.users().exists(username).await? {
        return Err(AppError::Conflict {
            message: format!("Username '{username}' already exists"),
            field: Some("username".to_string()),
        });
    }
    let user = repos.users().create(username, req.metadata.as_ref()).await?;

    tracing::info!(user_id = %user.id, username = %user.username, "user created");
    Ok((StatusCode::CREATED, Json(UserResponse { user })))
}

#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "All users, newest first", body = UserListResponse),
        (status = 503, description = "Persistence unavailable", body = mugo_core::error::ApiError)
    ),
    tag = "users"
)]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<UserListResponse>, AppError> {
    let users = state.db()?.repositories().await?.users().list().await?;
    Ok(Json(UserListResponse { users }))
}

#[utoipa::path(
    get,
    path = "/users/{user_id}",
    params(("user_id" = String, Path, description = "User ID (UUID)")),
    responses(
        (status = 200, description = "User", body = UserResponse),
        (status = 400, description = "Malformed user ID", body = mugo_core::error::ApiError),
        (status = 404, description = "User not found", body = mugo_core::error::ApiError)
    ),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .db()?
        .repositories()
        .await?
        .users()
        .get_by_id(&user_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User {user_id}")))?;
    Ok(Json(UserResponse { user }))
}

#[utoipa::path(
    get,
    path = "/users/by-username/{username}",
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "User", body = UserResponse),
        (status = 404, description = "User not found", body = mugo_core::error::ApiError)
    ),
    tag = "users"
)]
pub async fn get_user_by_username(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .db()?
        .repositories()
        .await?
        .users()
        .get_by_username(username.trim())
        .await?
        .ok_or_else(|| AppError::not_found(format!("User '{username}'")))?;
    Ok(Json(UserResponse { user }))
}

#[utoipa::path(
    patch,
    path = "/users/{user_id}",
    params(("user_id" = String, Path, description = "User ID (UUID)")),
    request_body = UpdateUserMetadataRequest,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Invalid metadata", body = mugo_core::error::ApiError),
        (status = 404, description = "User not found", body = mugo_core::error::ApiError)
    ),
    tag = "users"
)]
pub async fn update_user_metadata(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    AppJson(req): AppJson<UpdateUserMetadataRequest>,
) -> Result<Json<UserResponse>, AppError> {
    validate_metadata(req.metadata.as_ref())?;
    let user = state
        .db()?
        .repositories()
        .await?
        .users()
        .update_metadata(&user_id, req.metadata.as_ref())
        .await?;
    Ok(Json(UserResponse { user }))
}

#[utoipa::path(
    delete,
    path = "/users/{user_id}",
    params(("user_id" = String, Path, description = "User ID (UUID)")),
    responses(
        (status = 204, description = "User and all their data deleted"),
        (status = 404, description = "User not found", body = mugo_core::error::ApiError)
    ),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.db()?.repositories().await?.users().delete(&user_id).await?;
    tracing::info!(user_id = %user_id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
