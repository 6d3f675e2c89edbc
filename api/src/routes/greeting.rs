use axum::extract::Path;
use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;

const MAX_NAME_CHARS: usize = 30;

#[derive(Serialize, utoipa::ToSchema)]
pub struct GreetingResponse {
    pub message: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/greeting/{name}", get(greet))
}

#[utoipa::path(
    get,
    path = "/greeting/{name}",
    params(("name" = String, Path, description = "Name to greet, 1 to 30 characters")),
    responses(
        (status = 200, description = "Greeting", body = GreetingResponse),
        (status = 400, description = "Name is empty or too long", body = mugo_core::error::ApiError)
    ),
    tag = "system"
)]
pub async fn greet(Path(name): Path<String>) -> Result<Json<GreetingResponse>, AppError> {
    let chars = name.chars().count();
    if chars == 0 || chars > MAX_NAME_CHARS {
        return Err(AppError::Validation {
            message: format!("name must be 1 to {MAX_NAME_CHARS} characters, got {chars}"),
            field: Some("name".to_string()),
            received: Some(serde_json::Value::String(name)),
            docs_hint: None,
        });
    }

    Ok(Json(GreetingResponse {
        message: format!("Hello, {name}!"),
    }))
}
