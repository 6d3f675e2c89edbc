//! Inspection endpoints for development: what this gateway recorded, and
//! what the agent service holds.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use mugo_adk::Session;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/debug/sessions/{user_id}", get(list_sessions))
        .route("/debug/messages/{user_id}/{session_id}", get(list_messages))
        .route(
            "/debug/agent-sessions/{app}/{user_id}/{session_id}",
            get(get_agent_session).delete(delete_agent_session),
        )
}

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AppFilter {
    /// Restrict to one agent app
    pub app: Option<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct SessionIdsResponse {
    pub session_ids: Vec<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct MessagesResponse {
    pub messages: Vec<String>,
}

#[utoipa::path(
    get,
    path = "/debug/sessions/{user_id}",
    params(("user_id" = String, Path, description = "User ID as sent to the agent"), AppFilter),
    responses((status = 200, description = "Sessions recorded for the user", body = SessionIdsResponse)),
    tag = "debug"
)]
pub async fn list_sessions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(filter): Query<AppFilter>,
) -> Json<SessionIdsResponse> {
    let session_ids = state
        .registry
        .session_ids(&user_id, filter.app.as_deref())
        .await;
    Json(SessionIdsResponse { session_ids })
}

#[utoipa::path(
    get,
    path = "/debug/messages/{user_id}/{session_id}",
    params(
        ("user_id" = String, Path, description = "User ID as sent to the agent"),
        ("session_id" = String, Path, description = "Agent session ID"),
        AppFilter
    ),
    responses(
        (status = 200, description = "Message texts in order", body = MessagesResponse),
        (status = 404, description = "Session was never recorded", body = mugo_core::error::ApiError)
    ),
    tag = "debug"
)]
pub async fn list_messages(
    State(state): State<AppState>,
    Path((user_id, session_id)): Path<(String, String)>,
    Query(filter): Query<AppFilter>,
) -> Result<Json<MessagesResponse>, AppError> {
    let messages = state
        .registry
        .messages(&user_id, &session_id, filter.app.as_deref())
        .await
        .ok_or_else(|| AppError::not_found(format!("Session {session_id}")))?;
    Ok(Json(MessagesResponse { messages }))
}

#[utoipa::path(
    get,
    path = "/debug/agent-sessions/{app}/{user_id}/{session_id}",
    params(
        ("app" = String, Path, description = "Agent app name"),
        ("user_id" = String, Path, description = "User ID as sent to the agent"),
        ("session_id" = String, Path, description = "Agent session ID")
    ),
    responses(
        (status = 200, description = "Session as held by the agent service"),
        (status = 404, description = "Agent service has no such session", body = mugo_core::error::ApiError),
        (status = 502, description = "Agent service failed", body = mugo_core::error::ApiError)
    ),
    tag = "debug"
)]
pub async fn get_agent_session(
    State(state): State<AppState>,
    Path((app, user_id, session_id)): Path<(String, String, String)>,
) -> Result<Json<Session>, AppError> {
    let session = state
        .agents
        .get_session(&app, &user_id, &session_id)
        .await
        .map_err(|e| AppError::upstream("fetching agent session", e))?
        .ok_or_else(|| AppError::not_found(format!("Agent session {session_id}")))?;
    Ok(Json(session))
}

#[utoipa::path(
    delete,
    path = "/debug/agent-sessions/{app}/{user_id}/{session_id}",
    params(
        ("app" = String, Path, description = "Agent app name"),
        ("user_id" = String, Path, description = "User ID as sent to the agent"),
        ("session_id" = String, Path, description = "Agent session ID")
    ),
    responses(
        (status = 204, description = "Session deleted or already gone"),
        (status = 502, description = "Agent service failed", body = mugo_core::error::ApiError)
    ),
    tag = "debug"
)]
pub async fn delete_agent_session(
    State(state): State<AppState>,
    Path((app, user_id, session_id)): Path<(String, String, String)>,
) -> Result<StatusCode, AppError> {
    state
        .agents
        .delete_session(&app, &user_id, &session_id)
        .await
        .map_err(|e| AppError::upstream("deleting agent session", e))?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use mugo_adk::{RunRequest, RunResult};
    use tower::ServiceExt;

    use crate::routes::test_support::{body_json, test_state, test_state_with_agents};

    async fn get(router: axum::Router, uri: &str) -> axum::response::Response {
        router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn lists_recorded_sessions_and_messages() {
        let state = test_state();
        state
            .registry
            .record(
                &RunRequest::user_text("echo_agent", "u1", "s1", "hi"),
                &RunResult::from_events(Vec::new()),
            )
            .await;
        let router = super::router().with_state(state);

        let response = get(router.clone(), "/debug/sessions/u1?app=echo_agent").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["session_ids"][0], "s1");

        let response = get(router.clone(), "/debug/messages/u1/s1").await;
        assert_eq!(body_json(response).await["messages"][0], "hi");

        let response = get(router, "/debug/messages/u1/unknown").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_remote_session_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _missing = server
            .mock("GET", "/api/apps/echo_agent/users/u1/sessions/s1")
            .with_status(404)
            .create_async()
            .await;

        let router = super::router().with_state(test_state_with_agents(&server.url()));
        let response = get(router, "/debug/agent-sessions/echo_agent/u1/s1").await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn deleting_a_gone_session_succeeds() {
        let mut server = mockito::Server::new_async().await;
        let _gone = server
            .mock("DELETE", "/api/apps/echo_agent/users/u1/sessions/s1")
            .with_status(404)
            .create_async()
            .await;

        let response = super::router()
            .with_state(test_state_with_agents(&server.url()))
            .oneshot(
                Request::delete("/debug/agent-sessions/echo_agent/u1/s1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
