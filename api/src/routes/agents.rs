use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use mugo_adk::{AgentRuntime, RunRequest, RunResult};
use mugo_core::models::{FoodSource, NutritionPayload};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::error::StoreError;
use crate::db::repository::NewMealLog;
use crate::db::tx::TxRepositories;
use crate::db::{Database, refresh_summaries};
use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/agents", get(list_agents))
        .route("/agents/weather", post(weather))
        .route("/agents/nutrition", post(nutrition))
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct AgentListResponse {
    pub apps: Vec<String>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct WeatherRequest {
    pub user_id: String,
    pub session_id: String,
    /// City to get weather for
    pub city: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct WeatherResponse {
    pub forecast: String,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct NutritionRequest {
    pub user_id: String,
    pub session_id: String,
    /// Free-text description of what was eaten
    pub text: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct NutritionResponse {
    pub analysis: NutritionPayload,
    pub session_id: String,
    /// Set when the estimate was stored as a meal log
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meal_id: Option<Uuid>,
}

/// Run one turn with session auto-creation and record it for the debug
/// endpoints.
pub(crate) async fn run_agent(
    state: &AppState,
    app_name: &str,
    user_id: &str,
    session_id: &str,
    text: &str,
) -> Result<RunResult, mugo_adk::AgentError> {
    let request = RunRequest::user_text(app_name, user_id, session_id, text);
    let result = state.agents.run_with_auto_session(&request).await?;
    state.registry.record(&request, &result).await;
    let recorded_sessions = state.registry.len().await;
    tracing::debug!(
        app_name,
        session_id,
        recorded_sessions,
        "agent run recorded"
    );
    Ok(result)
}

pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(field, format!("{field} must not be empty")));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/agents",
    responses(
        (status = 200, description = "Apps available on the agent service", body = AgentListResponse),
        (status = 502, description = "Agent service failed", body = mugo_core::error::ApiError)
    ),
    tag = "agents"
)]
pub async fn list_agents(State(state): State<AppState>) -> Result<Json<AgentListResponse>, AppError> {
    let apps = state
        .agents
        .list_apps()
        .await
        .map_err(|e| AppError::upstream("listing agent apps", e))?;
    Ok(Json(AgentListResponse { apps }))
}

#[utoipa::path(
    post,
    path = "/agents/weather",
    request_body = WeatherRequest,
    responses(
        (status = 200, description = "Forecast from the weather agent", body = WeatherResponse),
        (status = 400, description = "Invalid request", body = mugo_core::error::ApiError),
        (status = 502, description = "Agent service failed", body = mugo_core::error::ApiError)
    ),
    tag = "agents"
)]
pub async fn weather(
    State(state): State<AppState>,
    AppJson(req): AppJson<WeatherRequest>,
) -> Result<Json<WeatherResponse>, AppError> {
    require_non_empty("user_id", &req.user_id)?;
    require_non_empty("session_id", &req.session_id)?;
    require_non_empty("city", &req.city)?;

    tracing::info!(
        user_id = %req.user_id,
        session_id = %req.session_id,
        city = %req.city,
        "weather request"
    );

    let result = run_agent(&state, &state.apps.weather, &req.user_id, &req.session_id, &req.city)
        .await
        .map_err(|e| AppError::upstream("weather agent processing failed", e))?;

    Ok(Json(WeatherResponse {
        forecast: result.final_text,
    }))
}

#[utoipa::path(
    post,
    path = "/agents/nutrition",
    request_body = NutritionRequest,
    responses(
        (status = 200, description = "Macro estimate with the assumptions behind it", body = NutritionResponse),
        (status = 400, description = "Invalid request", body = mugo_core::error::ApiError),
        (status = 502, description = "Agent service failed or returned invalid JSON", body = mugo_core::error::ApiError)
    ),
    tag = "agents"
)]
pub async fn nutrition(
    State(state): State<AppState>,
    AppJson(req): AppJson<NutritionRequest>,
) -> Result<Json<NutritionResponse>, AppError> {
    require_non_empty("user_id", &req.user_id)?;
    require_non_empty("session_id", &req.session_id)?;
    require_non_empty("text", &req.text)?;

    tracing::info!(
        user_id = %req.user_id,
        session_id = %req.session_id,
        "nutrition request"
    );

    let result = run_agent(&state, &state.apps.nutrition, &req.user_id, &req.session_id, &req.text)
        .await
        .map_err(|e| AppError::upstream("nutrition agent processing failed", e))?;

    let (raw, analysis) = parse_nutrition(&result.final_text)
        .map_err(|e| AppError::upstream("failed to parse nutrition response", e))?;

    let meal_id = match (&state.db, Uuid::parse_str(req.user_id.trim())) {
        (Some(db), Ok(user_id)) => {
            persist_estimate(db, user_id, &req, &analysis, raw).await
        }
        _ => None,
    };

    Ok(Json(NutritionResponse {
        analysis,
        session_id: req.session_id,
        meal_id,
    }))
}

/// Agent output as stored (`raw`) and as returned (normalized payload).
/// Tolerates a surrounding Markdown code fence.
fn parse_nutrition(text: &str) -> Result<(serde_json::Value, NutritionPayload), serde_json::Error> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);

    let raw: serde_json::Value = serde_json::from_str(body)?;
    let mut payload: NutritionPayload = serde_json::from_value(raw.clone())?;
    payload.normalize();
    Ok((raw, payload))
}

/// Store the estimate and refresh the summaries in one transaction. Failures
/// are logged; the caller still gets the analysis.
async fn persist_estimate(
    db: &Database,
    user_id: Uuid,
    req: &NutritionRequest,
    analysis: &NutritionPayload,
    raw: serde_json::Value,
) -> Option<Uuid> {
    let session_id = req.session_id.clone();
    let meal = NewMealLog {
        user_id: user_id.to_string(),
        conversation_id: None,
        food_name: analysis.name.clone().unwrap_or_else(|| req.text.trim().to_string()),
        meal_type: analysis.meal_type(),
        recorded_at: chrono::Utc::now(),
        macros: analysis.macros,
        assumptions: analysis.assumptions.clone(),
        food_source: FoodSource::AiEstimated,
        raw_response: Some(raw),
    };

    let outcome = db
        .with_tx(move |tx| {
            Box::pin(async move {
                let conversation_id = ensure_conversation(tx, user_id, &session_id).await?;
                let meal = tx
                    .meal_logs()
                    .create(NewMealLog {
                        conversation_id: Some(conversation_id.to_string()),
                        ..meal
                    })
                    .await?;
                refresh_summaries(tx, user_id, meal.recorded_at.date_naive()).await?;
                Ok(meal.id)
            })
        })
        .await;

    match outcome {
        Ok(meal_id) => {
            tracing::info!(user_id = %user_id, meal_id = %meal_id, "meal estimate stored");
            Some(meal_id)
        }
        Err(err) => {
            tracing::warn!(user_id = %user_id, error = %err, "failed to store meal estimate");
            None
        }
    }
}

/// The conversation for (user, session), created on first use.
pub(crate) async fn ensure_conversation(
    tx: &mut TxRepositories,
    user_id: Uuid,
    session_id: &str,
) -> Result<Uuid, StoreError> {
    let conversation = tx.conversations().get_or_create(user_id, session_id).await?;
    Ok(conversation.id)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::parse_nutrition;
    use crate::routes::test_support::{body_json, test_state_with_agents};

    fn model_reply(text: &str) -> String {
        serde_json::json!([{
            "author": "macro_estimator",
            "content": {"role": "model", "parts": [{"text": text}]}
        }])
        .to_string()
    }

    fn nutrition_request() -> Request<Body> {
        Request::post("/agents/nutrition")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"user_id": "u1", "session_id": "s1", "text": "two eggs"}"#,
            ))
            .unwrap()
    }

    #[test]
    fn parses_fenced_and_plain_payloads() {
        let plain = r#"{"macros": {"calories": 140, "protein": 12, "carbs": 1, "fat": 10},
                        "assumptions": [{"assumed_value": 100}]}"#;
        let (_, payload) = parse_nutrition(plain).unwrap();
        assert_eq!(payload.assumptions[0].id.as_deref(), Some("A1"));
        assert_eq!(payload.assumptions[0].unit.as_deref(), Some("g"));

        let fenced = format!("```json\n{plain}\n```");
        let (raw, payload) = parse_nutrition(&fenced).unwrap();
        assert_eq!(payload.macros.calories, 140.0);
        assert!(raw["assumptions"][0].get("id").is_none());

        assert!(parse_nutrition("Two eggs are about 140 kcal.").is_err());
    }

    #[tokio::test]
    async fn nutrition_returns_normalized_analysis_without_database() {
        let mut server = mockito::Server::new_async().await;
        let reply = model_reply(
            r#"{"name": "Fried eggs", "meal_type": "breakfast",
                "macros": {"calories": 180, "protein": 12, "carbs": 1, "fat": 14},
                "assumptions": [{"text": "two large eggs", "assumed_value": 100}]}"#,
        );
        let _run = server
            .mock("POST", "/api/run")
            .with_status(200)
            .with_body(reply)
            .create_async()
            .await;

        let state = test_state_with_agents(&server.url());
        let registry = state.registry.clone();
        let response = super::router()
            .with_state(state)
            .oneshot(nutrition_request())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["session_id"], "s1");
        assert_eq!(body["analysis"]["name"], "Fried eggs");
        assert_eq!(body["analysis"]["assumptions"][0]["id"], "A1");
        assert!(body.get("meal_id").is_none());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn prose_from_the_agent_is_a_bad_gateway() {
        let mut server = mockito::Server::new_async().await;
        let _run = server
            .mock("POST", "/api/run")
            .with_status(200)
            .with_body(model_reply("Sorry, I could not estimate that."))
            .create_async()
            .await;

        let response = super::router()
            .with_state(test_state_with_agents(&server.url()))
            .oneshot(nutrition_request())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_json(response).await["error"], "upstream_error");
    }

    #[tokio::test]
    async fn weather_returns_final_text_as_forecast() {
        let mut server = mockito::Server::new_async().await;
        let run = server
            .mock("POST", "/api/run")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "appName": "hello_time_agent",
                "newMessage": {"parts": [{"text": "Berlin"}]}
            })))
            .with_status(200)
            .with_body(model_reply("Sunny, 24C"))
            .expect(1)
            .create_async()
            .await;

        let response = super::router()
            .with_state(test_state_with_agents(&server.url()))
            .oneshot(
                Request::post("/agents/weather")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"user_id": "u1", "session_id": "s1", "city": "Berlin"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["forecast"], "Sunny, 24C");
        run.assert_async().await;
    }

    #[tokio::test]
    async fn empty_city_is_rejected_before_calling_the_agent() {
        let response = super::router()
            .with_state(test_state_with_agents("http://127.0.0.1:9"))
            .oneshot(
                Request::post("/agents/weather")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"user_id": "u1", "session_id": "s1", "city": " "}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["field"], "city");
    }
}
