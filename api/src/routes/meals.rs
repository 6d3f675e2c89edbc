use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use mugo_core::models::{Assumption, FoodSource, Macros, MealLog, MealType};
use serde::{Deserialize, Serialize};

use super::params::{Pagination, parse_date, parse_range};
use crate::db::refresh_summaries;
use crate::db::repository::{IntoId, NewMealLog};
use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/meals", post(create_meal))
        .route("/meals/meal/{meal_id}", get(get_meal).delete(delete_meal))
        .route("/meals/{user_id}", get(list_meals))
        .route("/meals/{user_id}/date/{date}", get(list_meals_by_date))
        .route("/meals/{user_id}/range", get(list_meals_by_range))
        .route(
            "/meals/{user_id}/conversation/{conversation_id}",
            get(list_meals_by_conversation),
        )
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateMealRequest {
    pub user_id: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    pub food_name: String,
    #[serde(default)]
    pub meal_type: MealType,
    /// Defaults to now
    #[serde(default)]
    pub recorded_at: Option<DateTime<Utc>>,
    pub macros: Macros,
    #[serde(default)]
    pub assumptions: Vec<Assumption>,
}

#[derive(Deserialize)]
pub struct RangeQuery {
    pub start_date: String,
    pub end_date: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct MealResponse {
    pub meal: MealLog,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct MealListResponse {
    pub meals: Vec<MealLog>,
}

fn validate_macros(macros: &Macros) -> Result<(), AppError> {
    let values = [
        ("calories", macros.calories),
        ("protein", macros.protein),
        ("carbs", macros.carbs),
        ("fat", macros.fat),
    ];
    for (name, value) in values {
        if !value.is_finite() || value < 0.0 {
            return Err(AppError::Validation {
                message: format!("macros.{name} must be a non-negative number"),
                field: Some(format!("macros.{name}")),
                received: serde_json::Number::from_f64(value).map(serde_json::Value::Number),
                docs_hint: None,
            });
        }
    }
    Ok(())
}

/// Log a meal by hand. The day and week summaries are refreshed in the same
/// transaction.
#[utoipa::path(
    post,
    path = "/meals",
    request_body = CreateMealRequest,
    responses(
        (status = 201, description = "Meal logged", body = MealResponse),
        (status = 400, description = "Invalid meal", body = mugo_core::error::ApiError),
        (status = 503, description = "Persistence unavailable", body = mugo_core::error::ApiError)
    ),
    tag = "meals"
)]
pub async fn create_meal(
    State(state): State<AppState>,
    AppJson(req): AppJson<CreateMealRequest>,
) -> Result<(StatusCode, Json<MealResponse>), AppError> {
    let food_name = req.food_name.trim().to_string();
    if food_name.is_empty() {
        return Err(AppError::validation("food_name", "food_name must not be empty"));
    }
    validate_macros(&req.macros)?;

    let new_meal = NewMealLog {
        user_id: req.user_id,
        conversation_id: req.conversation_id,
        food_name,
        meal_type: req.meal_type,
        recorded_at: req.recorded_at.unwrap_or_else(Utc::now),
        macros: req.macros,
        assumptions: req.assumptions,
        food_source: FoodSource::Manual,
        raw_response: None,
    };

    let meal = state
        .db()?
        .with_tx(move |tx| {
            Box::pin(async move {
                let meal = tx.meal_logs().create(new_meal).await?;
                refresh_summaries(tx, meal.user_id, meal.recorded_at.date_naive()).await?;
                Ok(meal)
            })
        })
        .await?;

    tracing::info!(user_id = %meal.user_id, meal_id = %meal.id, "meal logged");
    Ok((StatusCode::CREATED, Json(MealResponse { meal })))
}

#[utoipa::path(
    get,
    path = "/meals/{user_id}",
    params(("user_id" = String, Path, description = "User ID (UUID)"), Pagination),
    responses(
        (status = 200, description = "Meals, newest first", body = MealListResponse),
        (status = 400, description = "Malformed user ID or paging", body = mugo_core::error::ApiError)
    ),
    tag = "meals"
)]
pub async fn list_meals(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(page): Query<Pagination>,
) -> Result<Json<MealListResponse>, AppError> {
    let (limit, offset) = page.resolve(DEFAULT_LIMIT)?;
    let meals = state
        .db()?
        .repositories()
        .await?
        .meal_logs()
        .list_by_user(&user_id, limit, offset)
        .await?;
    Ok(Json(MealListResponse { meals }))
}

#[utoipa::path(
    get,
    path = "/meals/{user_id}/date/{date}",
    params(
        ("user_id" = String, Path, description = "User ID (UUID)"),
        ("date" = String, Path, description = "Day (YYYY-MM-DD, UTC)")
    ),
    responses(
        (status = 200, description = "Meals of that day, oldest first", body = MealListResponse),
        (status = 400, description = "Malformed user ID or date", body = mugo_core::error::ApiError)
    ),
    tag = "meals"
)]
pub async fn list_meals_by_date(
    State(state): State<AppState>,
    Path((user_id, date)): Path<(String, String)>,
) -> Result<Json<MealListResponse>, AppError> {
    let date = parse_date("date", &date)?;
    let meals = state
        .db()?
        .repositories()
        .await?
        .meal_logs()
        .list_by_user_and_date(&user_id, date)
        .await?;
    Ok(Json(MealListResponse { meals }))
}

#[utoipa::path(
    get,
    path = "/meals/{user_id}/range",
    params(
        ("user_id" = String, Path, description = "User ID (UUID)"),
        ("start_date" = String, Query, description = "First day, inclusive (YYYY-MM-DD)"),
        ("end_date" = String, Query, description = "Last day, inclusive (YYYY-MM-DD)")
    ),
    responses(
        (status = 200, description = "Meals in the range, oldest first", body = MealListResponse),
        (status = 400, description = "Malformed user ID or dates", body = mugo_core::error::ApiError)
    ),
    tag = "meals"
)]
pub async fn list_meals_by_range(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(range): Query<RangeQuery>,
) -> Result<Json<MealListResponse>, AppError> {
    let (start, end) = parse_range(&range.start_date, &range.end_date)?;
    let meals = state
        .db()?
        .repositories()
        .await?
        .meal_logs()
        .list_by_user_and_date_range(&user_id, start, end)
        .await?;
    Ok(Json(MealListResponse { meals }))
}

#[utoipa::path(
    get,
    path = "/meals/{user_id}/conversation/{conversation_id}",
    params(
        ("user_id" = String, Path, description = "User ID (UUID)"),
        ("conversation_id" = String, Path, description = "Conversation ID (UUID)")
    ),
    responses(
        (status = 200, description = "Meals logged in the conversation", body = MealListResponse),
        (status = 400, description = "Malformed ID", body = mugo_core::error::ApiError)
    ),
    tag = "meals"
)]
pub async fn list_meals_by_conversation(
    State(state): State<AppState>,
    Path((user_id, conversation_id)): Path<(String, String)>,
) -> Result<Json<MealListResponse>, AppError> {
    let user_id = user_id.as_str().into_id("user_id")?;
    let meals = state
        .db()?
        .repositories()
        .await?
        .meal_logs()
        .list_by_conversation(&conversation_id)
        .await?
        .into_iter()
        .filter(|meal| meal.user_id == user_id)
        .collect();
    Ok(Json(MealListResponse { meals }))
}

#[utoipa::path(
    get,
    path = "/meals/meal/{meal_id}",
    params(("meal_id" = String, Path, description = "Meal ID (UUID)")),
    responses(
        (status = 200, description = "Meal", body = MealResponse),
        (status = 404, description = "Meal not found", body = mugo_core::error::ApiError)
    ),
    tag = "meals"
)]
pub async fn get_meal(
    State(state): State<AppState>,
    Path(meal_id): Path<String>,
) -> Result<Json<MealResponse>, AppError> {
    let meal = state
        .db()?
        .repositories()
        .await?
        .meal_logs()
        .get_by_id(&meal_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Meal {meal_id}")))?;
    Ok(Json(MealResponse { meal }))
}

#[utoipa::path(
    delete,
    path = "/meals/meal/{meal_id}",
    params(("meal_id" = String, Path, description = "Meal ID (UUID)")),
    responses(
        (status = 204, description = "Meal deleted and summaries refreshed"),
        (status = 404, description = "Meal not found", body = mugo_core::error::ApiError)
    ),
    tag = "meals"
)]
pub async fn delete_meal(
    State(state): State<AppState>,
    Path(meal_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let deleted = state
        .db()?
        .with_tx(move |tx| {
            Box::pin(async move {
                let meal = tx.meal_logs().delete(&meal_id).await?;
                refresh_summaries(tx, meal.user_id, meal.recorded_at.date_naive()).await?;
                Ok(meal)
            })
        })
        .await?;

    tracing::info!(user_id = %deleted.user_id, meal_id = %deleted.id, "meal deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::validate_macros;
    use crate::routes::test_support::{body_json, test_state};
    use mugo_core::models::Macros;

    #[test]
    fn negative_or_non_finite_macros_are_rejected() {
        assert!(validate_macros(&Macros::default()).is_ok());
        let negative = Macros {
            fat: -1.0,
            ..Default::default()
        };
        assert!(validate_macros(&negative).is_err());
        let infinite = Macros {
            calories: f64::INFINITY,
            ..Default::default()
        };
        assert!(validate_macros(&infinite).is_err());
    }

    #[tokio::test]
    async fn malformed_date_is_a_validation_error() {
        let response = super::router()
            .with_state(test_state())
            .oneshot(
                Request::get("/meals/0190a6f2-0000-7000-8000-000000000001/date/03-02-2026")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["field"], "date");
    }

    #[tokio::test]
    async fn out_of_range_years_are_validation_errors() {
        for uri in [
            "/meals/0190a6f2-0000-7000-8000-000000000001/date/+262142-12-31",
            "/meals/0190a6f2-0000-7000-8000-000000000001/range?start_date=2026-01-01&end_date=+262142-12-31",
        ] {
            let response = super::router()
                .with_state(test_state())
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        }
    }

    #[tokio::test]
    async fn manual_meal_without_database_is_unavailable() {
        let response = super::router()
            .with_state(test_state())
            .oneshot(
                Request::post("/meals")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"user_id": "0190a6f2-0000-7000-8000-000000000001",
                            "food_name": "Apple",
                            "macros": {"calories": 95, "protein": 0.5, "carbs": 25, "fat": 0.3}}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
