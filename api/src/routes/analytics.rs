use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use mugo_core::models::{DailyNutritionSummary, WeeklyNutritionSummary};
use mugo_core::nutrition::week_start;
use serde::{Deserialize, Serialize};

use super::params::{DateRangeQuery, Pagination, parse_date};
use crate::error::AppError;
use crate::state::AppState;

const DAILY_RANGE_LIMIT: i64 = 30;
const WEEKLY_RANGE_LIMIT: i64 = 12;
const DAILY_HISTORY_LIMIT: i64 = 30;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/analytics/daily/{user_id}", get(daily_summary))
        .route("/analytics/daily/{user_id}/range", get(daily_range))
        .route("/analytics/daily/{user_id}/history", get(daily_history))
        .route("/analytics/weekly/{user_id}", get(weekly_summary))
        .route("/analytics/weekly/{user_id}/range", get(weekly_range))
}

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DailyQuery {
    /// Day (YYYY-MM-DD); defaults to today (UTC)
    pub date: Option<String>,
}

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WeeklyQuery {
    /// Any day of the wanted week (YYYY-MM-DD); defaults to the current week
    pub week_start_date: Option<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct DailySummaryResponse {
    pub summary: DailyNutritionSummary,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct DailySummaryListResponse {
    pub summaries: Vec<DailyNutritionSummary>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct WeeklySummaryResponse {
    pub summary: WeeklyNutritionSummary,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct WeeklySummaryListResponse {
    pub summaries: Vec<WeeklyNutritionSummary>,
}

#[utoipa::path(
    get,
    path = "/analytics/daily/{user_id}",
    params(("user_id" = String, Path, description = "User ID (UUID)"), DailyQuery),
    responses(
        (status = 200, description = "Totals for the day", body = DailySummaryResponse),
        (status = 404, description = "No meals logged that day", body = mugo_core::error::ApiError)
    ),
    tag = "analytics"
)]
pub async fn daily_summary(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<DailyQuery>,
) -> Result<Json<DailySummaryResponse>, AppError> {
    let date = match query.date.as_deref() {
        Some(raw) => parse_date("date", raw)?,
        None => Utc::now().date_naive(),
    };
    let summary = state
        .db()?
        .repositories()
        .await?
        .nutrition()
        .get_daily(&user_id, date)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Daily summary for {date}")))?;
    Ok(Json(DailySummaryResponse { summary }))
}

#[utoipa::path(
    get,
    path = "/analytics/daily/{user_id}/range",
    params(("user_id" = String, Path, description = "User ID (UUID)"), DateRangeQuery),
    responses(
        (status = 200, description = "Daily summaries in the range, oldest first", body = DailySummaryListResponse),
        (status = 400, description = "Malformed dates or paging", body = mugo_core::error::ApiError)
    ),
    tag = "analytics"
)]
pub async fn daily_range(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<DateRangeQuery>,
) -> Result<Json<DailySummaryListResponse>, AppError> {
    let (start, end) = query.dates()?;
    let (limit, offset) = query.page(DAILY_RANGE_LIMIT)?;
    let summaries = state
        .db()?
        .repositories()
        .await?
        .nutrition()
        .list_daily_by_date_range(&user_id, start, end, limit, offset)
        .await?;
    Ok(Json(DailySummaryListResponse { summaries }))
}

#[utoipa::path(
    get,
    path = "/analytics/daily/{user_id}/history",
    params(("user_id" = String, Path, description = "User ID (UUID)"), Pagination),
    responses(
        (status = 200, description = "Daily summaries, most recent day first", body = DailySummaryListResponse),
        (status = 400, description = "Malformed user ID or paging", body = mugo_core::error::ApiError)
    ),
    tag = "analytics"
)]
pub async fn daily_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(page): Query<Pagination>,
) -> Result<Json<DailySummaryListResponse>, AppError> {
    let (limit, offset) = page.resolve(DAILY_HISTORY_LIMIT)?;
    let summaries = state
        .db()?
        .repositories()
        .await?
        .nutrition()
        .list_daily_by_user(&user_id, limit, offset)
        .await?;
    Ok(Json(DailySummaryListResponse { summaries }))
}

#[utoipa::path(
    get,
    path = "/analytics/weekly/{user_id}",
    params(("user_id" = String, Path, description = "User ID (UUID)"), WeeklyQuery),
    responses(
        (status = 200, description = "Totals and daily averages for the week", body = WeeklySummaryResponse),
        (status = 404, description = "No meals logged that week", body = mugo_core::error::ApiError)
    ),
    tag = "analytics"
)]
pub async fn weekly_summary(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<WeeklyQuery>,
) -> Result<Json<WeeklySummaryResponse>, AppError> {
    let day = match query.week_start_date.as_deref() {
        Some(raw) => parse_date("week_start_date", raw)?,
        None => Utc::now().date_naive(),
    };
    let monday = week_start(day);
    let summary = state
        .db()?
        .repositories()
        .await?
        .nutrition()
        .get_weekly(&user_id, monday)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Weekly summary for week of {monday}")))?;
    Ok(Json(WeeklySummaryResponse { summary }))
}

#[utoipa::path(
    get,
    path = "/analytics/weekly/{user_id}/range",
    params(("user_id" = String, Path, description = "User ID (UUID)"), DateRangeQuery),
    responses(
        (status = 200, description = "Weekly summaries starting in the range, oldest first", body = WeeklySummaryListResponse),
        (status = 400, description = "Malformed dates or paging", body = mugo_core::error::ApiError)
    ),
    tag = "analytics"
)]
pub async fn weekly_range(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<DateRangeQuery>,
) -> Result<Json<WeeklySummaryListResponse>, AppError> {
    let (start, end) = query.dates()?;
    let (limit, offset) = query.page(WEEKLY_RANGE_LIMIT)?;
    let summaries = state
        .db()?
        .repositories()
        .await?
        .nutrition()
        .list_weekly_by_date_range(&user_id, start, end, limit, offset)
        .await?;
    Ok(Json(WeeklySummaryListResponse { summaries }))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::routes::test_support::{body_json, test_state};

    async fn get(uri: &str) -> axum::response::Response {
        super::router()
            .with_state(test_state())
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn range_requires_both_dates() {
        let response = get("/analytics/daily/0190a6f2-0000-7000-8000-000000000001/range?start_date=2026-03-01").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn reversed_weekly_range_is_rejected() {
        let response = get(
            "/analytics/weekly/0190a6f2-0000-7000-8000-000000000001/range?start_date=2026-03-09&end_date=2026-03-02",
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["field"], "start_date");
    }

    #[tokio::test]
    async fn history_rejects_zero_limit_before_touching_storage() {
        let response = get("/analytics/daily/0190a6f2-0000-7000-8000-000000000001/history?limit=0").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["field"], "limit");
    }

    #[tokio::test]
    async fn history_without_database_is_unavailable() {
        let response = get("/analytics/daily/0190a6f2-0000-7000-8000-000000000001/history").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn malformed_day_is_rejected() {
        let response = get("/analytics/daily/0190a6f2-0000-7000-8000-000000000001?date=yesterday").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["field"], "date");
    }
}
