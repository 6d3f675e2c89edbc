use chrono::{DateTime, NaiveDate, Utc};
use mugo_core::models::{DailyNutritionSummary, WeeklyNutritionSummary};
use mugo_core::nutrition::{DayTotals, WeekTotals};
use sqlx::PgConnection;
use uuid::Uuid;

use super::IntoId;
use crate::db::error::StoreError;

#[derive(sqlx::FromRow)]
struct DailyRow {
    id: Uuid,
    user_id: Uuid,
    date: NaiveDate,
    total_calories: f64,
    total_protein: f64,
    total_carbs: f64,
    total_fat: f64,
    meal_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DailyRow> for DailyNutritionSummary {
    fn from(row: DailyRow) -> Self {
        DailyNutritionSummary {
            id: row.id,
            user_id: row.user_id,
            date: row.date,
            total_calories: row.total_calories,
            total_protein: row.total_protein,
            total_carbs: row.total_carbs,
            total_fat: row.total_fat,
            meal_count: row.meal_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct WeeklyRow {
    id: Uuid,
    user_id: Uuid,
    week_start_date: NaiveDate,
    total_calories: f64,
    total_protein: f64,
    total_carbs: f64,
    total_fat: f64,
    avg_daily_calories: f64,
    avg_daily_protein: f64,
    avg_daily_carbs: f64,
    avg_daily_fat: f64,
    meal_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<WeeklyRow> for WeeklyNutritionSummary {
    fn from(row: WeeklyRow) -> Self {
        WeeklyNutritionSummary {
            id: row.id,
            user_id: row.user_id,
            week_start_date: row.week_start_date,
            total_calories: row.total_calories,
            total_protein: row.total_protein,
            total_carbs: row.total_carbs,
            total_fat: row.total_fat,
            avg_daily_calories: row.avg_daily_calories,
            avg_daily_protein: row.avg_daily_protein,
            avg_daily_carbs: row.avg_daily_carbs,
            avg_daily_fat: row.avg_daily_fat,
            meal_count: row.meal_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const DAILY_COLUMNS: &str = "id, user_id, date, total_calories, total_protein, total_carbs, \
                             total_fat, meal_count, created_at, updated_at";

const WEEKLY_COLUMNS: &str = "id, user_id, week_start_date, total_calories, total_protein, \
                              total_carbs, total_fat, avg_daily_calories, avg_daily_protein, \
                              avg_daily_carbs, avg_daily_fat, meal_count, created_at, updated_at";

/// Daily and weekly macro summaries. Rows are derived data: they are
/// rewritten from the meal logs whenever a meal changes.
pub struct NutritionSummaryRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> NutritionSummaryRepository<'c> {
    pub(super) fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    pub async fn upsert_daily(
        &mut self,
        user_id: impl IntoId,
        date: NaiveDate,
        day: &DayTotals,
    ) -> Result<DailyNutritionSummary, StoreError> {
        let user_id = user_id.into_id("user_id")?;
        let row = sqlx::query_as::<_, DailyRow>(&format!(
            "INSERT INTO daily_nutrition_summaries \
                 (id, user_id, date, total_calories, total_protein, total_carbs, total_fat, meal_count) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (user_id, date) DO UPDATE SET \
                 total_calories = EXCLUDED.total_calories, \
                 total_protein = EXCLUDED.total_protein, \
                 total_carbs = EXCLUDED.total_carbs, \
                 total_fat = EXCLUDED.total_fat, \
                 meal_count = EXCLUDED.meal_count, \
                 updated_at = now() \
             RETURNING {DAILY_COLUMNS}"
        ))
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(date)
        .bind(day.totals.calories)
        .bind(day.totals.protein)
        .bind(day.totals.carbs)
        .bind(day.totals.fat)
        .bind(day.meal_count)
        .fetch_one(&mut *self.conn)
        .await
        .map_err(|e| StoreError::query("upsert daily summary", e))?;

        Ok(row.into())
    }

    pub async fn get_daily(
        &mut self,
        user_id: impl IntoId,
        date: NaiveDate,
    ) -> Result<Option<DailyNutritionSummary>, StoreError> {
        let user_id = user_id.into_id("user_id")?;
        let row = sqlx::query_as::<_, DailyRow>(&format!(
            "SELECT {DAILY_COLUMNS} FROM daily_nutrition_summaries WHERE user_id = $1 AND date = $2"
        ))
        .bind(user_id)
        .bind(date)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(|e| StoreError::query("get daily summary", e))?;

        Ok(row.map(DailyNutritionSummary::from))
    }

    /// Newest day first.
    pub async fn list_daily_by_user(
        &mut self,
        user_id: impl IntoId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<DailyNutritionSummary>, StoreError> {
        let user_id = user_id.into_id("user_id")?;
        let rows = sqlx::query_as::<_, DailyRow>(&format!(
            "SELECT {DAILY_COLUMNS} FROM daily_nutrition_summaries WHERE user_id = $1 \
             ORDER BY date DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *self.conn)
        .await
        .map_err(|e| StoreError::query("list daily summaries", e))?;

        Ok(rows.into_iter().map(DailyNutritionSummary::from).collect())
    }

    /// Days between `start` and `end` inclusive, oldest first.
    pub async fn list_daily_by_date_range(
        &mut self,
        user_id: impl IntoId,
        start: NaiveDate,
        end: NaiveDate,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<DailyNutritionSummary>, StoreError> {
        let user_id = user_id.into_id("user_id")?;
        let rows = sqlx::query_as::<_, DailyRow>(&format!(
            "SELECT {DAILY_COLUMNS} FROM daily_nutrition_summaries \
             WHERE user_id = $1 AND date BETWEEN $2 AND $3 \
             ORDER BY date ASC LIMIT $4 OFFSET $5"
        ))
        .bind(user_id)
        .bind(start)
        .bind(end)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *self.conn)
        .await
        .map_err(|e| StoreError::query("list daily summaries by range", e))?;

        Ok(rows.into_iter().map(DailyNutritionSummary::from).collect())
    }

    pub async fn upsert_weekly(
        &mut self,
        user_id: impl IntoId,
        week_start_date: NaiveDate,
        week: &WeekTotals,
    ) -> Result<WeeklyNutritionSummary, StoreError> {
        let user_id = user_id.into_id("user_id")?;
        let row = sqlx::query_as::<_, WeeklyRow>(&format!(
            "INSERT INTO weekly_nutrition_summaries \
                 (id, user_id, week_start_date, total_calories, total_protein, total_carbs, total_fat, \
                  avg_daily_calories, avg_daily_protein, avg_daily_carbs, avg_daily_fat, meal_count) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT (user_id, week_start_date) DO UPDATE SET \
                 total_calories = EXCLUDED.total_calories, \
                 total_protein = EXCLUDED.total_protein, \
                 total_carbs = EXCLUDED.total_carbs, \
                 total_fat = EXCLUDED.total_fat, \
                 avg_daily_calories = EXCLUDED.avg_daily_calories, \
                 avg_daily_protein = EXCLUDED.avg_daily_protein, \
                 avg_daily_carbs = EXCLUDED.avg_daily_carbs, \
                 avg_daily_fat = EXCLUDED.avg_daily_fat, \
                 meal_count = EXCLUDED.meal_count, \
                 updated_at = now() \
             RETURNING {WEEKLY_COLUMNS}"
        ))
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(week_start_date)
        .bind(week.totals.calories)
        .bind(week.totals.protein)
        .bind(week.totals.carbs)
        .bind(week.totals.fat)
        .bind(week.averages.calories)
        .bind(week.averages.protein)
        .bind(week.averages.carbs)
        .bind(week.averages.fat)
        .bind(week.meal_count)
        .fetch_one(&mut *self.conn)
        .await
        .map_err(|e| StoreError::query("upsert weekly summary", e))?;

        Ok(row.into())
    }

    pub async fn get_weekly(
        &mut self,
        user_id: impl IntoId,
        week_start_date: NaiveDate,
    ) -> Result<Option<WeeklyNutritionSummary>, StoreError> {
        let user_id = user_id.into_id("user_id")?;
        let row = sqlx::query_as::<_, WeeklyRow>(&format!(
            "SELECT {WEEKLY_COLUMNS} FROM weekly_nutrition_summaries \
             WHERE user_id = $1 AND week_start_date = $2"
        ))
        .bind(user_id)
        .bind(week_start_date)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(|e| StoreError::query("get weekly summary", e))?;

        Ok(row.map(WeeklyNutritionSummary::from))
    }

    /// Weeks starting between `start` and `end` inclusive, oldest first.
    pub async fn list_weekly_by_date_range(
        &mut self,
        user_id: impl IntoId,
        start: NaiveDate,
        end: NaiveDate,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WeeklyNutritionSummary>, StoreError> {
        let user_id = user_id.into_id("user_id")?;
        let rows = sqlx::query_as::<_, WeeklyRow>(&format!(
            "SELECT {WEEKLY_COLUMNS} FROM weekly_nutrition_summaries \
             WHERE user_id = $1 AND week_start_date BETWEEN $2 AND $3 \
             ORDER BY week_start_date ASC LIMIT $4 OFFSET $5"
        ))
        .bind(user_id)
        .bind(start)
        .bind(end)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *self.conn)
        .await
        .map_err(|e| StoreError::query("list weekly summaries by range", e))?;

        Ok(rows.into_iter().map(WeeklyNutritionSummary::from).collect())
    }
}
