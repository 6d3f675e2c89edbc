use chrono::{DateTime, NaiveDate, Utc};
use mugo_core::models::{Assumption, FoodSource, Macros, MealLog, MealType};
use sqlx::PgConnection;
use sqlx::types::Json;
use uuid::Uuid;

use super::IntoId;
use crate::db::error::StoreError;

/// Input for a new meal log. Ids arrive as strings from the request and are
/// parsed by `create`.
#[derive(Debug, Clone)]
pub struct NewMealLog {
    pub user_id: String,
    /// Empty strings count as no conversation
    pub conversation_id: Option<String>,
    pub food_name: String,
    pub meal_type: MealType,
    pub recorded_at: DateTime<Utc>,
    pub macros: Macros,
    pub assumptions: Vec<Assumption>,
    pub food_source: FoodSource,
    pub raw_response: Option<serde_json::Value>,
}

#[derive(sqlx::FromRow)]
struct MealLogRow {
    id: Uuid,
    user_id: Uuid,
    conversation_id: Option<Uuid>,
    food_name: String,
    meal_type: String,
    recorded_at: DateTime<Utc>,
    calories: f64,
    protein: f64,
    carbs: f64,
    fat: f64,
    assumptions: Json<Vec<Assumption>>,
    food_source: String,
    raw_response: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MealLogRow> for MealLog {
    type Error = StoreError;

    fn try_from(row: MealLogRow) -> Result<Self, Self::Error> {
        let meal_type = row
            .meal_type
            .parse::<MealType>()
            .map_err(|message| StoreError::Corrupt {
                what: "meal_type",
                message,
            })?;
        let food_source = row
            .food_source
            .parse::<FoodSource>()
            .map_err(|message| StoreError::Corrupt {
                what: "food_source",
                message,
            })?;

        Ok(MealLog {
            id: row.id,
            user_id: row.user_id,
            conversation_id: row.conversation_id,
            food_name: row.food_name,
            meal_type,
            recorded_at: row.recorded_at,
            macros: Macros {
                calories: row.calories,
                protein: row.protein,
                carbs: row.carbs,
                fat: row.fat,
            },
            assumptions: row.assumptions.0,
            food_source,
            raw_response: row.raw_response,
            created_at: row.created_at,
        })
    }
}

fn into_meals(rows: Vec<MealLogRow>) -> Result<Vec<MealLog>, StoreError> {
    rows.into_iter().map(MealLog::try_from).collect()
}

/// UTC bounds `[start 00:00, end + 1 day 00:00)` of an inclusive date range.
/// The last representable day has no successor and runs to the end of time.
fn day_bounds(start: NaiveDate, end: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let from = start.and_time(chrono::NaiveTime::MIN).and_utc();
    let until = end
        .succ_opt()
        .map(|next| next.and_time(chrono::NaiveTime::MIN).and_utc())
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    (from, until)
}

const COLUMNS: &str = "id, user_id, conversation_id, food_name, meal_type, recorded_at, \
                       calories, protein, carbs, fat, assumptions, food_source, raw_response, created_at";

pub struct MealLogRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> MealLogRepository<'c> {
    pub(super) fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&mut self, meal: NewMealLog) -> Result<MealLog, StoreError> {
        let user_id = meal.user_id.as_str().into_id("user_id")?;
        let conversation_id = match meal.conversation_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => Some(id.into_id("conversation_id")?),
            _ => None,
        };
        let assumptions = serde_json::to_value(&meal.assumptions).map_err(|source| {
            StoreError::Encode {
                what: "assumptions",
                source,
            }
        })?;

        let row = sqlx::query_as::<_, MealLogRow>(&format!(
            "INSERT INTO meal_logs (id, user_id, conversation_id, food_name, meal_type, recorded_at, \
                                    calories, protein, carbs, fat, assumptions, food_source, raw_response) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {COLUMNS}"
        ))
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(conversation_id)
        .bind(&meal.food_name)
        .bind(meal.meal_type.as_str())
        .bind(meal.recorded_at)
        .bind(meal.macros.calories)
        .bind(meal.macros.protein)
        .bind(meal.macros.carbs)
        .bind(meal.macros.fat)
        .bind(assumptions)
        .bind(meal.food_source.as_str())
        .bind(meal.raw_response.as_ref())
        .fetch_one(&mut *self.conn)
        .await
        .map_err(|e| StoreError::query("create meal log", e))?;

        row.try_into()
    }

    pub async fn get_by_id(&mut self, id: impl IntoId) -> Result<Option<MealLog>, StoreError> {
        let id = id.into_id("meal_id")?;
        let row = sqlx::query_as::<_, MealLogRow>(&format!(
            "SELECT {COLUMNS} FROM meal_logs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(|e| StoreError::query("get meal log", e))?;

        row.map(MealLog::try_from).transpose()
    }

    /// Newest first.
    pub async fn list_by_user(
        &mut self,
        user_id: impl IntoId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MealLog>, StoreError> {
        let user_id = user_id.into_id("user_id")?;
        let rows = sqlx::query_as::<_, MealLogRow>(&format!(
            "SELECT {COLUMNS} FROM meal_logs WHERE user_id = $1 \
             ORDER BY recorded_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *self.conn)
        .await
        .map_err(|e| StoreError::query("list meal logs", e))?;

        into_meals(rows)
    }

    /// Meals recorded on `date` (UTC), oldest first.
    pub async fn list_by_user_and_date(
        &mut self,
        user_id: impl IntoId,
        date: NaiveDate,
    ) -> Result<Vec<MealLog>, StoreError> {
        self.list_by_user_and_date_range(user_id, date, date).await
    }

    /// Meals recorded between `start` and `end`, both dates inclusive.
    pub async fn list_by_user_and_date_range(
        &mut self,
        user_id: impl IntoId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<MealLog>, StoreError> {
        let user_id = user_id.into_id("user_id")?;
        let (from, until) = day_bounds(start, end);
        let rows = sqlx::query_as::<_, MealLogRow>(&format!(
            "SELECT {COLUMNS} FROM meal_logs \
             WHERE user_id = $1 AND recorded_at >= $2 AND recorded_at < $3 \
             ORDER BY recorded_at ASC"
        ))
        .bind(user_id)
        .bind(from)
        .bind(until)
        .fetch_all(&mut *self.conn)
        .await
        .map_err(|e| StoreError::query("list meal logs by date", e))?;

        into_meals(rows)
    }

    pub async fn list_by_conversation(
        &mut self,
        conversation_id: impl IntoId,
    ) -> Result<Vec<MealLog>, StoreError> {
        let conversation_id = conversation_id.into_id("conversation_id")?;
        let rows = sqlx::query_as::<_, MealLogRow>(&format!(
            "SELECT {COLUMNS} FROM meal_logs WHERE conversation_id = $1 ORDER BY recorded_at ASC"
        ))
        .bind(conversation_id)
        .fetch_all(&mut *self.conn)
        .await
        .map_err(|e| StoreError::query("list meal logs by conversation", e))?;

        into_meals(rows)
    }

    /// Returns the deleted meal so callers can refresh the affected summaries.
    pub async fn delete(&mut self, id: impl IntoId) -> Result<MealLog, StoreError> {
        let id = id.into_id("meal_id")?;
        let row = sqlx::query_as::<_, MealLogRow>(&format!(
            "DELETE FROM meal_logs WHERE id = $1 RETURNING {COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(|e| StoreError::query("delete meal log", e))?;

        match row {
            Some(row) => row.try_into(),
            None => Err(StoreError::not_found(format!("meal log {id}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use mugo_core::models::{Assumption, FoodSource, Macros, MealType};

    use super::{NewMealLog, day_bounds};
    use crate::db::Database;
    use crate::db::error::StoreError;

    #[test]
    fn day_bounds_cover_whole_days() {
        let start = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();
        let (from, until) = day_bounds(start, end);
        assert_eq!(from, Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
        assert_eq!(until, Utc.with_ymd_and_hms(2026, 3, 4, 0, 0, 0).unwrap());
    }

    #[test]
    fn last_representable_day_has_open_upper_bound() {
        let (from, until) = day_bounds(NaiveDate::MAX, NaiveDate::MAX);
        assert_eq!(from.date_naive(), NaiveDate::MAX);
        assert_eq!(until, chrono::DateTime::<Utc>::MAX_UTC);
    }

    #[tokio::test]
    async fn meal_with_conversation_round_trips() {
        let Some(db) = Database::for_tests().await else {
            eprintln!("TEST_DATABASE_URL not set, skipping");
            return;
        };
        let mut repos = db.repositories().await.unwrap();

        let username = format!("round-trip-{}", uuid::Uuid::now_v7());
        let user = repos.users().create(&username, None).await.unwrap();
        let conversation = repos
            .conversations()
            .create(user.id, "session-1", Some("Lunch chat"))
            .await
            .unwrap();

        let created = repos
            .meal_logs()
            .create(NewMealLog {
                user_id: user.id.to_string(),
                conversation_id: Some(conversation.id.to_string()),
                food_name: "Chicken salad".to_string(),
                meal_type: MealType::Lunch,
                recorded_at: Utc.with_ymd_and_hms(2026, 3, 2, 12, 30, 0).unwrap(),
                macros: Macros {
                    calories: 510.0,
                    protein: 32.5,
                    carbs: 40.0,
                    fat: 22.0,
                },
                assumptions: vec![Assumption {
                    id: Some("A1".to_string()),
                    assumed_value: 150.0,
                    unit: Some("g".to_string()),
                    ..Default::default()
                }],
                food_source: FoodSource::AiEstimated,
                raw_response: Some(serde_json::json!({"macros": {"calories": 510}})),
            })
            .await
            .unwrap();

        let fetched = repos.meal_logs().get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.conversation_id, Some(conversation.id));
        assert_eq!(fetched.meal_type, MealType::Lunch);
        assert_eq!(fetched.food_source, FoodSource::AiEstimated);
        assert_eq!(fetched.macros.protein, 32.5);
        assert_eq!(fetched.assumptions.len(), 1);

        let day = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let on_day = repos.meal_logs().list_by_user_and_date(user.id, day).await.unwrap();
        assert_eq!(on_day.len(), 1);

        let deleted = repos.meal_logs().delete(created.id).await.unwrap();
        assert_eq!(deleted.id, created.id);
        assert!(matches!(
            repos.meal_logs().delete(created.id).await,
            Err(StoreError::NotFound { .. })
        ));

        repos.users().delete(user.id).await.unwrap();
    }

    #[tokio::test]
    async fn malformed_ids_fail_before_querying() {
        let Some(db) = Database::for_tests().await else {
            eprintln!("TEST_DATABASE_URL not set, skipping");
            return;
        };
        let mut repos = db.repositories().await.unwrap();

        let err = repos
            .meal_logs()
            .list_by_user("not-a-uuid", 10, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidId { field: "user_id", .. }));
    }
}
