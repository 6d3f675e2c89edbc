pub mod error;
pub mod repository;
pub mod tx;

use chrono::NaiveDate;
use futures::future::BoxFuture;
use mugo_core::nutrition::{DayTotals, WeekTotals, week_end, week_start};
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use error::StoreError;
use repository::Repositories;
use tx::{TxRepositories, run_in_transaction};

/// Handle to the Postgres pool. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../migrations").run(&self.pool).await
    }

    pub async fn ping(&self) -> bool {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }

    /// Repositories over a pooled connection, outside any transaction.
    pub async fn repositories(&self) -> Result<Repositories<PoolConnection<Postgres>>, StoreError> {
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| StoreError::query("acquire connection", e))?;
        Ok(Repositories::new(conn))
    }

    /// Run `f` in a transaction. See [`run_in_transaction`] for the commit,
    /// rollback and panic rules.
    pub async fn with_tx<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: for<'t> FnOnce(&'t mut TxRepositories) -> BoxFuture<'t, Result<T, StoreError>>,
    {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::query("begin transaction", e))?;
        run_in_transaction(Repositories::new(tx), f).await
    }

    /// Pool for the database named by `TEST_DATABASE_URL`, migrated. `None`
    /// when the variable is unset so database tests can skip.
    #[cfg(test)]
    pub async fn for_tests() -> Option<Self> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(&url)
            .await
            .expect("TEST_DATABASE_URL is not reachable");
        let db = Self { pool };
        db.migrate().await.expect("migrations failed");
        Some(db)
    }
}

/// Rewrite the day and week summaries that contain `date` from the meal logs.
/// Meant to run inside the transaction that changed the meals.
///
/// The user row stays locked until that transaction ends, so concurrent
/// recomputes for one user run one after the other and the last one sees
/// every committed meal.
pub async fn refresh_summaries(
    tx: &mut TxRepositories,
    user_id: Uuid,
    date: NaiveDate,
) -> Result<(), StoreError> {
    tx.users().lock_for_summaries(user_id).await?;

    let meals = tx.meal_logs().list_by_user_and_date(user_id, date).await?;
    let day = DayTotals::from_meals(&meals);
    tx.nutrition().upsert_daily(user_id, date, &day).await?;

    let monday = week_start(date);
    let days = tx
        .nutrition()
        .list_daily_by_date_range(user_id, monday, week_end(monday), 7, 0)
        .await?;
    let week = WeekTotals::from_days(&days);
    tx.nutrition().upsert_weekly(user_id, monday, &week).await?;

    tracing::debug!(
        user_id = %user_id,
        date = %date,
        day_meals = day.meal_count,
        week_meals = week.meal_count,
        "nutrition summaries refreshed"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use mugo_core::models::{FoodSource, Macros, MealType};

    use super::{Database, refresh_summaries};
    use crate::db::error::StoreError;
    use crate::db::repository::NewMealLog;

    fn meal(user_id: uuid::Uuid, day: u32, calories: f64) -> NewMealLog {
        NewMealLog {
            user_id: user_id.to_string(),
            conversation_id: None,
            food_name: "Oatmeal".to_string(),
            meal_type: MealType::Breakfast,
            recorded_at: Utc.with_ymd_and_hms(2026, 3, day, 8, 0, 0).unwrap(),
            macros: Macros {
                calories,
                protein: 10.0,
                carbs: 50.0,
                fat: 5.0,
            },
            assumptions: Vec::new(),
            food_source: FoodSource::Manual,
            raw_response: None,
        }
    }

    #[tokio::test]
    async fn transaction_writes_meal_and_summaries_together() {
        let Some(db) = Database::for_tests().await else {
            eprintln!("TEST_DATABASE_URL not set, skipping");
            return;
        };
        let username = format!("tx-summary-{}", uuid::Uuid::now_v7());
        let user = db
            .repositories()
            .await
            .unwrap()
            .users()
            .create(&username, None)
            .await
            .unwrap();
        let user_id = user.id;

        // 2026-03-02 is a Monday, 2026-03-04 the Wednesday of the same week
        for (day, calories) in [(2, 300.0), (2, 500.0), (4, 600.0)] {
            db.with_tx(move |tx| {
                Box::pin(async move {
                    let meal = tx.meal_logs().create(meal(user_id, day, calories)).await?;
                    refresh_summaries(tx, user_id, meal.recorded_at.date_naive()).await
                })
            })
            .await
            .unwrap();
        }

        let mut repos = db.repositories().await.unwrap();
        let monday = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let daily = repos.nutrition().get_daily(user_id, monday).await.unwrap().unwrap();
        assert_eq!(daily.total_calories, 800.0);
        assert_eq!(daily.meal_count, 2);

        let weekly = repos.nutrition().get_weekly(user_id, monday).await.unwrap().unwrap();
        assert_eq!(weekly.total_calories, 1400.0);
        assert_eq!(weekly.meal_count, 3);
        assert_eq!(weekly.avg_daily_calories, 700.0);

        repos.users().delete(user_id).await.unwrap();
    }

    #[tokio::test]
    async fn failed_transaction_leaves_nothing_behind() {
        let Some(db) = Database::for_tests().await else {
            eprintln!("TEST_DATABASE_URL not set, skipping");
            return;
        };
        let username = format!("tx-rollback-{}", uuid::Uuid::now_v7());
        let name = username.clone();

        let err = db
            .with_tx(move |tx| {
                Box::pin(async move {
                    tx.users().create(&name, None).await?;
                    Err::<(), _>(StoreError::not_found("something else"))
                })
            })
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::NotFound { .. }));
        let mut repos = db.repositories().await.unwrap();
        assert!(!repos.users().exists(&username).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_meal_writes_keep_summary_counts() {
        let Some(db) = Database::for_tests().await else {
            eprintln!("TEST_DATABASE_URL not set, skipping");
            return;
        };
        let username = format!("tx-concurrent-{}", uuid::Uuid::now_v7());
        let user_id = db
            .repositories()
            .await
            .unwrap()
            .users()
            .create(&username, None)
            .await
            .unwrap()
            .id;

        let writes = (0..4).map(|_| {
            let db = db.clone();
            async move {
                db.with_tx(move |tx| {
                    Box::pin(async move {
                        let meal = tx.meal_logs().create(meal(user_id, 2, 100.0)).await?;
                        refresh_summaries(tx, user_id, meal.recorded_at.date_naive()).await
                    })
                })
                .await
            }
        });
        for outcome in futures::future::join_all(writes).await {
            outcome.unwrap();
        }

        let mut repos = db.repositories().await.unwrap();
        let monday = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let daily = repos.nutrition().get_daily(user_id, monday).await.unwrap().unwrap();
        assert_eq!(daily.meal_count, 4);
        assert_eq!(daily.total_calories, 400.0);
        let weekly = repos.nutrition().get_weekly(user_id, monday).await.unwrap().unwrap();
        assert_eq!(weekly.meal_count, 4);

        repos.users().delete(user_id).await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_conversation_creation_yields_one_row() {
        let Some(db) = Database::for_tests().await else {
            eprintln!("TEST_DATABASE_URL not set, skipping");
            return;
        };
        let username = format!("conv-race-{}", uuid::Uuid::now_v7());
        let user_id = db
            .repositories()
            .await
            .unwrap()
            .users()
            .create(&username, None)
            .await
            .unwrap()
            .id;

        let creates = (0..3).map(|_| {
            let db = db.clone();
            async move {
                db.with_tx(move |tx| {
                    Box::pin(async move { tx.conversations().get_or_create(user_id, "s-race").await })
                })
                .await
            }
        });
        let ids: Vec<_> = futures::future::join_all(creates)
            .await
            .into_iter()
            .map(|outcome| outcome.unwrap().id)
            .collect();
        assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));

        let mut repos = db.repositories().await.unwrap();
        assert_eq!(repos.conversations().list_by_user(user_id).await.unwrap().len(), 1);
        repos.users().delete(user_id).await.unwrap();
    }
}
