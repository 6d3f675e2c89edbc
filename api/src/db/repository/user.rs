use chrono::{DateTime, Utc};
use mugo_core::models::User;
use sqlx::PgConnection;
use uuid::Uuid;

use super::IntoId;
use crate::db::error::StoreError;

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    metadata: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const COLUMNS: &str = "id, username, metadata, created_at, updated_at";

pub struct UserRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> UserRepository<'c> {
    pub(super) fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Fails with `Conflict` when the username is taken.
    pub async fn create(
        &mut self,
        username: &str,
        metadata: Option<&serde_json::Value>,
    ) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (id, username, metadata) VALUES ($1, $2, $3) RETURNING {COLUMNS}"
        ))
        .bind(Uuid::now_v7())
        .bind(username)
        .bind(metadata)
        .fetch_one(&mut *self.conn)
        .await
        .map_err(|e| StoreError::query("create user", e))?;

        Ok(row.into())
    }

    pub async fn get_by_id(&mut self, id: impl IntoId) -> Result<Option<User>, StoreError> {
        let id = id.into_id("user_id")?;
        let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await
            .map_err(|e| StoreError::query("get user by id", e))?;

        Ok(row.map(User::from))
    }

    pub async fn get_by_username(&mut self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(|e| StoreError::query("get user by username", e))?;

        Ok(row.map(User::from))
    }

    pub async fn exists(&mut self, username: &str) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
            .bind(username)
            .fetch_one(&mut *self.conn)
            .await
            .map_err(|e| StoreError::query("check username", e))
    }

    /// Lock the user row until the transaction ends, serializing writers that
    /// recompute the user's summaries. `FOR NO KEY UPDATE` leaves the
    /// key-share locks taken by inserts referencing the user unblocked.
    pub async fn lock_for_summaries(&mut self, id: impl IntoId) -> Result<(), StoreError> {
        let id = id.into_id("user_id")?;
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE id = $1 FOR NO KEY UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await
            .map_err(|e| StoreError::query("lock user", e))?
            .ok_or_else(|| StoreError::not_found(format!("User {id}")))?;
        Ok(())
    }

    /// All users, newest first.
    pub async fn list(&mut self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {COLUMNS} FROM users ORDER BY created_at DESC"
        ))
        .fetch_all(&mut *self.conn)
        .await
        .map_err(|e| StoreError::query("list users", e))?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    /// Replaces the metadata document wholesale.
    pub async fn update_metadata(
        &mut self,
        id: impl IntoId,
        metadata: Option<&serde_json::Value>,
    ) -> Result<User, StoreError> {
        let id = id.into_id("user_id")?;
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET metadata = $2, updated_at = now() WHERE id = $1 RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(metadata)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(|e| StoreError::query("update user metadata", e))?;

        row.map(User::from)
            .ok_or_else(|| StoreError::not_found(format!("user {id}")))
    }

    /// Deletes the user; conversations, meal logs and summaries cascade.
    pub async fn delete(&mut self, id: impl IntoId) -> Result<(), StoreError> {
        let id = id.into_id("user_id")?;
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *self.conn)
            .await
            .map_err(|e| StoreError::query("delete user", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("user {id}")));
        }
        Ok(())
    }
}
