use chrono::{DateTime, Utc};
use mugo_core::models::Conversation;
use sqlx::PgConnection;
use uuid::Uuid;

use super::IntoId;
use crate::db::error::StoreError;

#[derive(sqlx::FromRow)]
struct ConversationRow {
    id: Uuid,
    user_id: Uuid,
    session_id: String,
    title: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        Conversation {
            id: row.id,
            user_id: row.user_id,
            session_id: row.session_id,
            title: row.title,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const COLUMNS: &str = "id, user_id, session_id, title, created_at, updated_at";

pub struct ConversationRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> ConversationRepository<'c> {
    pub(super) fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Fails with `Conflict` when the user already has a conversation for
    /// this session.
    pub async fn create(
        &mut self,
        user_id: impl IntoId,
        session_id: &str,
        title: Option<&str>,
    ) -> Result<Conversation, StoreError> {
        let user_id = user_id.into_id("user_id")?;
        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            "INSERT INTO conversations (id, user_id, session_id, title) \
             VALUES ($1, $2, $3, $4) RETURNING {COLUMNS}"
        ))
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(session_id)
        .bind(title)
        .fetch_one(&mut *self.conn)
        .await
        .map_err(|e| StoreError::query("create conversation", e))?;

        Ok(row.into())
    }

    /// The conversation for (user, session), inserted on first use. A
    /// concurrent insert of the same pair resolves to the existing row and
    /// touches its `updated_at`.
    pub async fn get_or_create(
        &mut self,
        user_id: impl IntoId,
        session_id: &str,
    ) -> Result<Conversation, StoreError> {
        let user_id = user_id.into_id("user_id")?;
        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            "INSERT INTO conversations (id, user_id, session_id) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, session_id) DO UPDATE SET updated_at = now() \
             RETURNING {COLUMNS}"
        ))
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(session_id)
        .fetch_one(&mut *self.conn)
        .await
        .map_err(|e| StoreError::query("get or create conversation", e))?;

        Ok(row.into())
    }

    pub async fn get_by_id(&mut self, id: impl IntoId) -> Result<Option<Conversation>, StoreError> {
        let id = id.into_id("conversation_id")?;
        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            "SELECT {COLUMNS} FROM conversations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(|e| StoreError::query("get conversation", e))?;

        Ok(row.map(Conversation::from))
    }

    pub async fn get_by_session_id(
        &mut self,
        user_id: impl IntoId,
        session_id: &str,
    ) -> Result<Option<Conversation>, StoreError> {
        let user_id = user_id.into_id("user_id")?;
        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            "SELECT {COLUMNS} FROM conversations WHERE user_id = $1 AND session_id = $2"
        ))
        .bind(user_id)
        .bind(session_id)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(|e| StoreError::query("get conversation by session", e))?;

        Ok(row.map(Conversation::from))
    }

    /// Most recently active first.
    pub async fn list_by_user(&mut self, user_id: impl IntoId) -> Result<Vec<Conversation>, StoreError> {
        let user_id = user_id.into_id("user_id")?;
        let rows = sqlx::query_as::<_, ConversationRow>(&format!(
            "SELECT {COLUMNS} FROM conversations WHERE user_id = $1 ORDER BY updated_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&mut *self.conn)
        .await
        .map_err(|e| StoreError::query("list conversations", e))?;

        Ok(rows.into_iter().map(Conversation::from).collect())
    }

    pub async fn update_title(
        &mut self,
        id: impl IntoId,
        title: Option<&str>,
    ) -> Result<Conversation, StoreError> {
        let id = id.into_id("conversation_id")?;
        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            "UPDATE conversations SET title = $2, updated_at = now() WHERE id = $1 RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(title)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(|e| StoreError::query("update conversation title", e))?;

        row.map(Conversation::from)
            .ok_or_else(|| StoreError::not_found(format!("conversation {id}")))
    }

    /// Meal logs that referenced the conversation keep their data and lose
    /// the link.
    pub async fn delete(&mut self, id: impl IntoId) -> Result<(), StoreError> {
        let id = id.into_id("conversation_id")?;
        let result = sqlx::query("DELETE FROM conversations WHERE id = $1")
            .bind(id)
            .execute(&mut *self.conn)
            .await
            .map_err(|e| StoreError::query("delete conversation", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("conversation {id}")));
        }
        Ok(())
    }
}
