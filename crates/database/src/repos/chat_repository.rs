//! Repository for chat transcripts and chat analytics.

use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::entities::{Chat, ChatAnalyticsRow, DailyChatCount, MessageRole, NewChat, StoredMessage};
use crate::types::{new_public_id, timestamp, DatabaseError, DatabaseResult};

const CHAT_SELECT: &str = "SELECT c.id, c.public_id, c.user_id, c.integration_id, c.visitor_id,
        c.title, c.feedback_rating, c.feedback_comment, c.escalated, c.created_at, c.updated_at,
        (SELECT COUNT(*) FROM chat_messages WHERE chat_id = c.id) AS message_count
     FROM chats c";

/// Repository for chat database operations
#[derive(Clone)]
pub struct ChatRepository {
    pool: SqlitePool,
}

impl ChatRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, request: &NewChat) -> DatabaseResult<Chat> {
        let public_id = new_public_id();
        let now = timestamp();

        sqlx::query(
            "INSERT INTO chats (public_id, user_id, integration_id, visitor_id, title, created_at,
                updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&public_id)
        .bind(request.user_id)
        .bind(request.integration_id)
        .bind(&request.visitor_id)
        .bind(&request.title)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        info!(chat = %public_id, user_id = request.user_id, "chat created");

        let chat = self.find_by_public_id(&public_id).await?;
        chat.ok_or(DatabaseError::NotFound(public_id))
    }

    pub async fn find_by_public_id(&self, public_id: &str) -> DatabaseResult<Option<Chat>> {
        let sql = format!("{CHAT_SELECT} WHERE c.public_id = ?");
        let chat = sqlx::query_as::<_, Chat>(&sql)
            .bind(public_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(chat)
    }

    pub async fn find_for_user(
        &self,
        user_id: i64,
        public_id: &str,
    ) -> DatabaseResult<Option<Chat>> {
        let sql = format!("{CHAT_SELECT} WHERE c.public_id = ? AND c.user_id = ?");
        let chat = sqlx::query_as::<_, Chat>(&sql)
            .bind(public_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(chat)
    }

    /// Chat lookup for the widget path, where the integration is the only authority.
    pub async fn find_for_integration(
        &self,
        integration_id: i64,
        public_id: &str,
    ) -> DatabaseResult<Option<Chat>> {
        let sql = format!("{CHAT_SELECT} WHERE c.public_id = ? AND c.integration_id = ?");
        let chat = sqlx::query_as::<_, Chat>(&sql)
            .bind(public_id)
            .bind(integration_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(chat)
    }

    /// Newest activity first.
    pub async fn list_for_user(&self, user_id: i64) -> DatabaseResult<Vec<Chat>> {
        let sql =
            format!("{CHAT_SELECT} WHERE c.user_id = ? ORDER BY c.updated_at DESC, c.id DESC");
        let chats = sqlx::query_as::<_, Chat>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(chats)
    }

    pub async fn list_all(&self) -> DatabaseResult<Vec<Chat>> {
        let sql = format!("{CHAT_SELECT} ORDER BY c.id");
        let chats = sqlx::query_as::<_, Chat>(&sql).fetch_all(&self.pool).await?;
        Ok(chats)
    }

    pub async fn messages(&self, chat_id: i64) -> DatabaseResult<Vec<StoredMessage>> {
        let messages = sqlx::query_as::<_, StoredMessage>(
            "SELECT id, chat_id, role, content, created_at FROM chat_messages WHERE chat_id = ?
                ORDER BY id",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    /// Append messages in order inside one transaction and bump the chat's `updated_at`.
    pub async fn append_messages(
        &self,
        chat_id: i64,
        messages: &[(MessageRole, &str)],
    ) -> DatabaseResult<()> {
        let now = timestamp();
        let mut tx = self.pool.begin().await?;

        for (role, content) in messages {
            sqlx::query(
                "INSERT INTO chat_messages (chat_id, role, content, created_at) VALUES (?, ?, ?,
                    ?)",
            )
            .bind(chat_id)
            .bind(role.as_str())
            .bind(*content)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE chats SET updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(chat_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn set_title(&self, chat_id: i64, title: &str) -> DatabaseResult<()> {
        sqlx::query("UPDATE chats SET title = ?, updated_at = ? WHERE id = ?")
            .bind(title)
            .bind(timestamp())
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_feedback(
        &self,
        chat_id: i64,
        rating: i64,
        comment: Option<&str>,
    ) -> DatabaseResult<()> {
        sqlx::query(
            "UPDATE chats SET feedback_rating = ?, feedback_comment = ?, updated_at = ? WHERE id =
                ?",
        )
        .bind(rating)
        .bind(comment)
        .bind(timestamp())
        .bind(chat_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Flag the chat for a human agent and record the notice in its transcript.
    pub async fn escalate(&self, chat_id: i64, notice: &str) -> DatabaseResult<()> {
        let now = timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE chats SET escalated = 1, updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(chat_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO chat_messages (chat_id, role, content, created_at) VALUES (?, 'system',
                ?, ?)",
        )
        .bind(chat_id)
        .bind(notice)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(chat_id, "chat escalated");
        Ok(())
    }

    pub async fn delete(&self, chat_id: i64) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM chats WHERE id = ?")
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Totals over chats whose `created_at` lies within `[start, end]`.
    pub async fn analytics(
        &self,
        user_id: i64,
        start: &str,
        end: &str,
    ) -> DatabaseResult<ChatAnalyticsRow> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total_chats,
                    COALESCE(SUM(c.escalated), 0) AS escalated_chats,
                    COUNT(c.feedback_rating) AS rated_chats,
                    AVG(c.feedback_rating) AS average_rating,
                    COALESCE(SUM((SELECT COUNT(*) FROM chat_messages m WHERE m.chat_id = c.id)), 0)
                        AS total_messages
             FROM chats c
             WHERE c.user_id = ? AND c.created_at >= ? AND c.created_at <= ?",
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(ChatAnalyticsRow {
            total_chats: row.try_get("total_chats")?,
            escalated_chats: row.try_get("escalated_chats")?,
            rated_chats: row.try_get("rated_chats")?,
            average_rating: row.try_get("average_rating")?,
            total_messages: row.try_get("total_messages")?,
        })
    }

    /// Chat counts grouped by UTC calendar day, ascending.
    pub async fn chats_by_day(
        &self,
        user_id: i64,
        start: &str,
        end: &str,
    ) -> DatabaseResult<Vec<DailyChatCount>> {
        let rows = sqlx::query(
            "SELECT substr(created_at, 1, 10) AS day, COUNT(*) AS count
             FROM chats
             WHERE user_id = ? AND created_at >= ? AND created_at <= ?
             GROUP BY day
             ORDER BY day",
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(DailyChatCount {
                    date: row.try_get("day")?,
                    count: row.try_get("count")?,
                })
            })
            .collect()
    }

    pub async fn count(&self) -> DatabaseResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM chats")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn count_messages(&self) -> DatabaseResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM chat_messages")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
