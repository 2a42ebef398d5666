//! Chat entity definitions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

use super::decode_error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub public_id: String,
    pub user_id: i64,
    pub integration_id: Option<i64>,
    pub visitor_id: Option<String>,
    pub title: String,
    pub feedback_rating: Option<i64>,
    pub feedback_comment: Option<String>,
    pub escalated: bool,
    pub created_at: String,
    pub updated_at: String,
    pub message_count: i64,
}

impl<'r> FromRow<'r, SqliteRow> for Chat {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            public_id: row.try_get("public_id")?,
            user_id: row.try_get("user_id")?,
            integration_id: row.try_get("integration_id")?,
            visitor_id: row.try_get("visitor_id")?,
            title: row.try_get("title")?,
            feedback_rating: row.try_get("feedback_rating")?,
            feedback_comment: row.try_get("feedback_comment")?,
            escalated: row.try_get("escalated")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            message_count: row.try_get("message_count")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewChat {
    pub user_id: i64,
    pub integration_id: Option<i64>,
    pub visitor_id: Option<String>,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(MessageRole::System),
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("unknown message role '{other}'")),
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted transcript line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: i64,
    pub chat_id: i64,
    pub role: MessageRole,
    pub content: String,
    pub created_at: String,
}

impl<'r> FromRow<'r, SqliteRow> for StoredMessage {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let role: String = row.try_get("role")?;
        Ok(Self {
            id: row.try_get("id")?,
            chat_id: row.try_get("chat_id")?,
            role: role.parse().map_err(|e| decode_error("role", e))?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Aggregates over a user's chats created inside a time window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatAnalyticsRow {
    pub total_chats: i64,
    pub escalated_chats: i64,
    pub rated_chats: i64,
    pub average_rating: Option<f64>,
    pub total_messages: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyChatCount {
    pub date: String,
    pub count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_role_parses_stored_values() {
        for role in [MessageRole::System, MessageRole::User, MessageRole::Assistant] {
            assert_eq!(role.as_str().parse::<MessageRole>().unwrap(), role);
        }
        assert!("moderator".parse::<MessageRole>().is_err());
    }
}
