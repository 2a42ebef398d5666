//! Website integration entity definitions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

use super::decode_error;

pub const DEFAULT_PRIMARY_COLOR: &str = "#4F46E5";
pub const DEFAULT_WELCOME_MESSAGE: &str = "Hi there! How can I help you today?";
pub const DEFAULT_CHAT_TITLE: &str = "Customer Support";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Integration {
    pub id: i64,
    pub public_id: String,
    pub user_id: i64,
    pub name: String,
    pub domain: String,
    pub api_key: String,
    pub primary_color: String,
    pub position: WidgetPosition,
    pub welcome_message: String,
    pub chat_title: String,
    pub knowledge_enabled: bool,
    pub allow_file_attachments: bool,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl<'r> FromRow<'r, SqliteRow> for Integration {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let position: String = row.try_get("position")?;
        Ok(Self {
            id: row.try_get("id")?,
            public_id: row.try_get("public_id")?,
            user_id: row.try_get("user_id")?,
            name: row.try_get("name")?,
            domain: row.try_get("domain")?,
            api_key: row.try_get("api_key")?,
            primary_color: row.try_get("primary_color")?,
            position: position.parse().map_err(|e| decode_error("position", e))?,
            welcome_message: row.try_get("welcome_message")?,
            chat_title: row.try_get("chat_title")?,
            knowledge_enabled: row.try_get("knowledge_enabled")?,
            allow_file_attachments: row.try_get("allow_file_attachments")?,
            active: row.try_get("active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewIntegration {
    pub user_id: i64,
    pub name: String,
    pub domain: String,
    pub api_key: String,
    pub primary_color: String,
    pub position: WidgetPosition,
    pub welcome_message: String,
    pub chat_title: String,
    pub knowledge_enabled: bool,
    pub allow_file_attachments: bool,
}

/// Screen corner the widget bubble is pinned to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WidgetPosition {
    #[default]
    BottomRight,
    BottomLeft,
    TopRight,
    TopLeft,
}

impl WidgetPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            WidgetPosition::BottomRight => "bottom-right",
            WidgetPosition::BottomLeft => "bottom-left",
            WidgetPosition::TopRight => "top-right",
            WidgetPosition::TopLeft => "top-left",
        }
    }
}

impl FromStr for WidgetPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bottom-right" => Ok(WidgetPosition::BottomRight),
            "bottom-left" => Ok(WidgetPosition::BottomLeft),
            "top-right" => Ok(WidgetPosition::TopRight),
            "top-left" => Ok(WidgetPosition::TopLeft),
            other => Err(format!("unknown widget position '{other}'")),
        }
    }
}

impl fmt::Display for WidgetPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    pub id: i64,
    pub public_id: String,
    pub integration_id: i64,
    pub name: String,
    pub content: String,
    pub source_url: Option<String>,
    pub created_at: String,
}

impl<'r> FromRow<'r, SqliteRow> for KnowledgeDocument {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            public_id: row.try_get("public_id")?,
            integration_id: row.try_get("integration_id")?,
            name: row.try_get("name")?,
            content: row.try_get("content")?,
            source_url: row.try_get("source_url")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewKnowledgeDocument {
    pub name: String,
    pub content: String,
    pub source_url: Option<String>,
}
