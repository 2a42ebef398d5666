//! HelpMate Database Crate
//!
//! Connection management, migrations, entities and repositories for the
//! HelpMate support backend. Everything is stored in SQLite through `sqlx`.

use sqlx::SqlitePool;
use helpmate_config::DatabaseConfig;

pub mod connection;
pub mod entities;
pub mod migrations;
pub mod repos;
pub mod types;

pub use connection::{prepare_database, DatabaseConnection};
pub use migrations::{run_migrations, MIGRATOR};

pub use repos::{ChatRepository, IntegrationRepository, SubscriptionRepository};

pub use entities::{
    chat::{Chat, ChatAnalyticsRow, DailyChatCount, MessageRole, NewChat, StoredMessage},
    integration::{
        Integration, KnowledgeDocument, NewIntegration, NewKnowledgeDocument, WidgetPosition,
        DEFAULT_CHAT_TITLE, DEFAULT_PRIMARY_COLOR, DEFAULT_WELCOME_MESSAGE,
    },
    subscription::{NewSubscription, PaymentCycle, Plan, Subscription, SubscriptionStatus},
};

pub use types::{errors::DatabaseError, format_timestamp, new_public_id, timestamp, DatabaseResult};

/// Initialize the database with migrations
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    run_migrations(&pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(e.to_string()))?;

    Ok(pool)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tempfile::TempDir;

    pub async fn migrated_pool() -> (SqlitePool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let config = DatabaseConfig {
            url: format!("sqlite://{}", db_path.display()),
            max_connections: 1,
        };

        let pool = initialize_database(&config).await.unwrap();
        (pool, temp_dir)
    }

    pub async fn insert_user(pool: &SqlitePool, email: &str) -> i64 {
        let now = timestamp();
        sqlx::query(
            "INSERT INTO users (public_id, name, email, created_at, updated_at) VALUES (?, ?, ?,
                ?, ?)",
        )
        .bind(new_public_id())
        .bind("Test Owner")
        .bind(email)
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
    }
}
