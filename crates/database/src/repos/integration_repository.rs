//! Repository for website integrations and their knowledge base.

use sqlx::SqlitePool;
use tracing::info;

use crate::entities::{Integration, KnowledgeDocument, NewIntegration, NewKnowledgeDocument};
use crate::types::{new_public_id, timestamp, DatabaseError, DatabaseResult};

const INTEGRATION_COLUMNS: &str = "id, public_id, user_id, name, domain, api_key, primary_color,
     position, welcome_message, chat_title, knowledge_enabled, allow_file_attachments, active,
     created_at, updated_at";

const DOCUMENT_COLUMNS: &str =
    "id, public_id, integration_id, name, content, source_url, created_at";

/// Repository for integration database operations
#[derive(Clone)]
pub struct IntegrationRepository {
    pool: SqlitePool,
}

impl IntegrationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, request: &NewIntegration) -> DatabaseResult<Integration> {
        let public_id = new_public_id();
        let now = timestamp();

        sqlx::query(
            "INSERT INTO integrations (public_id, user_id, name, domain, api_key, primary_color,
                position, welcome_message, chat_title, knowledge_enabled, allow_file_attachments,
                active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(&public_id)
        .bind(request.user_id)
        .bind(&request.name)
        .bind(&request.domain)
        .bind(&request.api_key)
        .bind(&request.primary_color)
        .bind(request.position.as_str())
        .bind(&request.welcome_message)
        .bind(&request.chat_title)
        .bind(request.knowledge_enabled)
        .bind(request.allow_file_attachments)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        info!(integration = %public_id, user_id = request.user_id, "integration created");

        let integration = self.find_by_public_id(&public_id).await?;
        integration.ok_or(DatabaseError::NotFound(public_id))
    }

    pub async fn find_by_public_id(&self, public_id: &str) -> DatabaseResult<Option<Integration>> {
        let sql = format!("SELECT {INTEGRATION_COLUMNS} FROM integrations WHERE public_id = ?");
        let integration = sqlx::query_as::<_, Integration>(&sql)
            .bind(public_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(integration)
    }

    /// Lookup restricted to the owning user.
    pub async fn find_for_user(
        &self,
        user_id: i64,
        public_id: &str,
    ) -> DatabaseResult<Option<Integration>> {
        let sql = format!(
            "SELECT {INTEGRATION_COLUMNS} FROM integrations WHERE public_id = ? AND user_id = ?"
        );
        let integration = sqlx::query_as::<_, Integration>(&sql)
            .bind(public_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(integration)
    }

    pub async fn find_active_by_api_key(
        &self,
        api_key: &str,
    ) -> DatabaseResult<Option<Integration>> {
        let sql = format!(
            "SELECT {INTEGRATION_COLUMNS} FROM integrations WHERE api_key = ? AND active = 1"
        );
        let integration = sqlx::query_as::<_, Integration>(&sql)
            .bind(api_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(integration)
    }

    pub async fn list_for_user(&self, user_id: i64) -> DatabaseResult<Vec<Integration>> {
        let sql = format!(
            "SELECT {INTEGRATION_COLUMNS} FROM integrations WHERE user_id = ? ORDER BY created_at
                DESC, id DESC"
        );
        let integrations = sqlx::query_as::<_, Integration>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(integrations)
    }

    pub async fn list_all(&self) -> DatabaseResult<Vec<Integration>> {
        let sql = format!("SELECT {INTEGRATION_COLUMNS} FROM integrations ORDER BY id");
        let integrations = sqlx::query_as::<_, Integration>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(integrations)
    }

    /// Persist every mutable field of an integration and refresh `updated_at`.
    pub async fn update(&self, integration: &Integration) -> DatabaseResult<Integration> {
        sqlx::query(
            "UPDATE integrations SET name = ?, domain = ?, primary_color = ?, position = ?,
                welcome_message = ?, chat_title = ?, knowledge_enabled = ?,
                allow_file_attachments = ?, active = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&integration.name)
        .bind(&integration.domain)
        .bind(&integration.primary_color)
        .bind(integration.position.as_str())
        .bind(&integration.welcome_message)
        .bind(&integration.chat_title)
        .bind(integration.knowledge_enabled)
        .bind(integration.allow_file_attachments)
        .bind(integration.active)
        .bind(timestamp())
        .bind(integration.id)
        .execute(&self.pool)
        .await?;

        self.find_by_public_id(&integration.public_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(integration.public_id.clone()))
    }

    pub async fn set_api_key(&self, integration_id: i64, api_key: &str) -> DatabaseResult<()> {
        sqlx::query("UPDATE integrations SET api_key = ?, updated_at = ? WHERE id = ?")
            .bind(api_key)
            .bind(timestamp())
            .bind(integration_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_knowledge_enabled(
        &self,
        integration_id: i64,
        enabled: bool,
    ) -> DatabaseResult<()> {
        sqlx::query("UPDATE integrations SET knowledge_enabled = ?, updated_at = ? WHERE id = ?")
            .bind(enabled)
            .bind(timestamp())
            .bind(integration_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, integration_id: i64) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM integrations WHERE id = ?")
            .bind(integration_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> DatabaseResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM integrations")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Knowledge URLs in insertion order.
    pub async fn list_urls(&self, integration_id: i64) -> DatabaseResult<Vec<String>> {
        let urls = sqlx::query_scalar(
            "SELECT url FROM knowledge_urls WHERE integration_id = ? ORDER BY id",
        )
        .bind(integration_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(urls)
    }

    /// Returns false when the URL was already present.
    pub async fn add_url(&self, integration_id: i64, url: &str) -> DatabaseResult<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO knowledge_urls (integration_id, url, created_at) VALUES (?, ?,
                ?)",
        )
        .bind(integration_id)
        .bind(url)
        .bind(timestamp())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn remove_url(&self, integration_id: i64, url: &str) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM knowledge_urls WHERE integration_id = ? AND url = ?")
            .bind(integration_id)
            .bind(url)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_documents(
        &self,
        integration_id: i64,
    ) -> DatabaseResult<Vec<KnowledgeDocument>> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM knowledge_documents WHERE integration_id = ? ORDER BY
                id"
        );
        let documents = sqlx::query_as::<_, KnowledgeDocument>(&sql)
            .bind(integration_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(documents)
    }

    pub async fn add_document(
        &self,
        integration_id: i64,
        document: &NewKnowledgeDocument,
    ) -> DatabaseResult<KnowledgeDocument> {
        let public_id = new_public_id();
        let result = sqlx::query(
            "INSERT INTO knowledge_documents (public_id, integration_id, name, content,
                source_url, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&public_id)
        .bind(integration_id)
        .bind(&document.name)
        .bind(&document.content)
        .bind(&document.source_url)
        .bind(timestamp())
        .execute(&self.pool)
        .await?;

        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM knowledge_documents WHERE id = ?");
        let stored = sqlx::query_as::<_, KnowledgeDocument>(&sql)
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await?;
        Ok(stored)
    }

    pub async fn remove_document(
        &self,
        integration_id: i64,
        public_id: &str,
    ) -> DatabaseResult<bool> {
        let result = sqlx::query(
            "DELETE FROM knowledge_documents WHERE integration_id = ? AND public_id = ?",
        )
        .bind(integration_id)
        .bind(public_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
