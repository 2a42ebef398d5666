//! Owner-scoped management of website integrations.

use helpmate_config::WidgetConfig;
use helpmate_database::{
    Integration, IntegrationRepository, KnowledgeDocument, NewIntegration, NewKnowledgeDocument,
    WidgetPosition, DEFAULT_CHAT_TITLE, DEFAULT_PRIMARY_COLOR, DEFAULT_WELCOME_MESSAGE,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{IntegrationError, IntegrationResult};
use crate::validation::{
    normalize_domain, validate_color, validate_document, validate_knowledge_url, validate_name,
};
use crate::widget::widget_code;

const API_KEY_BYTES: usize = 16;

/// Widget appearance as sent by the dashboard. Missing fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetSettingsInput {
    pub primary_color: Option<String>,
    pub position: Option<String>,
    pub welcome_message: Option<String>,
    pub chat_title: Option<String>,
    pub allow_file_attachments: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBaseInput {
    pub enabled: Option<bool>,
    /// Replaces the whole URL list when present.
    pub urls: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntegration {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub widget_settings: Option<WidgetSettingsInput>,
    #[serde(default)]
    pub knowledge_base: Option<KnowledgeBaseInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateIntegration {
    pub name: Option<String>,
    pub domain: Option<String>,
    pub widget_settings: Option<WidgetSettingsInput>,
    pub knowledge_base: Option<KnowledgeBaseInput>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDocument {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetSettingsView {
    pub primary_color: String,
    pub position: WidgetPosition,
    pub welcome_message: String,
    pub chat_title: String,
    pub allow_file_attachments: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentView {
    pub id: String,
    pub name: String,
    pub content: String,
    pub source_url: Option<String>,
    pub created_at: String,
}

impl From<KnowledgeDocument> for DocumentView {
    fn from(document: KnowledgeDocument) -> Self {
        Self {
            id: document.public_id,
            name: document.name,
            content: document.content,
            source_url: document.source_url,
            created_at: document.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBaseView {
    pub enabled: bool,
    pub urls: Vec<String>,
    pub documents: Vec<DocumentView>,
}

/// An integration as the dashboard sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationView {
    pub id: String,
    pub name: String,
    pub domain: String,
    pub api_key: String,
    pub active: bool,
    pub widget_settings: WidgetSettingsView,
    pub knowledge_base: KnowledgeBaseView,
    pub created_at: String,
    pub updated_at: String,
}

/// Fresh API key: 16 random bytes, hex encoded.
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; API_KEY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn parse_position(position: &str) -> IntegrationResult<WidgetPosition> {
    position.trim().parse().map_err(|_| {
        IntegrationError::validation(
            "Position must be one of bottom-right, bottom-left, top-right, top-left",
        )
    })
}

fn non_empty(value: &str, field: &str) -> IntegrationResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(IntegrationError::validation(format!("{field} cannot be empty")));
    }
    Ok(value.to_string())
}

/// Merge dashboard-supplied widget settings into `integration`.
fn apply_widget_settings(
    integration: &mut Integration,
    settings: &WidgetSettingsInput,
) -> IntegrationResult<()> {
    if let Some(color) = &settings.primary_color {
        integration.primary_color = validate_color(color)?;
    }
    if let Some(position) = &settings.position {
        integration.position = parse_position(position)?;
    }
    if let Some(message) = &settings.welcome_message {
        integration.welcome_message = non_empty(message, "Welcome message")?;
    }
    if let Some(title) = &settings.chat_title {
        integration.chat_title = non_empty(title, "Chat title")?;
    }
    if let Some(allow) = settings.allow_file_attachments {
        integration.allow_file_attachments = allow;
    }
    Ok(())
}

#[derive(Clone)]
pub struct IntegrationService {
    repository: IntegrationRepository,
    script_url: String,
}

impl IntegrationService {
    pub fn new(pool: SqlitePool, widget: &WidgetConfig) -> Self {
        Self {
            repository: IntegrationRepository::new(pool),
            script_url: widget.script_url.clone(),
        }
    }

    pub fn repository(&self) -> &IntegrationRepository {
        &self.repository
    }

    pub async fn create(
        &self,
        user_id: i64,
        request: CreateIntegration,
    ) -> IntegrationResult<IntegrationView> {
        let name = validate_name(&request.name)?;
        let domain = normalize_domain(&request.domain)?;

        // Validate against a draft so that defaults and overrides go through the same checks.
        let mut draft = Integration {
            id: 0,
            public_id: String::new(),
            user_id,
            name,
            domain,
            api_key: generate_api_key(),
            primary_color: DEFAULT_PRIMARY_COLOR.to_string(),
            position: WidgetPosition::default(),
            welcome_message: DEFAULT_WELCOME_MESSAGE.to_string(),
            chat_title: DEFAULT_CHAT_TITLE.to_string(),
            knowledge_enabled: false,
            allow_file_attachments: false,
            active: true,
            created_at: String::new(),
            updated_at: String::new(),
        };
        if let Some(settings) = &request.widget_settings {
            apply_widget_settings(&mut draft, settings)?;
        }

        let knowledge = request.knowledge_base.unwrap_or_default();
        let urls = knowledge
            .urls
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|url| validate_knowledge_url(url))
            .collect::<IntegrationResult<Vec<_>>>()?;
        draft.knowledge_enabled = knowledge.enabled.unwrap_or(!urls.is_empty());

        let created = self
            .repository
            .create(&NewIntegration {
                user_id,
                name: draft.name,
                domain: draft.domain,
                api_key: draft.api_key,
                primary_color: draft.primary_color,
                position: draft.position,
                welcome_message: draft.welcome_message,
                chat_title: draft.chat_title,
                knowledge_enabled: draft.knowledge_enabled,
                allow_file_attachments: draft.allow_file_attachments,
            })
            .await?;

        for url in &urls {
            self.repository.add_url(created.id, url).await?;
        }

        self.view(created).await
    }

    pub async fn list(&self, user_id: i64) -> IntegrationResult<Vec<IntegrationView>> {
        let integrations = self.repository.list_for_user(user_id).await?;
        let mut views = Vec::with_capacity(integrations.len());
        for integration in integrations {
            views.push(self.view(integration).await?);
        }
        Ok(views)
    }

    pub async fn get(
        &self,
        user_id: i64,
        integration_id: &str,
    ) -> IntegrationResult<IntegrationView> {
        let integration = self.owned(user_id, integration_id).await?;
        self.view(integration).await
    }

    /// Partial update: only fields present in `request` change.
    pub async fn update(
        &self,
        user_id: i64,
        integration_id: &str,
        request: UpdateIntegration,
    ) -> IntegrationResult<IntegrationView> {
        let mut integration = self.owned(user_id, integration_id).await?;

        if let Some(name) = request.name.as_deref().filter(|n| !n.trim().is_empty()) {
            integration.name = validate_name(name)?;
        }
        if let Some(domain) = request.domain.as_deref().filter(|d| !d.trim().is_empty()) {
            integration.domain = normalize_domain(domain)?;
        }
        if let Some(settings) = &request.widget_settings {
            apply_widget_settings(&mut integration, settings)?;
        }
        if let Some(active) = request.active {
            integration.active = active;
        }

        let mut replacement_urls = None;
        if let Some(knowledge) = &request.knowledge_base {
            if let Some(enabled) = knowledge.enabled {
                integration.knowledge_enabled = enabled;
            }
            if let Some(urls) = &knowledge.urls {
                let urls = urls
                    .iter()
                    .map(|url| validate_knowledge_url(url))
                    .collect::<IntegrationResult<Vec<_>>>()?;
                replacement_urls = Some(urls);
            }
        }

        let updated = self.repository.update(&integration).await?;

        if let Some(urls) = replacement_urls {
            for existing in self.repository.list_urls(updated.id).await? {
                if !urls.contains(&existing) {
                    self.repository.remove_url(updated.id, &existing).await?;
                }
            }
            for url in &urls {
                self.repository.add_url(updated.id, url).await?;
            }
        }

        info!(integration = %updated.public_id, "integration updated");
        self.view(updated).await
    }

    pub async fn delete(&self, user_id: i64, integration_id: &str) -> IntegrationResult<()> {
        let integration = self.owned(user_id, integration_id).await?;
        if !self.repository.delete(integration.id).await? {
            return Err(IntegrationError::NotFound);
        }
        info!(integration = %integration.public_id, "integration deleted");
        Ok(())
    }

    /// Replace the API key. Widgets embedded with the old key stop working.
    pub async fn regenerate_key(
        &self,
        user_id: i64,
        integration_id: &str,
    ) -> IntegrationResult<String> {
        let integration = self.owned(user_id, integration_id).await?;
        let api_key = generate_api_key();
        self.repository.set_api_key(integration.id, &api_key).await?;
        info!(integration = %integration.public_id, "api key regenerated");
        Ok(api_key)
    }

    /// Adding a URL also switches the knowledge base on. Returns the URL list.
    pub async fn add_url(
        &self,
        user_id: i64,
        integration_id: &str,
        url: &str,
    ) -> IntegrationResult<Vec<String>> {
        let url = validate_knowledge_url(url)?;
        let integration = self.owned(user_id, integration_id).await?;

        if !integration.knowledge_enabled {
            self.repository.set_knowledge_enabled(integration.id, true).await?;
        }
        if self.repository.add_url(integration.id, &url).await? {
            info!(integration = %integration.public_id, %url, "knowledge url added");
        }

        Ok(self.repository.list_urls(integration.id).await?)
    }

    pub async fn remove_url(
        &self,
        user_id: i64,
        integration_id: &str,
        url: &str,
    ) -> IntegrationResult<Vec<String>> {
        let url = url.trim();
        if url.is_empty() {
            return Err(IntegrationError::validation("URL is required"));
        }
        let integration = self.owned(user_id, integration_id).await?;
        self.repository.remove_url(integration.id, url).await?;
        Ok(self.repository.list_urls(integration.id).await?)
    }

    pub async fn add_document(
        &self,
        user_id: i64,
        integration_id: &str,
        document: NewDocument,
    ) -> IntegrationResult<DocumentView> {
        validate_document(&document.name, &document.content)?;
        let source_url = match document.source_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Some(validate_knowledge_url(url)?),
            _ => None,
        };
        let integration = self.owned(user_id, integration_id).await?;

        if !integration.knowledge_enabled {
            self.repository.set_knowledge_enabled(integration.id, true).await?;
        }
        let stored = self
            .repository
            .add_document(
                integration.id,
                &NewKnowledgeDocument {
                    name: document.name.trim().to_string(),
                    content: document.content,
                    source_url,
                },
            )
            .await?;

        info!(
            integration = %integration.public_id,
            document = %stored.public_id,
            "knowledge document added"
        );
        Ok(stored.into())
    }

    pub async fn remove_document(
        &self,
        user_id: i64,
        integration_id: &str,
        document_id: &str,
    ) -> IntegrationResult<()> {
        let integration = self.owned(user_id, integration_id).await?;
        if !self.repository.remove_document(integration.id, document_id).await? {
            return Err(IntegrationError::DocumentNotFound);
        }
        Ok(())
    }

    pub async fn widget_code(
        &self,
        user_id: i64,
        integration_id: &str,
    ) -> IntegrationResult<String> {
        let integration = self.owned(user_id, integration_id).await?;
        Ok(widget_code(&integration, &self.script_url))
    }

    async fn owned(&self, user_id: i64, integration_id: &str) -> IntegrationResult<Integration> {
        self.repository
            .find_for_user(user_id, integration_id)
            .await?
            .ok_or(IntegrationError::NotFound)
    }

    async fn view(&self, integration: Integration) -> IntegrationResult<IntegrationView> {
        let urls = self.repository.list_urls(integration.id).await?;
        let documents = self.repository.list_documents(integration.id).await?;

        Ok(IntegrationView {
            id: integration.public_id,
            name: integration.name,
            domain: integration.domain,
            api_key: integration.api_key,
            active: integration.active,
            widget_settings: WidgetSettingsView {
                primary_color: integration.primary_color,
                position: integration.position,
                welcome_message: integration.welcome_message,
                chat_title: integration.chat_title,
                allow_file_attachments: integration.allow_file_attachments,
            },
            knowledge_base: KnowledgeBaseView {
                enabled: integration.knowledge_enabled,
                urls,
                documents: documents.into_iter().map(DocumentView::from).collect(),
            },
            created_at: integration.created_at,
            updated_at: integration.updated_at,
        })
    }
}
