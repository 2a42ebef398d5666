use std::path::PathBuf;
use std::sync::Arc;

use axum::http::HeaderMap;
use helpmate_auth::{AuthSession, Authenticator, User};
use helpmate_chats::{ChatService, ConversationStore, ExternalChatService, SubscriptionService};
use helpmate_config::AppConfig;
use helpmate_integrations::IntegrationService;
use helpmate_knowledge::ContextAssembler;
use helpmate_orchestrator::Orchestrator;
use sqlx::SqlitePool;

use crate::util::{bearer_token, require_bearer};
use crate::ApiError;

#[derive(Clone)]
pub struct AppState {
    pool: SqlitePool,
    authenticator: Authenticator,
    integrations: IntegrationService,
    chats: ChatService,
    external_chat: ExternalChatService,
    subscriptions: SubscriptionService,
    widget_asset_dir: PathBuf,
}

impl AppState {
    pub fn new(
        config: &AppConfig,
        pool: SqlitePool,
        authenticator: Authenticator,
        orchestrator: Arc<Orchestrator>,
        assembler: Arc<ContextAssembler>,
        conversations: ConversationStore,
    ) -> Self {
        Self {
            integrations: IntegrationService::new(pool.clone(), &config.widget),
            chats: ChatService::new(
                pool.clone(),
                orchestrator.clone(),
                assembler.clone(),
                conversations.clone(),
            ),
            external_chat: ExternalChatService::new(
                pool.clone(),
                orchestrator,
                assembler,
                conversations,
            ),
            subscriptions: SubscriptionService::new(pool.clone()),
            widget_asset_dir: PathBuf::from(&config.widget.asset_dir),
            authenticator,
            pool,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    pub fn integrations(&self) -> &IntegrationService {
        &self.integrations
    }

    pub fn chats(&self) -> &ChatService {
        &self.chats
    }

    pub fn external_chat(&self) -> &ExternalChatService {
        &self.external_chat
    }

    pub fn subscriptions(&self) -> &SubscriptionService {
        &self.subscriptions
    }

    pub fn widget_script(&self) -> PathBuf {
        self.widget_asset_dir.join("widget.js")
    }

    pub async fn authenticate(&self, token: &str) -> Result<(User, AuthSession), ApiError> {
        self.authenticator
            .authenticate_token(token)
            .await
            .map_err(ApiError::from)
    }

    /// The signed-in user, or 401.
    pub async fn current_user(&self, headers: &HeaderMap) -> Result<User, ApiError> {
        let token = require_bearer(headers)?;
        let (user, _) = self.authenticate(&token).await?;
        Ok(user)
    }

    /// The signed-in user when a valid token is present. Bad tokens are treated as guests.
    pub async fn optional_user(&self, headers: &HeaderMap) -> Option<User> {
        let token = bearer_token(headers)?;
        self.authenticate(&token).await.ok().map(|(user, _)| user)
    }
}
