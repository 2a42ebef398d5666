//! Chats arriving from the embeddable widget on a tenant's website.

use std::sync::Arc;

use helpmate_database::{
    ChatRepository, Integration, IntegrationRepository, MessageRole, NewChat,
};
use helpmate_knowledge::{system_prompt, ContextAssembler, ContextRequest, PageMetadata};
use helpmate_orchestrator::{ChatMessage, Orchestrator};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::context::{load_knowledge, transcript_history};
use crate::error::{ChatError, ChatResult};
use crate::store::{Conversation, ConversationStore};
use crate::subscriptions::SubscriptionService;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalChatRequest {
    pub api_key: Option<String>,
    pub message: Option<String>,
    pub chat_id: Option<String>,
    pub visitor_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<PageMetadata>,
}

/// Assistant answer plus the conversation it belongs to. Guests get no `chatId`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub response: String,
    pub chat_id: Option<String>,
}

pub fn website_chat_title(domain: &str) -> String {
    format!("Website Chat - {domain}")
}

fn required(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Clone)]
pub struct ExternalChatService {
    integrations: IntegrationRepository,
    chats: ChatRepository,
    subscriptions: SubscriptionService,
    orchestrator: Arc<Orchestrator>,
    assembler: Arc<ContextAssembler>,
    store: ConversationStore,
}

impl ExternalChatService {
    pub fn new(
        pool: SqlitePool,
        orchestrator: Arc<Orchestrator>,
        assembler: Arc<ContextAssembler>,
        store: ConversationStore,
    ) -> Self {
        Self {
            integrations: IntegrationRepository::new(pool.clone()),
            chats: ChatRepository::new(pool.clone()),
            subscriptions: SubscriptionService::new(pool),
            orchestrator,
            assembler,
            store,
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Answer one visitor message for the integration owning `api_key`.
    pub async fn process(&self, request: ExternalChatRequest) -> ChatResult<ChatReply> {
        let (Some(api_key), Some(message)) = (
            required(request.api_key.as_deref()),
            required(request.message.as_deref()),
        ) else {
            return Err(ChatError::validation("API key and message are required"));
        };

        let integration = self
            .integrations
            .find_active_by_api_key(api_key)
            .await?
            .ok_or(ChatError::InvalidApiKey)?;

        // Widget traffic is charged to the integration owner.
        self.subscriptions.check_and_count(integration.user_id).await?;

        let session = self
            .resolve_session(&integration, required(request.chat_id.as_deref()))
            .await?;

        let knowledge = load_knowledge(&self.integrations, &integration).await?;
        let context = self
            .assembler
            .build(ContextRequest {
                knowledge: &knowledge,
                page: request.metadata.as_ref(),
                query: message,
            })
            .await;

        let history = session
            .as_ref()
            .map(|(_, conversation)| conversation.history.as_slice())
            .unwrap_or_default();
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(system_prompt(
            &integration.domain,
            &context.text,
        )));
        messages.extend(history.iter().cloned());
        messages.push(ChatMessage::user(message));

        let max_tokens = self.orchestrator.config().widget_max_tokens;
        let reply = self.orchestrator.complete(messages, max_tokens).await?;

        let session_id = match session {
            Some((session_id, conversation)) => {
                self.chats
                    .append_messages(
                        conversation.chat_id,
                        &[(MessageRole::User, message), (MessageRole::Assistant, reply.as_str())],
                    )
                    .await?;
                self.store.append_exchange(&session_id, message, &reply).await;
                session_id
            }
            None => {
                let visitor_id = required(request.visitor_id.as_deref());
                self.start_conversation(&integration, visitor_id, message, &reply)
                    .await?
            }
        };

        debug!(
            integration = %integration.public_id,
            session = %session_id,
            context_tokens = context.estimated_tokens,
            "widget message answered"
        );

        Ok(ChatReply {
            response: reply,
            chat_id: Some(session_id),
        })
    }

    /// The conversation `chat_id` continues, if its transcript still exists
    /// and belongs to this integration. A live session is preferred; otherwise
    /// the transcript is rehydrated into a new one. `None` means the message
    /// starts a new chat.
    async fn resolve_session(
        &self,
        integration: &Integration,
        chat_id: Option<&str>,
    ) -> ChatResult<Option<(String, Conversation)>> {
        let Some(chat_id) = chat_id else {
            return Ok(None);
        };

        let Some(chat) = self
            .chats
            .find_for_integration(integration.id, chat_id)
            .await?
        else {
            // The transcript was deleted under a live session.
            if self.store.get(chat_id, integration.id).await.is_some() {
                self.store.remove(chat_id).await;
                debug!(session = chat_id, "dropped session without a transcript");
            }
            return Ok(None);
        };

        if let Some(conversation) = self.store.get(&chat.public_id, integration.id).await {
            return Ok(Some((chat.public_id, conversation)));
        }

        let stored = self.chats.messages(chat.id).await?;
        let history = transcript_history(stored, self.store.max_history());
        let conversation = Conversation::new(integration.id, chat.visitor_id.clone(), chat.id)
            .with_history(history);
        self.store
            .insert(chat.public_id.clone(), conversation.clone())
            .await;
        debug!(chat = %chat.public_id, "conversation rehydrated from transcript");
        Ok(Some((chat.public_id, conversation)))
    }

    /// Persist the first exchange of a new widget chat and open its session.
    async fn start_conversation(
        &self,
        integration: &Integration,
        visitor_id: Option<&str>,
        message: &str,
        reply: &str,
    ) -> ChatResult<String> {
        let chat = self
            .chats
            .create(&NewChat {
                user_id: integration.user_id,
                integration_id: Some(integration.id),
                visitor_id: visitor_id.map(str::to_string),
                title: website_chat_title(&integration.domain),
            })
            .await?;
        self.chats
            .append_messages(
                chat.id,
                &[(MessageRole::User, message), (MessageRole::Assistant, reply)],
            )
            .await?;

        let history = vec![ChatMessage::user(message), ChatMessage::assistant(reply)];
        let conversation = Conversation::new(integration.id, chat.visitor_id.clone(), chat.id)
            .with_history(history);
        self.store
            .insert(chat.public_id.clone(), conversation)
            .await;

        info!(
            integration = %integration.public_id,
            chat = %chat.public_id,
            "widget conversation started"
        );
        Ok(chat.public_id)
    }
}
