//! Tenant dashboard chat: conversations, feedback, escalation and analytics.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use helpmate_database::{
    format_timestamp, Chat, ChatRepository, Integration, IntegrationRepository, MessageRole,
    NewChat, StoredMessage,
};
use helpmate_knowledge::{
    system_prompt, ContextAssembler, ContextRequest, PageMetadata, DEFAULT_PERSONA,
};
use helpmate_orchestrator::{ChatMessage, Orchestrator, DEFAULT_CHAT_TITLE};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::context::{load_knowledge, transcript_history};
use crate::error::{ChatError, ChatResult};
use crate::external::ChatReply;
use crate::store::ConversationStore;
use crate::subscriptions::SubscriptionService;

pub const ESCALATION_NOTICE: &str =
    "This conversation has been escalated to a human agent. An agent will respond shortly.";
const DEFAULT_ANALYTICS_DAYS: i64 = 30;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub message: Option<String>,
    pub chat_id: Option<String>,
    pub integration_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<PageMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub chat_id: Option<String>,
    pub rating: Option<i64>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feedback {
    pub rating: i64,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub id: String,
    pub title: String,
    pub visitor_id: Option<String>,
    pub escalated_to_human: bool,
    pub feedback: Option<Feedback>,
    pub message_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Chat> for ChatSummary {
    fn from(chat: Chat) -> Self {
        Self {
            feedback: chat.feedback_rating.map(|rating| Feedback {
                rating,
                comment: chat.feedback_comment.clone().unwrap_or_default(),
            }),
            id: chat.public_id,
            title: chat.title,
            visitor_id: chat.visitor_id,
            escalated_to_human: chat.escalated,
            message_count: chat.message_count,
            created_at: chat.created_at,
            updated_at: chat.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: String,
}

impl From<StoredMessage> for TranscriptMessage {
    fn from(message: StoredMessage) -> Self {
        Self {
            role: message.role,
            content: message.content,
            timestamp: message.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatTranscript {
    #[serde(flatten)]
    pub chat: ChatSummary,
    pub messages: Vec<TranscriptMessage>,
}

/// Either the user's chat list (no messages) or one full transcript.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChatHistory {
    List(Vec<ChatSummary>),
    Single(ChatTranscript),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayCount {
    pub date: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatAnalytics {
    pub total_chats: i64,
    pub escalated_chats: i64,
    /// Percentage of chats escalated to a human.
    pub escalation_rate: f64,
    pub average_rating: f64,
    pub rated_chats: i64,
    pub total_messages: i64,
    pub messages_per_chat: f64,
    pub chats_by_day: Vec<DayCount>,
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates. A plain end date
/// covers that whole day.
fn parse_bound(value: &str, end_of_day: bool) -> ChatResult<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ChatError::validation(format!("Invalid date '{value}'")))?;
    let start = date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    let bound = if end_of_day {
        start.map(|s| s + Duration::days(1) - Duration::milliseconds(1))
    } else {
        start
    };
    bound.ok_or_else(|| ChatError::validation(format!("Invalid date '{value}'")))
}

pub(crate) fn analytics_window(
    query: &AnalyticsQuery,
    now: DateTime<Utc>,
) -> ChatResult<(String, String)> {
    let end = match query.end_date.as_deref().filter(|v| !v.trim().is_empty()) {
        Some(value) => parse_bound(value, true)?,
        None => now,
    };
    let start = match query.start_date.as_deref().filter(|v| !v.trim().is_empty()) {
        Some(value) => parse_bound(value, false)?,
        None => now - Duration::days(DEFAULT_ANALYTICS_DAYS),
    };
    if start > end {
        return Err(ChatError::validation("startDate must not be after endDate"));
    }
    Ok((format_timestamp(start), format_timestamp(end)))
}

#[derive(Clone)]
pub struct ChatService {
    chats: ChatRepository,
    integrations: IntegrationRepository,
    subscriptions: SubscriptionService,
    orchestrator: Arc<Orchestrator>,
    assembler: Arc<ContextAssembler>,
    conversations: ConversationStore,
}

impl ChatService {
    pub fn new(
        pool: SqlitePool,
        orchestrator: Arc<Orchestrator>,
        assembler: Arc<ContextAssembler>,
        conversations: ConversationStore,
    ) -> Self {
        Self {
            chats: ChatRepository::new(pool.clone()),
            integrations: IntegrationRepository::new(pool.clone()),
            subscriptions: SubscriptionService::new(pool),
            orchestrator,
            assembler,
            conversations,
        }
    }

    /// Answer a dashboard message. Guests (`user_id == None`) get a stateless
    /// answer; signed-in users are quota-checked and their chat is persisted.
    pub async fn send_message(
        &self,
        user_id: Option<i64>,
        request: SendMessageRequest,
    ) -> ChatResult<ChatReply> {
        let message = request
            .message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| ChatError::validation("Message is required"))?;

        if let Some(user_id) = user_id {
            self.subscriptions.check_and_count(user_id).await?;
        }

        let integration_id = request.integration_id.as_deref().filter(|id| !id.trim().is_empty());
        let integration = match integration_id {
            Some(id) => Some(self.find_integration(user_id, id).await?),
            None => None,
        };

        let chat_id = request.chat_id.as_deref().filter(|id| !id.trim().is_empty());
        let existing = match (user_id, chat_id) {
            (Some(user_id), Some(chat_id)) => Some(
                self.chats
                    .find_for_user(user_id, chat_id)
                    .await?
                    .ok_or(ChatError::ChatNotFound)?,
            ),
            _ => None,
        };

        let system = match &integration {
            Some(integration) => {
                let knowledge = load_knowledge(&self.integrations, integration).await?;
                let context = self
                    .assembler
                    .build(ContextRequest {
                        knowledge: &knowledge,
                        page: request.metadata.as_ref(),
                        query: message,
                    })
                    .await;
                system_prompt(&integration.domain, &context.text)
            }
            None => DEFAULT_PERSONA.to_string(),
        };

        let mut messages = vec![ChatMessage::system(system)];
        if let Some(chat) = &existing {
            let stored = self.chats.messages(chat.id).await?;
            messages.extend(transcript_history(stored, self.conversations.max_history()));
        }
        messages.push(ChatMessage::user(message));

        let max_tokens = self.orchestrator.config().dashboard_max_tokens;
        let reply = self.orchestrator.complete(messages, max_tokens).await?;

        let Some(user_id) = user_id else {
            return Ok(ChatReply {
                response: reply,
                chat_id: None,
            });
        };

        let chat = match existing {
            Some(chat) => chat,
            None => {
                self.chats
                    .create(&NewChat {
                        user_id,
                        integration_id: integration.as_ref().map(|i| i.id),
                        visitor_id: None,
                        title: DEFAULT_CHAT_TITLE.to_string(),
                    })
                    .await?
            }
        };

        self.chats
            .append_messages(
                chat.id,
                &[(MessageRole::User, message), (MessageRole::Assistant, reply.as_str())],
            )
            .await?;

        if chat.title == DEFAULT_CHAT_TITLE {
            let title = self.orchestrator.generate_title(message).await;
            self.chats.set_title(chat.id, &title).await?;
        }

        Ok(ChatReply {
            response: reply,
            chat_id: Some(chat.public_id),
        })
    }

    pub async fn history(&self, user_id: i64, chat_id: Option<&str>) -> ChatResult<ChatHistory> {
        match chat_id.filter(|id| !id.trim().is_empty()) {
            Some(chat_id) => {
                let chat = self.owned_chat(user_id, Some(chat_id)).await?;
                let messages = self.chats.messages(chat.id).await?;
                Ok(ChatHistory::Single(ChatTranscript {
                    chat: chat.into(),
                    messages: messages.into_iter().map(TranscriptMessage::from).collect(),
                }))
            }
            None => {
                let chats = self.chats.list_for_user(user_id).await?;
                Ok(ChatHistory::List(chats.into_iter().map(ChatSummary::from).collect()))
            }
        }
    }

    pub async fn submit_feedback(&self, user_id: i64, request: FeedbackRequest) -> ChatResult<()> {
        let (Some(chat_id), Some(rating)) = (
            request.chat_id.as_deref().filter(|id| !id.trim().is_empty()),
            request.rating,
        ) else {
            return Err(ChatError::validation("ChatId and rating are required"));
        };
        if !(1..=5).contains(&rating) {
            return Err(ChatError::validation("Rating must be between 1 and 5"));
        }

        let chat = self.owned_chat(user_id, Some(chat_id)).await?;
        let comment = request.comment.as_deref().map(str::trim).unwrap_or_default();
        self.chats.set_feedback(chat.id, rating, Some(comment)).await?;
        info!(chat = %chat.public_id, rating, "feedback recorded");
        Ok(())
    }

    pub async fn escalate(&self, user_id: i64, chat_id: Option<&str>) -> ChatResult<()> {
        let chat = self.owned_chat(user_id, chat_id).await?;
        self.chats.escalate(chat.id, ESCALATION_NOTICE).await?;
        Ok(())
    }

    pub async fn delete_chat(&self, user_id: i64, chat_id: &str) -> ChatResult<()> {
        let chat = self.owned_chat(user_id, Some(chat_id)).await?;
        self.chats.delete(chat.id).await?;
        let sessions = self.conversations.remove_chat(chat.id).await;
        info!(chat = %chat.public_id, sessions, "chat deleted");
        Ok(())
    }

    /// Totals over chats created in the window; the last 30 days by default.
    pub async fn analytics(
        &self,
        user_id: i64,
        query: &AnalyticsQuery,
    ) -> ChatResult<ChatAnalytics> {
        let (start, end) = analytics_window(query, Utc::now())?;
        let totals = self.chats.analytics(user_id, &start, &end).await?;
        let by_day = self.chats.chats_by_day(user_id, &start, &end).await?;

        let ratio = |part: i64| {
            if totals.total_chats > 0 {
                part as f64 / totals.total_chats as f64
            } else {
                0.0
            }
        };

        Ok(ChatAnalytics {
            total_chats: totals.total_chats,
            escalated_chats: totals.escalated_chats,
            escalation_rate: ratio(totals.escalated_chats) * 100.0,
            average_rating: totals.average_rating.unwrap_or(0.0),
            rated_chats: totals.rated_chats,
            total_messages: totals.total_messages,
            messages_per_chat: ratio(totals.total_messages),
            chats_by_day: by_day
                .into_iter()
                .map(|day| DayCount {
                    date: day.date,
                    count: day.count,
                })
                .collect(),
        })
    }

    async fn owned_chat(&self, user_id: i64, chat_id: Option<&str>) -> ChatResult<Chat> {
        let chat_id = chat_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ChatError::validation("ChatId is required"))?;
        self.chats
            .find_for_user(user_id, chat_id)
            .await?
            .ok_or(ChatError::ChatNotFound)
    }

    /// Signed-in users may only ground chats in their own integrations; guests
    /// may use any active one.
    async fn find_integration(
        &self,
        user_id: Option<i64>,
        integration_id: &str,
    ) -> ChatResult<Integration> {
        let integration = match user_id {
            Some(user_id) => self.integrations.find_for_user(user_id, integration_id).await?,
            None => self
                .integrations
                .find_by_public_id(integration_id)
                .await?
                .filter(|integration| integration.active),
        };
        integration.ok_or(ChatError::IntegrationNotFound)
    }
}
