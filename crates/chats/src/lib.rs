//! # HelpMate Chats Crate
//!
//! Conversation handling for HelpMate: the widget chat pipeline, the tenant
//! dashboard chat, feedback, escalation, analytics and plan quotas.
//!
//! ## Architecture
//!
//! - **external**: widget messages authenticated by an integration API key
//! - **service**: dashboard conversations for signed-in tenants and guests
//! - **store**: in-memory conversation sessions with expiry
//! - **subscriptions**: plan catalogue, trials and chat quotas

mod context;
mod error;
pub mod external;
pub mod service;
pub mod store;
pub mod subscriptions;

pub use error::{ChatError, ChatResult};
pub use external::{website_chat_title, ChatReply, ExternalChatRequest, ExternalChatService};
pub use service::{
    AnalyticsQuery, ChatAnalytics, ChatHistory, ChatService, ChatSummary, ChatTranscript,
    FeedbackRequest, SendMessageRequest, ESCALATION_NOTICE,
};
pub use store::{Conversation, ConversationStore};
pub use subscriptions::{plan_details, plans, PlanDetails, SubscriptionService, SubscriptionView};
