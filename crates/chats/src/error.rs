//! Error types for chat handling.

use helpmate_database::DatabaseError;
use helpmate_orchestrator::OrchestratorError;
use thiserror::Error;

/// Result type alias for chat operations
pub type ChatResult<T> = Result<T, ChatError>;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{message}")]
    Validation { message: String },

    #[error("Invalid or inactive API key")]
    InvalidApiKey,

    #[error("You have reached your monthly chat limit. Please upgrade your plan for unlimited \
            chats.")]
    QuotaExceeded,

    #[error("Chat not found")]
    ChatNotFound,

    #[error("Integration not found")]
    IntegrationNotFound,

    #[error("No subscription found")]
    SubscriptionNotFound,

    #[error("You have already used your free trial")]
    TrialAlreadyUsed,

    #[error("You already have an active subscription")]
    AlreadySubscribed,

    #[error("Subscription is not active")]
    SubscriptionInactive,

    #[error("AI completion error: {0}")]
    Completion(#[from] OrchestratorError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl ChatError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }
}
