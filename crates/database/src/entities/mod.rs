//! Domain entities for the database layer
//!
//! Rows are decoded by hand so enum columns stay plain TEXT in SQLite.

pub mod chat;
pub mod integration;
pub mod subscription;

pub use chat::{Chat, ChatAnalyticsRow, DailyChatCount, MessageRole, NewChat, StoredMessage};
pub use integration::{
    Integration, KnowledgeDocument, NewIntegration, NewKnowledgeDocument, WidgetPosition,
};
pub use subscription::{NewSubscription, PaymentCycle, Plan, Subscription, SubscriptionStatus};

pub(crate) fn decode_error(column: &str, message: String) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: message.into(),
    }
}
