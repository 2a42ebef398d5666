//! Database repository implementations

pub mod chat_repository;
pub mod integration_repository;
pub mod subscription_repository;

pub use chat_repository::ChatRepository;
pub use integration_repository::IntegrationRepository;
pub use subscription_repository::SubscriptionRepository;
