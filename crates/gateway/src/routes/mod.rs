pub mod admin;
pub mod auth;
pub mod chat;
pub mod health;
pub mod integrations;
pub mod subscriptions;

use serde::Serialize;
use utoipa::ToSchema;

/// `{"success": true, "data": ...}`, the envelope most tenant endpoints reply with.
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { success: true, data }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}
