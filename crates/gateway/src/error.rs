use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use helpmate_auth::AuthError;
use helpmate_chats::ChatError;
use helpmate_database::DatabaseError;
use helpmate_integrations::IntegrationError;
use helpmate_orchestrator::OrchestratorError;
use serde::Serialize;
use tracing::{error, warn};
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        error!(error = ?error, "internal error");
        Self::internal_server_error("Server error")
    }
}

impl From<DatabaseError> for ApiError {
    fn from(error: DatabaseError) -> Self {
        error!(error = ?error, "database error");
        Self::internal_server_error("Server error")
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(error: OrchestratorError) -> Self {
        error!(error = ?error, "completion error");
        match error {
            OrchestratorError::ApiKeyMissing | OrchestratorError::ProviderMissing => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "AI assistant is not configured",
            ),
            _ => Self::new(StatusCode::BAD_GATEWAY, "Error processing your request"),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::UserExists => Self::bad_request("User already exists"),
            AuthError::Validation(message) => Self::bad_request(message),
            AuthError::InvalidCredentials => Self::unauthorized("Invalid credentials"),
            AuthError::SessionNotFound | AuthError::SessionExpired | AuthError::InvalidSession => {
                Self::unauthorized("Not authorized, token failed")
            }
            AuthError::Database(_) | AuthError::Repository(_) | AuthError::PasswordHash(_) => {
                error!(error = ?error, "auth error");
                Self::internal_server_error("Server error")
            }
        }
    }
}

impl From<IntegrationError> for ApiError {
    fn from(error: IntegrationError) -> Self {
        match error {
            IntegrationError::Validation(message) => Self::bad_request(message),
            IntegrationError::NotFound | IntegrationError::DocumentNotFound => {
                Self::not_found(error.to_string())
            }
            IntegrationError::Database(inner) => inner.into(),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(error: ChatError) -> Self {
        match error {
            ChatError::Validation { message } => Self::bad_request(message),
            ChatError::InvalidApiKey => Self::unauthorized(error.to_string()),
            ChatError::QuotaExceeded => {
                warn!("chat quota exceeded");
                Self::forbidden(error.to_string())
            }
            ChatError::ChatNotFound
            | ChatError::IntegrationNotFound
            | ChatError::SubscriptionNotFound => Self::not_found(error.to_string()),
            ChatError::TrialAlreadyUsed
            | ChatError::AlreadySubscribed
            | ChatError::SubscriptionInactive => Self::bad_request(error.to_string()),
            ChatError::Completion(inner) => inner.into(),
            ChatError::Database(inner) => inner.into(),
        }
    }
}
