use helpmate_database::DatabaseError;
use thiserror::Error;

pub type IntegrationResult<T> = Result<T, IntegrationError>;

#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("{0}")]
    Validation(String),

    #[error("Integration not found")]
    NotFound,

    #[error("Document not found")]
    DocumentNotFound,

    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
}

impl IntegrationError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<sqlx::Error> for IntegrationError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(DatabaseError::Query(err))
    }
}
