//! Error types for FinQuest.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FinquestError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FinquestError {
    /// HTTP status classification. Persistence and serialization failures
    /// surface as opaque 500s; nothing internal leaks past the message.
    pub fn status(&self) -> u16 {
        match self {
            FinquestError::NotFound(_) => 404,
            FinquestError::Validation(_) => 400,
            FinquestError::Unauthorized => 401,
            FinquestError::Conflict(_) => 409,
            FinquestError::Db(_) | FinquestError::Json(_) | FinquestError::Internal(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, FinquestError>;
