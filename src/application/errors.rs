use thiserror::Error;

use crate::domain::errors::DomainError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Remote error {code}: {message}")]
    Remote { code: i32, message: String },

    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl ApplicationError {
    pub fn remote(code: i32, message: impl Into<String>) -> Self {
        Self::Remote {
            code,
            message: message.into(),
        }
    }

    /// Status code in the 400/500 convention of the remote protocol
    pub fn code(&self) -> i32 {
        match self {
            ApplicationError::ValidationError(_) => 400,
            ApplicationError::NotFound(_) => 404,
            ApplicationError::Remote { code, .. } => *code,
            ApplicationError::InternalError(_)
            | ApplicationError::ServiceError(_)
            | ApplicationError::Cancelled(_) => 500,
        }
    }
}

impl From<DomainError> for ApplicationError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::NotFound(msg) => ApplicationError::NotFound(msg),
            DomainError::InvalidData(msg) => ApplicationError::ValidationError(msg),
            DomainError::InternalError(msg) => ApplicationError::InternalError(msg),
            DomainError::Remote { code, message } => ApplicationError::Remote { code, message },
        }
    }
}
