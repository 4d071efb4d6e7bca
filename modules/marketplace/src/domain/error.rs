use thiserror::Error;
use uuid::Uuid;

/// Domain-specific errors using thiserror
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: Uuid },

    #[error("not authorized: {reason}")]
    Forbidden { reason: String },

    #[error("invalid state: {reason}")]
    InvalidState { reason: String },

    #[error("you cannot make an offer on your own listing")]
    OwnListing,

    #[error("conflict: {reason}")]
    Conflict { reason: String },

    #[error("validation failed: {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("storage error: {message}")]
    Storage { message: String },
}

impl DomainError {
    pub fn listing_not_found(id: Uuid) -> Self {
        Self::NotFound { what: "listing", id }
    }

    pub fn offer_not_found(id: Uuid) -> Self {
        Self::NotFound { what: "offer", id }
    }

    pub fn user_not_found(id: Uuid) -> Self {
        Self::NotFound { what: "user", id }
    }

    pub fn message_not_found(id: Uuid) -> Self {
        Self::NotFound { what: "message", id }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState {
            reason: reason.into(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into(),
        }
    }

    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for DomainError {
    fn from(e: anyhow::Error) -> Self {
        Self::storage(e.to_string())
    }
}
