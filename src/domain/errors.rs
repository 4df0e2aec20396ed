// src/domain/errors.rs
use thiserror::Error;

use crate::domain::models::UserId;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Deal error: {0}")]
    Deal(#[from] DealError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<String> for AppError {
    fn from(s: String) -> Self {
        AppError::Unknown(s)
    }
}

/// Failures of a lifecycle transition.
///
/// Everything except `Store` is a local, synchronous verdict about the
/// request itself; `Store` wraps a backend failure and says nothing about
/// whether the request was valid.
#[derive(Error, Debug)]
pub enum DealError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Already resolved: {0}")]
    AlreadyResolved(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl DealError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        DealError::NotFound { entity, id }
    }

    /// True for the taxonomy variants, false for wrapped backend failures.
    pub fn is_domain(&self) -> bool {
        !matches!(self, DealError::Store(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Record missing: {entity} {id}")]
    Missing { entity: &'static str, id: i64 },

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Unknown recipient: {0}")]
    UnknownRecipient(UserId),

    #[error("Notification queue full")]
    QueueFull,

    #[error("Notification queue closed")]
    Closed,
}

// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
pub type DealResult<T> = Result<T, DealError>;
pub type StoreResult<T> = Result<T, StoreError>;
pub type NotifyResult<T> = Result<T, NotifyError>;
