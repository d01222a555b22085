use domain::{DomainError, GatewayError};
use thiserror::Error;

use crate::config::ConfigValidationError;

/// Errors surfaced to callers of the client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The request was understood but refused: invalid input or a state conflict.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Store or network failure; the same call may succeed later.
    #[error("Temporarily unavailable: {0}")]
    Transient(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Stable machine-readable code for UI mapping.
    pub fn code(&self) -> &'static str {
        match self {
            ClientError::NotAuthenticated => "not_authenticated",
            ClientError::NotFound(_) => "not_found",
            ClientError::Forbidden(_) => "forbidden",
            ClientError::Rejected(_) => "rejected",
            ClientError::Transient(_) => "transient",
            ClientError::Config(_) => "config",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Transient(_))
    }
}

impl From<GatewayError> for ClientError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Transient(msg) => ClientError::Transient(msg),
            GatewayError::Conflict(msg) => ClientError::Rejected(msg),
            GatewayError::NotFound(msg) => ClientError::NotFound(msg),
            GatewayError::Malformed(msg) => {
                tracing::error!("Malformed row from store: {}", msg);
                ClientError::Transient(format!("Malformed row: {}", msg))
            }
        }
    }
}

impl From<DomainError> for ClientError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotAuthenticated => ClientError::NotAuthenticated,
            DomainError::NotFound(msg) => ClientError::NotFound(msg),
            DomainError::Forbidden(msg) => ClientError::Forbidden(msg),
            DomainError::Conflict(msg) | DomainError::Validation(msg) => ClientError::Rejected(msg),
            DomainError::Gateway(err) => err.into(),
        }
    }
}

impl From<config::ConfigError> for ClientError {
    fn from(err: config::ConfigError) -> Self {
        ClientError::Config(err.to_string())
    }
}

impl From<ConfigValidationError> for ClientError {
    fn from(err: ConfigValidationError) -> Self {
        ClientError::Config(err.to_string())
    }
}
