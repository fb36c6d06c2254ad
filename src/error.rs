//! Error types for Clarity Assist.

use crate::capability::CapabilityId;
use crate::session::{MessageId, SessionId};

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    #[error("Routing error: {0}")]
    Route(#[from] RouteError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Session store errors.
///
/// `SessionNotFound` and `MessageNotFound` are recoverable and end up as a
/// toast. `NoActiveSession` means the store invariant was broken.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Session {id} not found")]
    SessionNotFound { id: SessionId },

    #[error("Message {message_id} not found in session {session_id}")]
    MessageNotFound {
        session_id: SessionId,
        message_id: MessageId,
    },

    #[error("No active session")]
    NoActiveSession,
}

/// Failures of the external capability backend.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("Capability {capability} request failed: {reason}")]
    RequestFailed {
        capability: CapabilityId,
        reason: String,
    },

    #[error("Capability {capability} rejected the request with status {status}: {body}")]
    Rejected {
        capability: CapabilityId,
        status: u16,
        body: String,
    },

    #[error("Invalid response from capability {capability}: {reason}")]
    InvalidResponse {
        capability: CapabilityId,
        reason: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Input routing errors.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("A request is already in flight")]
    Busy,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
