//! Event error taxonomy and wire error codes.
//!
//! Every inbound event resolves to either a mutation plus broadcasts or a
//! single `error` frame back to the originating session. Rejections happen
//! before any mutation; only transient store failures can surface after
//! state has already changed (and those are retried, never rolled back).

use parley_store::StoreError;
use serde_json::{json, Value};

// ── Error code constants ────────────────────────────────────────────

/// Missing or malformed identifiers/payload fields.
pub const INVALID_PARAMS: &str = "INVALID_PARAMS";
/// Event name not present in the registry.
pub const EVENT_NOT_FOUND: &str = "EVENT_NOT_FOUND";
/// Generic not-found.
pub const NOT_FOUND: &str = "NOT_FOUND";
/// Unknown conversation.
pub const CONVERSATION_NOT_FOUND: &str = "CONVERSATION_NOT_FOUND";
/// Unknown message.
pub const MESSAGE_NOT_FOUND: &str = "MESSAGE_NOT_FOUND";
/// No pending friend request for that pair.
pub const REQUEST_NOT_FOUND: &str = "REQUEST_NOT_FOUND";
/// No friendship edge for that pair.
pub const FRIEND_NOT_FOUND: &str = "FRIEND_NOT_FOUND";
/// Caller is not a room member / not the message owner.
pub const PERMISSION_DENIED: &str = "PERMISSION_DENIED";
/// Duplicate pending request, already friends, self-request.
pub const CONFLICT: &str = "CONFLICT";
/// Persistence failed; the operation did not take effect.
pub const STORE_ERROR: &str = "STORE_ERROR";
/// Unexpected internal failure (e.g. a handler timeout).
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

/// Error type returned by event handlers.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// Payload failed validation; rejected before any mutation.
    #[error("{message}")]
    Validation {
        /// What is missing or malformed.
        message: String,
    },

    /// Referenced entity does not exist; no mutation, no broadcast.
    #[error("{message}")]
    NotFound {
        /// Specific code (e.g. `MESSAGE_NOT_FOUND`).
        code: &'static str,
        /// Human-readable message.
        message: String,
    },

    /// Caller lacks the right to perform the operation.
    #[error("{message}")]
    Permission {
        /// Why the operation was denied.
        message: String,
    },

    /// The operation is already satisfied or contradicted by current state.
    #[error("{message}")]
    Conflict {
        /// What conflicted.
        message: String,
    },

    /// The store collaborator failed.
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

impl From<serde_json::Error> for EventError {
    fn from(e: serde_json::Error) -> Self {
        Self::Store(StoreError::Serde(e))
    }
}

impl EventError {
    /// Shorthand for a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for a permission failure.
    pub fn permission(message: impl Into<String>) -> Self {
        Self::Permission {
            message: message.into(),
        }
    }

    /// Shorthand for a conflict.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Shorthand for a not-found with a specific code.
    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::NotFound {
            code,
            message: message.into(),
        }
    }

    /// Machine-readable error code for this variant.
    pub fn code(&self) -> &str {
        match self {
            Self::Validation { .. } => INVALID_PARAMS,
            Self::NotFound { code, .. } => code,
            Self::Permission { .. } => PERMISSION_DENIED,
            Self::Conflict { .. } => CONFLICT,
            Self::Store(_) => STORE_ERROR,
        }
    }

    /// Payload of the `error` frame sent back to the originating session.
    pub fn to_error_data(&self, event: &str) -> Value {
        json!({
            "event": event,
            "code": self.code(),
            "message": self.to_string(),
        })
    }
}
