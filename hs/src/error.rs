//! Session error types

use thiserror::Error;

use crate::domain::ParticipantId;

/// Result alias used throughout the session core
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur while originating changes in a shared session
///
/// Validation failures are returned before any message reaches the
/// replicated store, so nothing is ever partially applied.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Name '{name}' is already in use in this session")]
    NameConflict { name: String },

    #[error("No entity named '{name}' exists in this session")]
    UnknownName { name: String },

    #[error("Hologram '{name}' is already controlled by {owner}")]
    AlreadyControlled { name: String, owner: ParticipantId },

    #[error("Unsupported shape kind '{kind}' (expected cube, sphere, cylinder, plane or disc)")]
    UnsupportedShapeKind { kind: String },

    #[error("Menu '{name}' has no entries")]
    EmptyMenu { name: String },

    #[error("Hologram '{name}' is not controlled by this participant")]
    NotController { name: String },

    #[error("Animation '{name}' needs a tick interval above zero")]
    InvalidInterval { name: String },

    #[error("Invalid session credentials: {0}")]
    InvalidCredentials(String),

    #[error("Replicated store channel closed")]
    StoreClosed,

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
