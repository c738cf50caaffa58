//! Error types for the Rehearse core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the Rehearse workspace.
///
/// This provides typed, structured error variants with automatic conversion
/// from common error types via the `From` trait.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum RehearseError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Persistence collaborator failure (network, storage)
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// A patch failed boundary validation and was not applied
    #[error("Invalid patch: {0}")]
    InvalidPatch(String),

    /// An action precondition was not met
    #[error("Guard violation: {0}")]
    Guard(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RehearseError {
    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates a Persistence error
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates an InvalidPatch error
    pub fn invalid_patch(message: impl Into<String>) -> Self {
        Self::InvalidPatch(message.into())
    }

    /// Creates a Guard error
    pub fn guard(message: impl Into<String>) -> Self {
        Self::Guard(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a guard violation
    pub fn is_guard(&self) -> bool {
        matches!(self, Self::Guard(_))
    }
}

impl From<std::io::Error> for RehearseError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for RehearseError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, RehearseError>`.
pub type Result<T> = std::result::Result<T, RehearseError>;
