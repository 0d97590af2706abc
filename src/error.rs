//! Error types for thread tree operations.

use thiserror::Error;

/// Result type alias for thread tree operations.
pub type Result<T> = std::result::Result<T, ThreadTreeError>;

/// Main error type for thread tree operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThreadTreeError {
    /// A message names itself as parent/thread root, or its parent chain loops back to it.
    #[error("Structural cycle in message {message_id}: {reason}")]
    StructuralCycle { message_id: String, reason: String },

    /// The message lists boards the registry does not know.
    #[error("Message {message_id} references unknown boards: {}", .boards.join(", "))]
    UnknownBoard {
        message_id: String,
        boards: Vec<String>,
    },

    /// A message id or URI does not have a valid shape.
    #[error("Malformed reference '{reference}': {reason}")]
    MalformedReference { reference: String, reason: String },

    /// Message fails structural well-formedness checks
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Board name errors
    #[error("Invalid board: {0}")]
    InvalidBoard(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A resolver invariant was violated. Always a bug.
    #[error("Internal consistency error: {0}")]
    InternalConsistency(String),
}

impl ThreadTreeError {
    /// Creates a new structural cycle error.
    pub fn structural_cycle<I: ToString, R: ToString>(message_id: I, reason: R) -> Self {
        Self::StructuralCycle {
            message_id: message_id.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Creates a new malformed reference error.
    pub fn malformed_reference<S: ToString, R: ToString>(reference: S, reason: R) -> Self {
        Self::MalformedReference {
            reference: reference.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Creates a new invalid message error.
    pub fn invalid_message<T: ToString>(msg: T) -> Self {
        Self::InvalidMessage(msg.to_string())
    }

    /// Creates a new invalid board error.
    pub fn invalid_board<T: ToString>(msg: T) -> Self {
        Self::InvalidBoard(msg.to_string())
    }

    /// Creates a new configuration error.
    pub fn config<T: ToString>(msg: T) -> Self {
        Self::Config(msg.to_string())
    }

    /// Creates a new internal consistency error.
    pub fn internal<T: ToString>(msg: T) -> Self {
        Self::InternalConsistency(msg.to_string())
    }

    /// Returns true if the message was rejected without touching any state.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::StructuralCycle { .. } | Self::MalformedReference { .. } | Self::InvalidMessage(_)
        )
    }
}

impl From<serde_json::Error> for ThreadTreeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_board_display_lists_boards() {
        let err = ThreadTreeError::UnknownBoard {
            message_id: "m".to_string(),
            boards: vec!["en.a".to_string(), "en.b".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Message m references unknown boards: en.a, en.b"
        );
    }

    #[test]
    fn test_rejection_classification() {
        assert!(ThreadTreeError::structural_cycle("m", "self parent").is_rejection());
        assert!(ThreadTreeError::malformed_reference("x", "no @").is_rejection());
        assert!(!ThreadTreeError::internal("oops").is_rejection());
        assert!(!ThreadTreeError::UnknownBoard {
            message_id: "m".into(),
            boards: vec![],
        }
        .is_rejection());
    }

    #[test]
    fn test_json_error_converts_to_serialization() {
        let err: ThreadTreeError = serde_json::from_str::<u64>("not json").unwrap_err().into();
        assert!(matches!(err, ThreadTreeError::Serialization(_)));
        assert!(!err.is_rejection());
    }
}
