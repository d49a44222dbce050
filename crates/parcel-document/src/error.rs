//! Error types for document parsing

use thiserror::Error;

/// Errors that can occur when parsing an action document
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Bytes are not a well-formed document
    #[error("malformed document: {0}")]
    Parse(#[from] serde_json::Error),

    /// Two steps share a name
    #[error("duplicate step name: {0}")]
    DuplicateStep(String),

    /// Step type is not known to the runner
    #[error("step '{step}' has unknown action type '{action_type}'")]
    UnknownActionType { step: String, action_type: String },

    /// Schema version is missing or not supported
    #[error("unsupported schema version: {0}")]
    UnsupportedSchema(String),

    /// Missing required field
    #[error("missing required field: {0}")]
    MissingField(String),

    /// Invalid field value
    #[error("invalid value for field '{field}': {message}")]
    InvalidFieldValue { field: String, message: String },
}

impl DocumentError {
    /// True for well-formed documents that are semantically invalid.
    ///
    /// Everything except [`DocumentError::Parse`] is a validation failure.
    pub fn is_validation(&self) -> bool {
        !matches!(self, DocumentError::Parse(_))
    }
}

/// Result type for document operations
pub type Result<T> = std::result::Result<T, DocumentError>;
