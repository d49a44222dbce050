//! Errors raised while resolving or running a step's action

use std::time::Duration;
use thiserror::Error;

/// Anything that stops an action from producing an [`ActionResult`].
///
/// The engine never propagates these out of a run; each one becomes the
/// failed result of the step that raised it.
///
/// [`ActionResult`]: crate::ActionResult
#[derive(Debug, Error)]
pub enum ActionError {
    /// No action registered for the step's type tag
    #[error("no action registered for type {0}")]
    NotFound(String),

    #[error("step failed: {0}")]
    ExecutionFailed(String),

    #[error("step exceeded its {0:?} timeout")]
    Timeout(Duration),

    /// Input present but of the wrong shape or value
    #[error("input rejected: {0}")]
    InvalidInput(String),

    #[error("required input {0} is missing")]
    MissingInput(String),

    /// A whole step list is unusable (duplicate names, unknown types)
    #[error("steps rejected: {0}")]
    ValidationFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("malformed JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ActionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offender() {
        let cases = [
            (
                ActionError::NotFound("runPowerShellScript".into()),
                "no action registered for type runPowerShellScript",
            ),
            (
                ActionError::Timeout(Duration::from_secs(30)),
                "step exceeded its 30s timeout",
            ),
            (
                ActionError::MissingInput("runCommand".into()),
                "required input runCommand is missing",
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.to_string(), expected);
        }
    }

    #[test]
    fn test_io_errors_keep_their_message() {
        let err: ActionError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only filesystem").into();

        assert!(matches!(err, ActionError::Io(_)));
        assert_eq!(err.to_string(), "read-only filesystem");
    }
}
