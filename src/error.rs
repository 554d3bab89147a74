//! Error types for the ladder
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application. Typed failures are raised as [`LadderError`] and can
//! be recovered from an `anyhow::Error` with `downcast_ref`.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific ladder scenarios
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LadderError {
    #[error("Untrusted source {url}: {reason}")]
    UntrustedSource { url: String, reason: String },

    #[error("Malformed document: {reason}")]
    MalformedDocument { reason: String },

    #[error("Invalid skill belief: {reason}")]
    InvalidBelief { reason: String },

    #[error("Rating update failed: {reason}")]
    RatingUpdateFailed { reason: String },

    #[error("Invalid partition: {reason}")]
    InvalidPartition { reason: String },

    #[error("Failed to fetch {url}: {message}")]
    FetchFailed { url: String, message: String },

    #[error("Invalid tournament state: {reason}")]
    TournamentState { reason: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl LadderError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedDocument {
            reason: reason.into(),
        }
    }
}

/// Find the typed ladder error behind an `anyhow::Error`, if there is one
pub fn ladder_error(error: &anyhow::Error) -> Option<&LadderError> {
    error.downcast_ref::<LadderError>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downcast_through_anyhow() {
        let error: anyhow::Error = LadderError::malformed("no rows").into();
        assert_eq!(
            ladder_error(&error),
            Some(&LadderError::MalformedDocument {
                reason: "no rows".to_string()
            })
        );
        assert_eq!(error.to_string(), "Malformed document: no rows");
    }

    #[test]
    fn test_context_keeps_typed_error() {
        let error = anyhow::Error::from(LadderError::InvalidPartition {
            reason: "0 teams".to_string(),
        })
        .context("starting tournament");
        assert!(matches!(
            ladder_error(&error),
            Some(LadderError::InvalidPartition { .. })
        ));
    }
}
