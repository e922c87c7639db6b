//! Error types for the studybuddy core
//!
//! Provides one error enum for the state store, the workflows, and the
//! generator client, with context propagation via `thiserror`.

use thiserror::Error;

/// Main error type for the study-assistant core
#[derive(Error, Debug)]
pub enum StudyError {
    /// Caller input outside the accepted range
    #[error("Invalid {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    /// Quiz lookup failures on submission
    #[error("Quiz '{0}' not found")]
    QuizNotFound(String),

    /// Workflow run lookup failures on resume
    #[error("Workflow run '{0}' not found")]
    RunNotFound(String),

    /// AI text generator errors (recovered with fallbacks by callers)
    #[error("Generator error: {0}")]
    Generator(String),

    /// Persistence errors (fatal to the enclosing operation)
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic errors with context
    #[error("{0}")]
    Generic(String),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, StudyError>;

/// Convert anyhow errors from the persistence plumbing
impl From<anyhow::Error> for StudyError {
    fn from(err: anyhow::Error) -> Self {
        StudyError::Persistence(format!("{:#}", err))
    }
}

impl StudyError {
    /// Build an input-validation error
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        StudyError::InvalidInput {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StudyError::invalid("duration", "must be between 5 and 120 minutes");
        assert!(err.to_string().contains("duration"));
        assert!(err.to_string().contains("120"));
    }

    #[test]
    fn test_quiz_not_found_display() {
        let err = StudyError::QuizNotFound("quiz_123".to_string());
        assert!(err.to_string().contains("quiz_123"));
    }
}
