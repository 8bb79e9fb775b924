use thiserror::Error;

use crate::task::TaskStatus;

/// User-facing message for every collaborator failure. The detailed cause is
/// logged, not returned.
pub const GENERATION_FAILED_MESSAGE: &str =
    "Failed to generate task list. The AI model might be unavailable or the request was malformed.";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    /// Rejected locally before anything was dispatched.
    #[error("{0}")]
    Validation(String),
    #[error("a generation request is already in flight")]
    Busy,
    #[error("{0}")]
    Collaborator(String),
    #[error("generator returned an empty response")]
    EmptyResponse,
    #[error("generation cancelled")]
    Cancelled,
    #[error("history entry not found: {0}")]
    HistoryNotFound(String),
}

impl GenerationError {
    /// Message recorded on the history entry and shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            GenerationError::Collaborator(_) | GenerationError::EmptyResponse => {
                GENERATION_FAILED_MESSAGE.to_string()
            }
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error("cannot {action} task {id} in status {from}")]
    InvalidTransition {
        id: String,
        from: TaskStatus,
        action: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
    #[error("success rate must be within [0, 1], got {0}")]
    SuccessRate(f64),
    #[error("history limit must be at least 1")]
    HistoryLimit,
    #[error("no Gemini API key found (set GEMINI_API_KEY or API_KEY, or TESTING=true)")]
    MissingApiKey,
    #[error("provider setup failed: {0}")]
    Provider(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collaborator_failures_share_the_generic_message() {
        let err = GenerationError::Collaborator("http 500: boom".to_string());
        assert_eq!(err.user_message(), GENERATION_FAILED_MESSAGE);
        assert_eq!(GenerationError::EmptyResponse.user_message(), GENERATION_FAILED_MESSAGE);
    }

    #[test]
    fn validation_message_passes_through() {
        let err = GenerationError::Validation("Please enter a development goal.".to_string());
        assert_eq!(err.user_message(), "Please enter a development goal.");
    }
}
