use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("version control error: {0}")]
    VersionControl(String),
    /// Retryable service failure (rate limit, 5xx, connection trouble).
    #[error("language model temporarily unavailable: {0}")]
    TransientApi(String),
    #[error("language model error: {0}")]
    FatalApi(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl AppError {
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::TransientApi(_))
    }

    /// Errors that must abort the whole run instead of being absorbed into a
    /// failed chunk.
    pub fn is_fatal_for_pipeline(&self) -> bool {
        matches!(self, AppError::Configuration(_) | AppError::Cancelled)
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_api_errors_are_retryable() {
        assert!(AppError::TransientApi("429".to_string()).is_transient());
        assert!(!AppError::FatalApi("401".to_string()).is_transient());
        assert!(!AppError::Configuration("no model".to_string()).is_transient());
    }

    #[test]
    fn configuration_and_cancellation_abort_the_pipeline() {
        assert!(AppError::Configuration("x".to_string()).is_fatal_for_pipeline());
        assert!(AppError::Cancelled.is_fatal_for_pipeline());
        assert!(!AppError::TransientApi("x".to_string()).is_fatal_for_pipeline());
        assert!(!AppError::FatalApi("x".to_string()).is_fatal_for_pipeline());
    }
}
