use thiserror::Error;

/// Application-wide error types for JobHunter.
#[derive(Error, Debug)]
pub enum AppError {
    /// Navigating or extracting a target site failed.
    #[error("Error during discovery phase: {0}")]
    Discovery(String),

    /// The classifier response could not be parsed or merged.
    #[error("Error during classification phase: {0}")]
    Classification(String),

    /// Delivering a message to a notification channel failed.
    #[error("Error during notification phase: {0}")]
    Notification(String),

    /// Nothing new to report. Not a failure, but it ends the run early.
    #[error("No new jobs found")]
    NoNewPostings,

    /// A caller passed input the operation cannot work with.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Persisting the dedup record failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The browser driver reported an error.
    #[error("Browser error: {0}")]
    Browser(String),

    /// LLM API call failed.
    #[error("LLM error (HTTP {status_code}): {message}")]
    LlmError { message: String, status_code: u16 },

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Run configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true for the error kinds whose own message is sent to the user.
    ///
    /// Everything else is logged in full and reported generically.
    pub fn is_reportable(&self) -> bool {
        matches!(
            self,
            AppError::Discovery(_)
                | AppError::Classification(_)
                | AppError::Notification(_)
                | AppError::NoNewPostings
        )
    }

    /// Text sent to the notification channels when a run ends with this error.
    pub fn user_message(&self) -> String {
        if self.is_reportable() {
            self.to_string()
        } else {
            "Unknown error occurred, check the logs.".to_string()
        }
    }

    /// Short label used in logs and run outcomes.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Discovery(_) => "discovery",
            AppError::Classification(_) => "classification",
            AppError::Notification(_) => "notification",
            AppError::NoNewPostings => "no_new_postings",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::Storage(_) => "storage",
            AppError::Browser(_) => "browser",
            AppError::LlmError { .. } => "llm",
            AppError::HttpError(_) => "http",
            AppError::Timeout(_) => "timeout",
            AppError::RateLimitExceeded => "rate_limit",
            AppError::NetworkError(_) => "network",
            AppError::ConfigError(_) => "config",
            AppError::SerializationError(_) => "serialization",
            AppError::Generic(_) => "generic",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reportable_errors() {
        assert!(AppError::Discovery("site down".into()).is_reportable());
        assert!(AppError::Classification("bad json".into()).is_reportable());
        assert!(AppError::Notification("telegram 500".into()).is_reportable());
        assert!(AppError::NoNewPostings.is_reportable());
        assert!(!AppError::Storage("disk full".into()).is_reportable());
        assert!(!AppError::Timeout(30).is_reportable());
    }

    #[test]
    fn test_user_message_hides_internal_errors() {
        let msg = AppError::Storage("permission denied: /data".into()).user_message();
        assert_eq!(msg, "Unknown error occurred, check the logs.");

        let msg = AppError::NoNewPostings.user_message();
        assert_eq!(msg, "No new jobs found");

        let msg = AppError::Classification("no array".into()).user_message();
        assert!(msg.contains("classification"));
        assert!(msg.contains("no array"));
    }
}
