use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtflowError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Adapter error: {0}")]
    Adapter(String),

    #[error("Job timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Invalid status transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: String,
        to: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Security error: {0}")]
    Security(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ProtflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_mentions_seconds() {
        let err = ProtflowError::Timeout(Duration::from_secs(90));
        assert_eq!(err.to_string(), "Job timed out after 90s");
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = ProtflowError::InvalidTransition {
            job_id: "abc".to_string(),
            from: "completed".to_string(),
            to: "running".to_string(),
        };
        assert!(err.to_string().contains("completed -> running"));
    }
}
