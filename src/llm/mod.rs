//! LLM completion of missing form fields
//!
//! Optional step of the pipeline. Any [`CompletionError`] is recoverable: the
//! caller logs it and carries on with the submitted values.

mod client;
mod prompt;

pub use client::{parse_completions, CompletionClient};
pub use prompt::{build_user_prompt, missing_fields, SYSTEM_PROMPT};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("completion service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed completion response: {0}")]
    MalformedResponse(String),
}

impl CompletionError {
    /// Whether a fresh attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            CompletionError::Timeout(_) | CompletionError::Transport(_) => true,
            CompletionError::Status { status, .. } => *status == 429 || *status >= 500,
            CompletionError::MalformedResponse(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(429, true)]
    #[case(500, true)]
    #[case(503, true)]
    #[case(400, false)]
    #[case(401, false)]
    #[case(404, false)]
    fn test_status_retryability(#[case] status: u16, #[case] retryable: bool) {
        let err = CompletionError::Status {
            status,
            body: String::new(),
        };
        assert_eq!(err.is_retryable(), retryable);
    }

    #[test]
    fn test_other_retryability() {
        assert!(CompletionError::Timeout(30).is_retryable());
        assert!(CompletionError::Transport("reset".into()).is_retryable());
        assert!(!CompletionError::MalformedResponse("x".into()).is_retryable());
    }
}
