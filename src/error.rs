//! Error types for the court form filler

use thiserror::Error;

/// Result type alias for the court form filler
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the court form filler
#[derive(Error, Debug)]
pub enum Error {
    /// Template file not found
    #[error("Template not found: {path}")]
    TemplateNotFound { path: String },

    /// Invalid PDF file
    #[error("Invalid PDF file: {reason}")]
    InvalidPdf { reason: String },

    /// Submission body could not be decoded
    #[error("Invalid submission: {reason}")]
    InvalidSubmission { reason: String },

    /// LLM completion was requested without a credential
    #[error("LLM completion requested without an API key")]
    MissingApiKey,

    /// Schema does not line up with the template's widgets
    #[error("Schema does not match template: missing {missing:?}, wrong kind {wrong_kind:?}")]
    SchemaMismatch {
        missing: Vec<String>,
        wrong_kind: Vec<String>,
    },

    /// Schema definition is malformed
    #[error("Invalid schema: {reason}")]
    Schema { reason: String },

    /// Configuration value could not be parsed
    #[error("Invalid configuration: {key}: {reason}")]
    Config { key: String, reason: String },

    /// PDFium error
    #[error("PDFium error: {reason}")]
    Pdfium { reason: String },

    /// qpdf error
    #[error("qpdf error: {reason}")]
    QpdfError { reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Background task failure
    #[error("Internal error: {reason}")]
    Internal { reason: String },
}

impl Error {
    /// Return a sanitized error message safe to show to the person filling the form.
    /// Internal details (paths, library errors) are omitted.
    /// Full details should be logged via tracing before calling this.
    pub fn client_message(&self) -> String {
        match self {
            Error::MissingApiKey => {
                "An OpenAI API key is required to auto-complete missing fields.".to_string()
            }
            Error::InvalidSubmission { .. } => {
                "The submitted form could not be read. Please try again.".to_string()
            }
            Error::TemplateNotFound { .. }
            | Error::InvalidPdf { .. }
            | Error::SchemaMismatch { .. }
            | Error::Schema { .. }
            | Error::Config { .. }
            | Error::Pdfium { .. }
            | Error::QpdfError { .. }
            | Error::Io(_)
            | Error::Serialization(_)
            | Error::Internal { .. } => {
                "An unexpected error occurred while processing your request.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_hides_paths() {
        let err = Error::TemplateNotFound {
            path: "/srv/forms/secret.pdf".to_string(),
        };
        assert!(!err.client_message().contains("/srv"));
        assert!(err.to_string().contains("/srv/forms/secret.pdf"));
    }

    #[test]
    fn test_client_message_for_missing_key() {
        assert!(Error::MissingApiKey.client_message().contains("API key"));
    }
}
