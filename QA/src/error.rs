//! Error types for the PDF question answering pipeline.
//!
//! Hard failures are [`DocumentParseError`] (the upload is not a usable PDF)
//! and [`AnswerServiceError`] (the remote model did not produce an answer).
//! [`ValidationWarning`] is the soft case: the request is rejected locally and
//! the user can simply fix the input.

use thiserror::Error;

/// The uploaded bytes could not be read as a PDF.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Could not read PDF: {detail}")]
pub struct DocumentParseError {
    pub detail: String,
}

impl DocumentParseError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// Any failure talking to the chat-completion endpoint.
///
/// Callers only ever show the message; the variants exist so the log lines
/// and tests can tell the cases apart.
#[derive(Debug, Error)]
pub enum AnswerServiceError {
    #[error("GROQ_API_KEY is not set; cannot contact the answer service")]
    MissingCredential,

    #[error("Failed to reach the answer service: {0}")]
    Transport(String),

    #[error("The answer service rejected the credential ({status}): {message}")]
    Authentication { status: u16, message: String },

    #[error("Answer service error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed response from the answer service: {0}")]
    MalformedResponse(String),

    #[error("The answer service did not respond within {secs}s")]
    Timeout { secs: u64 },

    #[error("The request was cancelled")]
    Cancelled,
}

/// Input that is rejected before any work is done.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ValidationWarning {
    #[error("Please enter a question.")]
    EmptyQuery,

    #[error("Please upload a PDF document first.")]
    NoDocument,
}

/// Why an upload could not be turned into a loaded document.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Parse(#[from] DocumentParseError),

    #[error("Could not store the upload: {0}")]
    Storage(#[from] std::io::Error),
}

/// An environment variable was set but could not be parsed.
#[derive(Debug, Error)]
#[error("Invalid value for {key}: '{value}' ({reason})")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}
