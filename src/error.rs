//! Error types for lydtag.

use thiserror::Error;

/// Library-level error type for lydtag operations.
#[derive(Error, Debug)]
pub enum LydtagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("AI backend error: {0}")]
    Ai(String),

    #[error("AI backend returned HTTP {status}: {message}")]
    AiStatus { status: u16, message: String },

    #[error("Unparseable AI response: {0}")]
    AiResponse(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl LydtagError {
    /// Whether a failed remote call is worth retrying.
    ///
    /// Network-level failures and rate-limit/server-side HTTP statuses are
    /// transient. Everything else (bad requests, unparseable model output,
    /// local errors) fails the same way every time and is not retried.
    pub fn is_transient(&self) -> bool {
        match self {
            LydtagError::Http(_) => true,
            LydtagError::AiStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Result type alias for lydtag operations.
pub type Result<T> = std::result::Result<T, LydtagError>;
