//! Error types for the audit engine
//!
//! Target behaviour (timeouts, refused connections, odd status codes) is never
//! an error here; it travels as data on `HttpResponse`. Only problems caused by
//! the caller (bad options, bad patterns) or by local I/O end up in `AuditError`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    /// Check-author mistakes: empty payload sets, invalid format combinations...
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

impl AuditError {
    pub fn config(message: impl Into<String>) -> Self {
        AuditError::Configuration(message.into())
    }

    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AuditError::Configuration(_) | AuditError::InvalidPattern { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AuditError>;

/// Compile a user supplied regex, keeping the offending pattern in the error.
pub fn compile_pattern(pattern: &str) -> Result<regex::Regex> {
    regex::Regex::new(pattern).map_err(|source| AuditError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}
