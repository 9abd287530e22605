//! Error types for notepress.
//!
//! Library crates use [`NotepressError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Error code the document API uses for objects that are missing or not
/// shared with the integration.
pub const OBJECT_NOT_FOUND_CODE: &str = "object_not_found";

/// Top-level error type for all notepress operations.
#[derive(Debug, thiserror::Error)]
pub enum NotepressError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The requested post or page does not exist (or is not published).
    #[error("post not found: {key}")]
    PostNotFound { key: String },

    /// A composite slug could not be turned back into a page id.
    #[error("invalid slug format \"{slug}\": {reason}")]
    InvalidSlugFormat { slug: String, reason: String },

    /// The document API rejected a request or could not be reached.
    #[error("external API error{}: {message}", fmt_api_context(.status, .code))]
    ExternalApi {
        status: Option<u16>,
        code: Option<String>,
        message: String,
    },

    /// Network error outside the document API (e.g. asset downloads).
    #[error("network error: {0}")]
    Network(String),

    /// Response decoding or payload parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (schema mismatch, invalid bundle, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, NotepressError>;

fn fmt_api_context(status: &Option<u16>, code: &Option<String>) -> String {
    match (status, code.as_deref()) {
        (Some(status), Some(code)) => format!(" (HTTP {status}, {code})"),
        (Some(status), None) => format!(" (HTTP {status})"),
        (None, Some(code)) => format!(" ({code})"),
        (None, None) => String::new(),
    }
}

impl NotepressError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a post-not-found error for a slug or page id.
    pub fn post_not_found(key: impl Into<String>) -> Self {
        Self::PostNotFound { key: key.into() }
    }

    /// Create an invalid-slug error.
    pub fn invalid_slug(slug: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSlugFormat {
            slug: slug.into(),
            reason: reason.into(),
        }
    }

    /// Create a document API error without an HTTP status (transport failure).
    pub fn api(msg: impl Into<String>) -> Self {
        Self::ExternalApi {
            status: None,
            code: None,
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error means "the object is absent or not shared with us".
    ///
    /// Listing uses this to skip revoked pages quietly.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::PostNotFound { .. } => true,
            Self::ExternalApi { status, code, .. } => {
                *status == Some(404) || code.as_deref() == Some(OBJECT_NOT_FOUND_CODE)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = NotepressError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = NotepressError::invalid_slug("my-post-abc", "page id segment has 3 characters");
        assert!(err.to_string().contains("my-post-abc"));

        let err = NotepressError::ExternalApi {
            status: Some(429),
            code: Some("rate_limited".into()),
            message: "slow down".into(),
        };
        assert_eq!(
            err.to_string(),
            "external API error (HTTP 429, rate_limited): slow down"
        );
        assert_eq!(
            NotepressError::api("connection reset").to_string(),
            "external API error: connection reset"
        );
    }

    #[test]
    fn not_found_classification() {
        let by_code = NotepressError::ExternalApi {
            status: Some(400),
            code: Some(OBJECT_NOT_FOUND_CODE.into()),
            message: "gone".into(),
        };
        assert!(by_code.is_not_found());

        let by_status = NotepressError::ExternalApi {
            status: Some(404),
            code: None,
            message: "gone".into(),
        };
        assert!(by_status.is_not_found());

        assert!(NotepressError::post_not_found("abc").is_not_found());
        assert!(!NotepressError::api("timeout").is_not_found());
        assert!(!NotepressError::invalid_slug("x", "y").is_not_found());
    }
}
