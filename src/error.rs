//! Error types for the Jira mirror.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=store, 3=not_found, 4=projection, etc.)
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use thiserror::Error;

/// Result type alias for mirror operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Store (exit 2)
    StoreError,

    // Not Found (exit 3)
    NoMatchingProjects,

    // Projection / validation (exit 4)
    MalformedTemporalValue,
    ProjectionError,
    InvalidArgument,

    // Remote (exit 6)
    TransportError,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::StoreError => "STORE_ERROR",
            Self::NoMatchingProjects => "NO_MATCHING_PROJECTS",
            Self::MalformedTemporalValue => "MALFORMED_TEMPORAL_VALUE",
            Self::ProjectionError => "PROJECTION_ERROR",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::TransportError => "TRANSPORT_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::StoreError => 2,
            Self::NoMatchingProjects => 3,
            Self::MalformedTemporalValue | Self::ProjectionError | Self::InvalidArgument => 4,
            Self::TransportError => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether rerunning the same command later may succeed.
    ///
    /// Remote and store failures are usually transient (network, locks).
    /// Projection failures recur until the remote data or the field map changes.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransportError | Self::StoreError)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur while mirroring.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed temporal value in column '{column}': {value:?}")]
    MalformedTemporalValue { column: String, value: String },

    #[error("Projection error: {0}")]
    Projection(String),

    #[error("No projects match category '{category}'")]
    NoMatchingProjects {
        category: String,
        /// Categories seen in the projects mirror, for hint display.
        available: Vec<String>,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Transport(_) => ErrorCode::TransportError,
            Self::MalformedTemporalValue { .. } => ErrorCode::MalformedTemporalValue,
            Self::Projection(_) => ErrorCode::ProjectionError,
            Self::NoMatchingProjects { .. } => ErrorCode::NoMatchingProjects,
            Self::Database(_) => ErrorCode::StoreError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::Transport(msg) => {
                if msg.contains("401") || msg.contains("403") {
                    Some("Check JIRA_USER and JIRA_TOKEN (an API token, not a password)".to_string())
                } else if msg.contains("429") {
                    Some("Jira is rate limiting this account. Rerun the sync later.".to_string())
                } else {
                    None
                }
            }

            Self::MalformedTemporalValue { column, .. } => Some(format!(
                "Column '{column}' expects an RFC 3339 timestamp, a Jira timestamp \
                 (2024-01-31T09:30:00.000+0000) or a date (2024-01-31)"
            )),

            Self::NoMatchingProjects { available, .. } => {
                if available.is_empty() {
                    Some("The projects mirror has no categorized projects. Unset JIRA_PROJECT_CATEGORY to mirror every project.".to_string())
                } else {
                    Some(format!("Known categories: {}", available.join(", ")))
                }
            }

            Self::Config(msg) if msg.contains("JIRA_") => Some(
                "Set JIRA_URL, JIRA_USER and JIRA_TOKEN, or add them to ~/.jira-mirror/config.json"
                    .to_string(),
            ),

            Self::Projection(_)
            | Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::InvalidArgument(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_by_category() {
        assert_eq!(Error::Transport("boom".into()).exit_code(), 6);
        assert_eq!(Error::Projection("bad".into()).exit_code(), 4);
        assert_eq!(
            Error::MalformedTemporalValue {
                column: "created".into(),
                value: "yesterday".into()
            }
            .exit_code(),
            4
        );
        assert_eq!(Error::Config("missing".into()).exit_code(), 7);
    }

    #[test]
    fn test_structured_json_includes_hint() {
        let err = Error::Transport("HTTP 401 Unauthorized".into());
        let json = err.to_structured_json();
        assert_eq!(json["error"]["code"], "TRANSPORT_ERROR");
        assert_eq!(json["error"]["retryable"], true);
        assert!(json["error"]["hint"].as_str().unwrap().contains("JIRA_TOKEN"));
    }

    #[test]
    fn test_no_matching_projects_hint_lists_categories() {
        let err = Error::NoMatchingProjects {
            category: "Delivery".into(),
            available: vec!["Internal".into(), "Product".into()],
        };
        assert_eq!(err.hint().unwrap(), "Known categories: Internal, Product");
    }
}
