//! Error types for open file search.
//!
//! Every error carries:
//! - a stable numeric code for machine parsing
//! - a category for grouping
//! - a short headline and a remediation hint for humans
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ Control Channel Busy
//!   Reason: control channel busy: another session is open
//!   Fix: Wait for the other client to close its session, then retry.
//! ```
//!
//! # Machine-Facing Output
//!
//! ```json
//! { "code": 10, "category": "session", "message": "...", "recoverable": true }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for open file search operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Session lifecycle (open, read ordering).
    Session,
    /// Malformed commands or arguments.
    Protocol,
    /// Transfer or adapter I/O failures.
    Io,
    /// Configuration loading and validation.
    Config,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Session => write!(f, "session"),
            ErrorCategory::Protocol => write!(f, "protocol"),
            ErrorCategory::Io => write!(f, "io"),
            ErrorCategory::Config => write!(f, "config"),
        }
    }
}

/// Unified error type for the control channel.
#[derive(Error, Debug)]
pub enum Error {
    // Session errors (10-19)
    #[error("control channel busy: another session is open")]
    Busy,

    #[error("no query has been run yet")]
    NotReady,

    // Protocol errors (20-29)
    #[error("unknown command {0}")]
    InvalidCommand(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // I/O errors (30-39)
    #[error("I/O failure: {0}")]
    IoFailure(#[from] std::io::Error),
}

impl Error {
    /// Stable error code, grouped by category:
    /// - 10-19: session errors
    /// - 20-29: protocol errors
    /// - 30-39: I/O errors
    ///
    /// Configuration errors use 40-49 and live with the config loader.
    pub fn code(&self) -> u32 {
        match self {
            Error::Busy => 10,
            Error::NotReady => 11,
            Error::InvalidCommand(_) => 20,
            Error::InvalidArgument(_) => 21,
            Error::IoFailure(_) => 30,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Busy | Error::NotReady => ErrorCategory::Session,
            Error::InvalidCommand(_) | Error::InvalidArgument(_) => ErrorCategory::Protocol,
            Error::IoFailure(_) => ErrorCategory::Io,
        }
    }

    /// Whether retrying (after the hinted fix) can succeed.
    ///
    /// Nothing is retried automatically; this only informs the caller.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Busy => true,
            Error::NotReady => true,
            Error::InvalidCommand(_) => false,
            Error::InvalidArgument(_) => false,
            Error::IoFailure(_) => true,
        }
    }

    /// Human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Busy => "Wait for the other client to close its session, then retry.",
            Error::NotReady => "Issue a query command (OFS_PID, OFS_UID, OFS_OWNER, OFS_NAME) before reading.",
            Error::InvalidCommand(_) => {
                "Use one of OFS_PID, OFS_UID, OFS_OWNER or OFS_NAME."
            }
            Error::InvalidArgument(_) => {
                "Pass a pid within the process id range, or a non-empty path for OFS_NAME."
            }
            Error::IoFailure(_) => {
                "Check that the proc filesystem is mounted and readable, then retry."
            }
        }
    }

    /// Short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Busy => "Control Channel Busy",
            Error::NotReady => "No Results Yet",
            Error::InvalidCommand(_) => "Invalid Command",
            Error::InvalidArgument(_) => "Invalid Argument",
            Error::IoFailure(_) => "I/O Failure",
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Remediation hint.
    pub remediation: String,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            remediation: err.remediation().to_string(),
        }
    }
}

impl StructuredError {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}

/// Format a structured error for human-readable stderr output.
///
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_structured_human(headline: &str, err: &StructuredError, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        message = err.message,
        remediation = err.remediation
    )
}

/// Format an error for human-readable stderr output.
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    format_structured_human(err.headline(), &StructuredError::from(err), use_color)
}
