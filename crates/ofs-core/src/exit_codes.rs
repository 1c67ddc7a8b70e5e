//! Exit codes for the `ofs` CLI.
//!
//! Exit code ranges:
//! - 0-2: query outcomes (parse outcome from code, not output)
//! - 10-19: user/environment errors (recoverable by user action)
//! - 20-29: internal errors

use ofs_common::Error;

/// Exit codes for `ofs` runs. Stable contract for scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    // ========================================================================
    // Query Outcomes (0-2)
    // ========================================================================
    /// At least one open file matched
    Found = 0,

    /// Query ran, nothing matched
    NoMatches = 1,

    /// Results filled the buffer or the scan budget ran out
    Truncated = 2,

    // ========================================================================
    // User / Environment Errors (10-19)
    // ========================================================================
    /// Invalid command name or argument
    ArgsError = 10,

    /// Configuration file unreadable or invalid
    ConfigError = 11,

    /// Permission denied
    PermissionError = 12,

    /// Control channel held by another session
    BusyError = 14,

    // ========================================================================
    // Internal Errors (20-29)
    // ========================================================================
    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O error
    IoError = 21,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Outcome of a completed query.
    pub fn from_outcome(records: usize, truncated: bool) -> Self {
        if truncated {
            ExitCode::Truncated
        } else if records == 0 {
            ExitCode::NoMatches
        } else {
            ExitCode::Found
        }
    }

    /// Exit code reported for a control-channel error.
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::Busy => ExitCode::BusyError,
            Error::InvalidCommand(_) | Error::InvalidArgument(_) => ExitCode::ArgsError,
            Error::IoFailure(io) if io.kind() == std::io::ErrorKind::PermissionDenied => {
                ExitCode::PermissionError
            }
            Error::IoFailure(_) => ExitCode::IoError,
            Error::NotReady => ExitCode::InternalError,
        }
    }

    /// Check if this exit code is a query outcome (codes 0-2).
    pub fn is_operational(self) -> bool {
        (self as i32) < 10
    }

    /// Check if this exit code is a user/environment error (codes 10-19).
    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    pub fn is_error(self) -> bool {
        (self as i32) >= 10
    }

    /// Error code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Found => "OK_FOUND",
            ExitCode::NoMatches => "OK_NO_MATCHES",
            ExitCode::Truncated => "OK_TRUNCATED",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::PermissionError => "ERR_PERMISSION",
            ExitCode::BusyError => "ERR_BUSY",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_codes() {
        assert_eq!(ExitCode::from_outcome(3, false), ExitCode::Found);
        assert_eq!(ExitCode::from_outcome(0, false), ExitCode::NoMatches);
        assert_eq!(ExitCode::from_outcome(256, true), ExitCode::Truncated);
        assert!(ExitCode::Truncated.is_operational());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(ExitCode::from_error(&Error::Busy).as_i32(), 14);
        assert_eq!(
            ExitCode::from_error(&Error::InvalidCommand("X".into())),
            ExitCode::ArgsError
        );
        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert_eq!(
            ExitCode::from_error(&Error::IoFailure(denied)),
            ExitCode::PermissionError
        );
        assert_eq!(
            ExitCode::from_error(&Error::IoFailure(std::io::Error::other("x"))),
            ExitCode::IoError
        );
    }

    #[test]
    fn test_ranges() {
        assert!(ExitCode::ConfigError.is_user_error());
        assert!(ExitCode::IoError.is_error());
        assert!(!ExitCode::IoError.is_user_error());
    }

    #[test]
    fn test_display() {
        assert_eq!(ExitCode::BusyError.to_string(), "ERR_BUSY (14)");
    }
}
