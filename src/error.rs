//! Structured error handling and exit codes.

use serde::Serialize;

/// Exit codes for hashstat.
///
/// - 0: Success (every requested check passed, or the update completed)
/// - 1: General error (lock held, corrupt cache, unreadable input file)
/// - 2: Verification failed (a digest, or a counted stat, mismatched)
/// - 3: Unreadable (at least one file could not be opened or read)
///
/// `Unreadable` takes precedence over `VerificationFailed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: the run completed without failures.
    Success = 0,
    /// General error: a structural failure aborted the run.
    GeneralError = 1,
    /// Verification failed: at least one mismatch was counted.
    VerificationFailed = 2,
    /// Unreadable: at least one file could not be opened or read.
    Unreadable = 3,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "HS000",
            Self::GeneralError => "HS001",
            Self::VerificationFailed => "HS002",
            Self::Unreadable => "HS003",
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "HS001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message, including its causes
    pub message: String,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
        }
    }
}
