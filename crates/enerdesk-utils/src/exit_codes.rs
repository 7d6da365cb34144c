//! Exit code constants for the enerdesk CLI.
//!
//! # Exit Code Table
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Operation completed successfully |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `CLI_ARGS` | Invalid CLI arguments or configuration |
//! | 3 | `VALIDATION_FAILED` | A wizard step failed its validation gate |
//! | 4 | `AUTH_FAILED` | Login refused, token rejected, or role not allowed |
//! | 5 | `STAGE_FAILED` | An onboarding stage or backend call failed |
//! | 6 | `SUBMISSION_IN_PROGRESS` | A submission was already running |

/// Exit codes matching the documented exit code table.
///
/// Use the named constants, or [`as_i32()`](Self::as_i32) to get the numeric
/// value for `std::process::exit()`.
///
/// # Example
///
/// ```rust
/// use enerdesk_utils::exit_codes::ExitCode;
///
/// let code = ExitCode::STAGE_FAILED;
/// assert_eq!(code.as_i32(), 5);
/// assert_eq!(ExitCode::SUCCESS, ExitCode::from_i32(0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Success - operation completed successfully
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Internal error - general failure
    pub const INTERNAL: ExitCode = ExitCode(1);

    /// CLI arguments error - invalid arguments or configuration
    pub const CLI_ARGS: ExitCode = ExitCode(2);

    /// Validation failed - a wizard step did not pass its gate
    pub const VALIDATION_FAILED: ExitCode = ExitCode(3);

    /// Authentication failed - bad credentials, rejected token, or forbidden role
    pub const AUTH_FAILED: ExitCode = ExitCode(4);

    /// Stage failed - a remote call in the onboarding chain or a listing failed
    pub const STAGE_FAILED: ExitCode = ExitCode(5);

    /// Submission in progress - a second submit was refused
    pub const SUBMISSION_IN_PROGRESS: ExitCode = ExitCode(6);

    /// Get the numeric exit code value.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Create an ExitCode from a raw i32 value.
    ///
    /// Prefer using the named constants when possible.
    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<i32> for ExitCode {
    fn from(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}
