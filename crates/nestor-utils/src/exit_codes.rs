//! Exit code constants for the nestor CLI.
//!
//! # Exit Code Table
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Operation completed successfully |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `CONFIG` | Invalid CLI arguments, configuration or provider selection |
//! | 3 | `INVALID_PROGRAM` | Nested program definition or arguments rejected |
//! | 4 | `SUBMISSION_FAILED` | Job server refused or could not be reached |
//! | 5 | `JOB_NOT_FOUND` | Job id unknown to the job server |
//! | 6 | `JOB_UNSUCCESSFUL` | Waited job ended `FAILED` or `STOPPED` |
//! | 7 | `WAIT_TIMEOUT` | Waited job did not reach a terminal state in time |

/// Exit codes matching the documented exit code table.
///
/// The numeric values are part of the public API and will not change in 0.x
/// minor releases.
///
/// ```rust
/// use nestor_utils::ExitCode;
///
/// assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
/// assert_eq!(ExitCode::from_i32(5), ExitCode::JOB_NOT_FOUND);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Success - operation completed successfully
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Internal error - general failure
    pub const INTERNAL: ExitCode = ExitCode(1);

    /// Configuration, CLI argument or provider selection error
    pub const CONFIG: ExitCode = ExitCode(2);

    /// Program definition or argument validation failed before any network call
    pub const INVALID_PROGRAM: ExitCode = ExitCode(3);

    /// The job server could not accept the submission
    pub const SUBMISSION_FAILED: ExitCode = ExitCode(4);

    /// The job server has no record of the requested job
    pub const JOB_NOT_FOUND: ExitCode = ExitCode(5);

    /// The job reached `FAILED` or `STOPPED`
    pub const JOB_UNSUCCESSFUL: ExitCode = ExitCode(6);

    /// The job did not reach a terminal state before the wait timeout
    pub const WAIT_TIMEOUT: ExitCode = ExitCode(7);

    /// Get the numeric exit code value.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Create an ExitCode from a raw i32 value.
    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}
