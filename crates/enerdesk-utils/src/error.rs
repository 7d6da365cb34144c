use std::time::Duration;
use thiserror::Error;

use crate::redaction::redact_error_message;
use crate::types::StageId;

/// Library-level error type with rich context and user-friendly reporting.
///
/// `EnerdeskError` is the umbrella returned to the CLI. It provides:
/// - Detailed error information for programmatic handling
/// - User-friendly messages with context and suggestions
/// - Mapping to CLI exit codes for consistent error reporting
///
/// # Exit Code Mapping
///
/// | Exit Code | Error Type |
/// |-----------|------------|
/// | 2 | Configuration/CLI argument errors |
/// | 3 | Wizard validation failures |
/// | 4 | Authentication or role failures |
/// | 5 | Onboarding stage or backend failures |
/// | 6 | Submission already in progress |
/// | 1 | Other errors |
///
/// Library code returns these errors and does NOT call `std::process::exit()`.
#[derive(Error, Debug)]
pub enum EnerdeskError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("{0}")]
    Onboarding(#[from] OnboardingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation failed at step {step}: {issue_count} issue(s)")]
    ValidationFailed {
        step: String,
        issues: Vec<String>,
        issue_count: usize,
    },
}

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, PartialEq, Eq, strum::Display)]
pub enum ErrorCategory {
    Configuration,
    Validation,
    Authentication,
    #[strum(serialize = "Backend Integration")]
    BackendIntegration,
    Onboarding,
    Concurrency,
    #[strum(serialize = "File System")]
    FileSystem,
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => {
                format!("Configuration file has invalid format: {reason}")
            }
            Self::InvalidValue { key, value } => {
                format!("Configuration '{key}' has invalid value: {value}")
            }
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::InvalidFile(_) => Some(
                "Configuration files must be valid TOML with [defaults], [backend], [onboarding] and [renewals] sections."
                    .to_string(),
            ),
            Self::InvalidValue { key, .. } => Some(format!(
                "The '{key}' configuration option has specific format requirements."
            )),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile(_) => vec![
                "Check the TOML syntax of .enerdesk/config.toml".to_string(),
                "Run 'enerdesk config' to see the effective configuration".to_string(),
            ],
            Self::InvalidValue { key, .. } => vec![
                format!("Correct the value of '{key}'"),
                "Timeouts and lengths must be positive integers".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

/// Errors raised by the CRM backend collaborator.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// Transport-level failure (connection refused, DNS, TLS)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Missing, expired or rejected bearer token (401/403)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The backend refused the request (other 4xx)
    #[error("backend rejected request ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    /// The backend failed while handling the request (5xx)
    #[error("backend server error ({status}): {detail}")]
    ServerError { status: u16, detail: String },

    /// The request exceeded the transport timeout
    #[error("Timeout after {duration:?}")]
    Timeout { duration: Duration },

    /// The response body did not match the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Client-side configuration problem (bad base URL, client build failure)
    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),
}

impl BackendError {
    /// Whether a read may safely be attempted again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::ServerError { .. })
    }
}

impl UserFriendlyError for BackendError {
    fn user_message(&self) -> String {
        match self {
            Self::Transport(msg) => format!("Could not reach the backend: {msg}"),
            Self::Unauthorized(msg) => format!("The backend refused the session: {msg}"),
            Self::Rejected { status, detail } => {
                format!("The backend rejected the request ({status}): {detail}")
            }
            Self::ServerError { status, detail } => {
                format!("The backend failed to handle the request ({status}): {detail}")
            }
            Self::Timeout { duration } => {
                format!("The backend did not answer within {duration:?}")
            }
            Self::InvalidResponse(msg) => format!("Unexpected backend response: {msg}"),
            Self::Misconfiguration(msg) => format!("Backend client is misconfigured: {msg}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Transport(_) | Self::Timeout { .. } => Some(
                "The backend base URL comes from [backend] base_url or ENERDESK_BASE_URL."
                    .to_string(),
            ),
            Self::Unauthorized(_) => Some(
                "Every call carries the bearer token obtained from 'enerdesk login'.".to_string(),
            ),
            Self::Rejected { .. } => {
                Some("4xx responses usually mean duplicated or invalid data.".to_string())
            }
            Self::ServerError { .. } => {
                Some("Server errors are backend-side failures.".to_string())
            }
            Self::InvalidResponse(_) | Self::Misconfiguration(_) => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Transport(_) => vec![
                "Check that the backend is running and reachable".to_string(),
                "Verify [backend] base_url in .enerdesk/config.toml".to_string(),
            ],
            Self::Unauthorized(_) => vec![
                "Run 'enerdesk login' and export the token as ENERDESK_TOKEN".to_string(),
            ],
            Self::Rejected { .. } => vec![
                "Review the rejected fields and try again".to_string(),
            ],
            Self::ServerError { .. } => vec![
                "Wait a few minutes and try again".to_string(),
                "Check the backend logs for the failing endpoint".to_string(),
            ],
            Self::Timeout { .. } => vec![
                "Increase [backend] request_timeout_secs".to_string(),
                "Check your network connection".to_string(),
            ],
            Self::InvalidResponse(_) => vec![
                "Check that the backend version matches this client".to_string(),
            ],
            Self::Misconfiguration(_) => vec![
                "Check the [backend] section of .enerdesk/config.toml".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Unauthorized(_) => ErrorCategory::Authentication,
            Self::Misconfiguration(_) => ErrorCategory::Configuration,
            _ => ErrorCategory::BackendIntegration,
        }
    }
}

/// Errors raised while submitting an onboarding draft.
///
/// Every variant that ends a started run renders as
/// `"Onboarding failed: <reason>"`.
#[derive(Debug, Error)]
pub enum OnboardingError {
    #[error("Submission is only possible from the final step (currently at step {current})")]
    NotAtFinalStep { current: u8 },

    #[error("An onboarding submission is already in progress")]
    SubmissionInProgress,

    #[error("Onboarding failed: role '{role}' may not create clients")]
    Forbidden { role: String },

    #[error("Onboarding failed: invalid {field}: {reason}")]
    InvalidDraft {
        stage: StageId,
        field: String,
        reason: String,
    },

    #[error("Onboarding failed: {}", stage_failure_reason(.stage, .source))]
    Stage {
        stage: StageId,
        calls_completed: usize,
        #[source]
        source: BackendError,
    },
}

fn stage_failure_reason(stage: &StageId, source: &BackendError) -> String {
    match (stage, source) {
        (StageId::Client, BackendError::Rejected { detail, .. }) => {
            format!("duplicate or invalid identity: {detail}")
        }
        _ => format!("{} stage failed: {source}", stage.as_str()),
    }
}

impl OnboardingError {
    /// Stage during which the run ended, if it had started.
    #[must_use]
    pub fn stage(&self) -> Option<StageId> {
        match self {
            Self::InvalidDraft { stage, .. } | Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl UserFriendlyError for OnboardingError {
    fn user_message(&self) -> String {
        redact_error_message(&self.to_string())
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::NotAtFinalStep { .. } => Some(
                "The wizard must pass the holder and supply point checks before submission."
                    .to_string(),
            ),
            Self::SubmissionInProgress => None,
            Self::Forbidden { .. } => {
                Some("Only roles with CRM access can onboard clients.".to_string())
            }
            Self::InvalidDraft { .. } => Some(
                "Power values must be numbers (a decimal comma is accepted) and dates YYYY-MM-DD."
                    .to_string(),
            ),
            Self::Stage {
                calls_completed, ..
            } => Some(format!(
                "{calls_completed} call(s) completed before the failure; created records are not rolled back."
            )),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::NotAtFinalStep { .. } => {
                vec!["Run 'enerdesk validate' to see which fields block the wizard".to_string()]
            }
            Self::SubmissionInProgress => {
                vec!["Wait for the running submission to finish".to_string()]
            }
            Self::Forbidden { .. } => {
                vec!["Log in with an admin, comercial or backoffice account".to_string()]
            }
            Self::InvalidDraft { field, .. } => vec![format!("Correct '{field}' in the draft")],
            Self::Stage { .. } => vec![
                "Check the client listing for records created before the failure".to_string(),
                "Fix the reported problem and submit the same draft again".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::NotAtFinalStep { .. } | Self::InvalidDraft { .. } => ErrorCategory::Validation,
            Self::SubmissionInProgress => ErrorCategory::Concurrency,
            Self::Forbidden { .. } => ErrorCategory::Authentication,
            Self::Stage { .. } => ErrorCategory::Onboarding,
        }
    }
}

impl UserFriendlyError for EnerdeskError {
    fn user_message(&self) -> String {
        match self {
            Self::Config(err) => err.user_message(),
            Self::Backend(err) => err.user_message(),
            Self::Onboarding(err) => err.user_message(),
            Self::Io(err) => format!("File system operation failed: {err}"),
            Self::ValidationFailed { step, issues, .. } => {
                format!("Step '{step}' has invalid fields: {}", issues.join("; "))
            }
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Config(err) => err.context(),
            Self::Backend(err) => err.context(),
            Self::Onboarding(err) => err.context(),
            Self::Io(_) => None,
            Self::ValidationFailed { .. } => {
                Some("The wizard only advances once the current step is valid.".to_string())
            }
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Config(err) => err.suggestions(),
            Self::Backend(err) => err.suggestions(),
            Self::Onboarding(err) => err.suggestions(),
            Self::Io(_) => vec!["Check that the referenced files exist and are readable".to_string()],
            Self::ValidationFailed { .. } => {
                vec!["Fill in the reported fields in the draft file".to_string()]
            }
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(err) => err.category(),
            Self::Backend(err) => err.category(),
            Self::Onboarding(err) => err.category(),
            Self::Io(_) => ErrorCategory::FileSystem,
            Self::ValidationFailed { .. } => ErrorCategory::Validation,
        }
    }
}

impl EnerdeskError {
    /// Get a user-friendly error message with context and actionable suggestions.
    ///
    /// Credentials are redacted from the final text.
    ///
    /// # Example
    ///
    /// ```rust
    /// use enerdesk_utils::error::{ConfigError, EnerdeskError};
    ///
    /// let err = EnerdeskError::Config(ConfigError::InvalidValue {
    ///     key: "backend.base_url".into(),
    ///     value: "'crm.local' must start with http:// or https://".into(),
    /// });
    /// let message = err.display_for_user();
    /// assert!(message.contains("backend.base_url"));
    /// assert!(message.contains("Suggestions:"));
    /// ```
    #[must_use]
    pub fn display_for_user(&self) -> String {
        let mut output = format!("Error: {}\n", self.user_message());

        if let Some(ctx) = self.context() {
            output.push_str(&format!("\nContext: {ctx}\n"));
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in suggestions {
                output.push_str(&format!("  • {suggestion}\n"));
            }
        }

        redact_error_message(&output)
    }

    /// Map this error to the appropriate CLI exit code.
    #[must_use]
    pub fn to_exit_code(&self) -> crate::exit_codes::ExitCode {
        use crate::exit_codes::ExitCode;

        match self {
            EnerdeskError::Config(_) => ExitCode::CLI_ARGS,
            EnerdeskError::ValidationFailed { .. } => ExitCode::VALIDATION_FAILED,
            EnerdeskError::Backend(BackendError::Unauthorized(_)) => ExitCode::AUTH_FAILED,
            EnerdeskError::Backend(BackendError::Misconfiguration(_)) => ExitCode::CLI_ARGS,
            EnerdeskError::Backend(_) => ExitCode::STAGE_FAILED,
            EnerdeskError::Onboarding(err) => match err {
                OnboardingError::NotAtFinalStep { .. } => ExitCode::VALIDATION_FAILED,
                OnboardingError::SubmissionInProgress => ExitCode::SUBMISSION_IN_PROGRESS,
                OnboardingError::Forbidden { .. } => ExitCode::AUTH_FAILED,
                OnboardingError::InvalidDraft { .. } | OnboardingError::Stage { .. } => {
                    ExitCode::STAGE_FAILED
                }
            },
            EnerdeskError::Io(_) => ExitCode::INTERNAL,
        }
    }
}
