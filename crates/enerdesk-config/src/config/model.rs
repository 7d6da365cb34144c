use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use enerdesk_utils::types::ConfigSource;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_TOKEN_ENV: &str = "ENERDESK_TOKEN";
pub const DEFAULT_CUPS_MIN_LENGTH: usize = 20;
pub const DEFAULT_REQUEST_CODE_PREFIX: &str = "SOL-";
pub const DEFAULT_INITIAL_SWITCHING_STATUS: &str = "01-Solicitado";
pub const DEFAULT_ACCESS_TARIFF: &str = "2.0TD";
pub const DEFAULT_RENEWAL_WINDOW_DAYS: i64 = 45;
pub const DEFAULT_RENEWAL_CRITICAL_DAYS: i64 = 15;

/// Resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub defaults: Defaults,
    pub backend: BackendConfig,
    pub onboarding: OnboardingConfig,
    pub renewals: RenewalsConfig,
    /// Where each resolved key came from, keyed as `section.key`.
    pub source_attribution: HashMap<String, ConfigSource>,
}

/// Output behaviour shared by every command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defaults {
    pub verbose: bool,
    pub json_logs: bool,
}

/// How to reach the CRM backend and which session to present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Name of the environment variable holding the bearer token.
    pub token_env: String,
    /// Role the session acts under (`admin`, `comercial`, `contabilidad`, `backoffice`).
    pub role: Option<String>,
    /// Bearer token. Only ever read from the CLI or the environment.
    #[serde(skip)]
    pub token: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            token_env: DEFAULT_TOKEN_ENV.to_string(),
            role: None,
            token: None,
        }
    }
}

/// Policy knobs for the onboarding wizard and chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingConfig {
    /// Minimum character count accepted for a CUPS code.
    pub cups_min_length: usize,
    pub request_code_prefix: String,
    pub initial_switching_status: String,
    pub default_access_tariff: String,
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            cups_min_length: DEFAULT_CUPS_MIN_LENGTH,
            request_code_prefix: DEFAULT_REQUEST_CODE_PREFIX.to_string(),
            initial_switching_status: DEFAULT_INITIAL_SWITCHING_STATUS.to_string(),
            default_access_tariff: DEFAULT_ACCESS_TARIFF.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalsConfig {
    pub window_days: i64,
    pub critical_days: i64,
}

impl Default for RenewalsConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_RENEWAL_WINDOW_DAYS,
            critical_days: DEFAULT_RENEWAL_CRITICAL_DAYS,
        }
    }
}

/// CLI arguments that participate in configuration resolution.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub token: Option<String>,
    pub role: Option<String>,
    pub cups_min_length: Option<usize>,
    pub verbose: Option<bool>,
    pub json_logs: Option<bool>,
}

/// Snapshot of the environment variables consulted during discovery.
///
/// Captured once so resolution is a pure function of its inputs.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    vars: HashMap<String, String>,
}

impl EnvOverrides {
    /// Capture the current process environment.
    #[must_use]
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Build an environment from explicit pairs.
    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Non-empty value of `key`, if set.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }
}

impl Config {
    /// Bearer token resolved for this run, if any.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.backend.token.as_deref()
    }

    /// Configuration with built-in defaults and no attribution.
    #[cfg(any(test, feature = "test-utils"))]
    #[must_use]
    pub fn minimal_for_testing() -> Self {
        Config {
            defaults: Defaults::default(),
            backend: BackendConfig::default(),
            onboarding: OnboardingConfig::default(),
            renewals: RenewalsConfig::default(),
            source_attribution: HashMap::new(),
        }
    }
}
