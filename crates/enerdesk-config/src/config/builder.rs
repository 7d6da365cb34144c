use std::collections::HashMap;
use std::time::Duration;

use enerdesk_utils::error::ConfigError;
use enerdesk_utils::types::ConfigSource;

use super::{BackendConfig, Config, Defaults, OnboardingConfig, RenewalsConfig};

impl Config {
    /// Create a builder for programmatic configuration.
    ///
    /// Use this when embedding enerdesk without config files or environment
    /// variables.
    ///
    /// # Example
    ///
    /// ```rust
    /// use enerdesk_config::Config;
    /// use std::time::Duration;
    ///
    /// let config = Config::builder()
    ///     .base_url("https://crm.example.com")
    ///     .request_timeout(Duration::from_secs(20))
    ///     .cups_min_length(22)
    ///     .build()
    ///     .expect("valid config");
    /// assert_eq!(config.onboarding.cups_min_length, 22);
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Builder for programmatic configuration of enerdesk.
///
/// All values set via the builder are attributed to
/// `ConfigSource::Programmatic`.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    base_url: Option<String>,
    request_timeout: Option<Duration>,
    token: Option<String>,
    role: Option<String>,
    cups_min_length: Option<usize>,
    request_code_prefix: Option<String>,
    initial_switching_status: Option<String>,
    renewal_window_days: Option<i64>,
    verbose: Option<bool>,
}

impl ConfigBuilder {
    /// Create a new `ConfigBuilder` with no values set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Per-request transport timeout. Sub-second precision is dropped.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    #[must_use]
    pub fn cups_min_length(mut self, length: usize) -> Self {
        self.cups_min_length = Some(length);
        self
    }

    #[must_use]
    pub fn request_code_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.request_code_prefix = Some(prefix.into());
        self
    }

    #[must_use]
    pub fn initial_switching_status(mut self, status: impl Into<String>) -> Self {
        self.initial_switching_status = Some(status.into());
        self
    }

    #[must_use]
    pub fn renewal_window_days(mut self, days: i64) -> Self {
        self.renewal_window_days = Some(days);
        self
    }

    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = Some(verbose);
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` when a value is out of range.
    pub fn build(self) -> Result<Config, ConfigError> {
        let mut attribution = HashMap::new();
        let mut mark = |key: &str, set: bool| {
            let source = if set {
                ConfigSource::Programmatic
            } else {
                ConfigSource::Default
            };
            attribution.insert(key.to_string(), source);
        };

        let mut backend = BackendConfig::default();
        mark("backend.base_url", self.base_url.is_some());
        if let Some(url) = self.base_url {
            backend.base_url = url;
        }
        mark("backend.request_timeout_secs", self.request_timeout.is_some());
        if let Some(timeout) = self.request_timeout {
            backend.request_timeout_secs = timeout.as_secs();
        }
        if self.token.is_some() {
            mark("backend.token", true);
        }
        backend.token = self.token;
        if self.role.is_some() {
            mark("backend.role", true);
        }
        backend.role = self.role;

        let mut onboarding = OnboardingConfig::default();
        mark("onboarding.cups_min_length", self.cups_min_length.is_some());
        if let Some(length) = self.cups_min_length {
            onboarding.cups_min_length = length;
        }
        mark("onboarding.request_code_prefix", self.request_code_prefix.is_some());
        if let Some(prefix) = self.request_code_prefix {
            onboarding.request_code_prefix = prefix;
        }
        mark(
            "onboarding.initial_switching_status",
            self.initial_switching_status.is_some(),
        );
        if let Some(status) = self.initial_switching_status {
            onboarding.initial_switching_status = status;
        }

        let mut renewals = RenewalsConfig::default();
        mark("renewals.window_days", self.renewal_window_days.is_some());
        if let Some(days) = self.renewal_window_days {
            renewals.window_days = days;
        }

        let mut defaults = Defaults::default();
        mark("defaults.verbose", self.verbose.is_some());
        if let Some(verbose) = self.verbose {
            defaults.verbose = verbose;
        }

        let config = Config {
            defaults,
            backend,
            onboarding,
            renewals,
            source_attribution: attribution,
        };
        config.validate()?;
        Ok(config)
    }
}
