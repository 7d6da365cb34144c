use enerdesk_utils::error::ConfigError;

use super::Config;

fn invalid(key: &str, value: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.into(),
    }
}

impl Config {
    /// Validate configuration values
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.backend.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(invalid(
                "backend.base_url",
                format!("'{base_url}' must start with http:// or https://"),
            ));
        }

        let timeout = self.backend.request_timeout_secs;
        if timeout == 0 {
            return Err(invalid("backend.request_timeout_secs", "must be greater than 0"));
        }
        if timeout > 600 {
            return Err(invalid(
                "backend.request_timeout_secs",
                "exceeds maximum limit of 600 seconds",
            ));
        }

        if self.backend.connect_timeout_secs == 0 {
            return Err(invalid("backend.connect_timeout_secs", "must be greater than 0"));
        }

        if self.backend.token_env.trim().is_empty() {
            return Err(invalid("backend.token_env", "must name an environment variable"));
        }

        let cups = self.onboarding.cups_min_length;
        if cups == 0 || cups > 64 {
            return Err(invalid(
                "onboarding.cups_min_length",
                format!("{cups} is outside 1..=64"),
            ));
        }

        if self.onboarding.request_code_prefix.trim().is_empty() {
            return Err(invalid("onboarding.request_code_prefix", "must not be empty"));
        }
        if self.onboarding.initial_switching_status.trim().is_empty() {
            return Err(invalid("onboarding.initial_switching_status", "must not be empty"));
        }

        let window = self.renewals.window_days;
        let critical = self.renewals.critical_days;
        if window <= 0 {
            return Err(invalid("renewals.window_days", "must be greater than 0"));
        }
        if critical <= 0 || critical > window {
            return Err(invalid(
                "renewals.critical_days",
                format!("{critical} must be between 1 and window_days ({window})"),
            ));
        }

        Ok(())
    }
}
