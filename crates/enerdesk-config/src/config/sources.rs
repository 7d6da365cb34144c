use std::collections::BTreeMap;

use enerdesk_utils::types::ConfigSource;

use super::Config;

impl Config {
    /// Get effective configuration as `key -> (value, source)` pairs.
    ///
    /// The bearer token is never echoed; only whether one is set.
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, String)> {
        let mut config = BTreeMap::new();

        let mut add = |key: &str, value: String| {
            let source = self
                .source_attribution
                .get(key)
                .unwrap_or(&ConfigSource::Default)
                .to_string();
            config.insert(key.to_string(), (value, source));
        };

        add("defaults.verbose", self.defaults.verbose.to_string());
        add("defaults.json_logs", self.defaults.json_logs.to_string());
        add("backend.base_url", self.backend.base_url.clone());
        add(
            "backend.request_timeout_secs",
            self.backend.request_timeout_secs.to_string(),
        );
        add(
            "backend.connect_timeout_secs",
            self.backend.connect_timeout_secs.to_string(),
        );
        add("backend.token_env", self.backend.token_env.clone());
        if let Some(role) = &self.backend.role {
            add("backend.role", role.clone());
        }
        let token_state = if self.backend.token.is_some() {
            "[set]"
        } else {
            "[unset]"
        };
        add("backend.token", token_state.to_string());
        add(
            "onboarding.cups_min_length",
            self.onboarding.cups_min_length.to_string(),
        );
        add(
            "onboarding.request_code_prefix",
            self.onboarding.request_code_prefix.clone(),
        );
        add(
            "onboarding.initial_switching_status",
            self.onboarding.initial_switching_status.clone(),
        );
        add(
            "onboarding.default_access_tariff",
            self.onboarding.default_access_tariff.clone(),
        );
        add("renewals.window_days", self.renewals.window_days.to_string());
        add("renewals.critical_days", self.renewals.critical_days.to_string());

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_masked() {
        let mut config = Config::minimal_for_testing();
        config.backend.token = Some("super-secret".to_string());
        config
            .source_attribution
            .insert("backend.token".to_string(), ConfigSource::Env);

        let effective = config.effective_config();
        let (value, source) = &effective["backend.token"];
        assert_eq!(value, "[set]");
        assert_eq!(source, "env");
        assert!(
            effective.values().all(|(v, _)| !v.contains("super-secret")),
            "token leaked into effective config"
        );
    }

    #[test]
    fn test_unattributed_keys_report_default() {
        let config = Config::minimal_for_testing();
        let effective = config.effective_config();
        assert_eq!(
            effective["backend.base_url"],
            ("http://127.0.0.1:8000".to_string(), "default".to_string())
        );
    }
}
