use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use enerdesk_utils::types::ConfigSource;

use super::{
    BackendConfig, CliArgs, Config, Defaults, EnvOverrides, OnboardingConfig, RenewalsConfig,
};

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize)]
struct TomlConfig {
    defaults: Option<TomlDefaults>,
    backend: Option<TomlBackend>,
    onboarding: Option<TomlOnboarding>,
    renewals: Option<TomlRenewals>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlDefaults {
    verbose: Option<bool>,
    json_logs: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlBackend {
    base_url: Option<String>,
    request_timeout_secs: Option<u64>,
    connect_timeout_secs: Option<u64>,
    token_env: Option<String>,
    role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlOnboarding {
    cups_min_length: Option<usize>,
    request_code_prefix: Option<String>,
    initial_switching_status: Option<String>,
    default_access_tariff: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlRenewals {
    window_days: Option<i64>,
    critical_days: Option<i64>,
}

/// Overwrite `slot` with `value` when present and record its source.
fn apply<T>(
    slot: &mut T,
    value: Option<T>,
    key: &str,
    source: &ConfigSource,
    attribution: &mut HashMap<String, ConfigSource>,
) {
    if let Some(value) = value {
        *slot = value;
        attribution.insert(key.to_string(), source.clone());
    }
}

const DEFAULT_KEYS: &[&str] = &[
    "defaults.verbose",
    "defaults.json_logs",
    "backend.base_url",
    "backend.request_timeout_secs",
    "backend.connect_timeout_secs",
    "backend.token_env",
    "onboarding.cups_min_length",
    "onboarding.request_code_prefix",
    "onboarding.initial_switching_status",
    "onboarding.default_access_tariff",
    "renewals.window_days",
    "renewals.critical_days",
];

impl Config {
    /// Discover and load configuration with precedence: CLI > env > file > defaults
    ///
    /// Uses the current working directory and process environment.
    pub fn discover(cli_args: &CliArgs) -> Result<Self> {
        let start_dir = std::env::current_dir().context("Failed to get current directory")?;
        Self::discover_from(&start_dir, cli_args)
    }

    /// Discover configuration starting from a specific directory.
    pub fn discover_from(start_dir: &Path, cli_args: &CliArgs) -> Result<Self> {
        Self::discover_with_env(start_dir, cli_args, &EnvOverrides::from_process())
    }

    /// Path- and environment-driven variant used by tests to avoid
    /// process-global state.
    pub fn discover_with_env(
        start_dir: &Path,
        cli_args: &CliArgs,
        env: &EnvOverrides,
    ) -> Result<Self> {
        let mut source_attribution: HashMap<String, ConfigSource> = DEFAULT_KEYS
            .iter()
            .map(|key| ((*key).to_string(), ConfigSource::Default))
            .collect();

        let mut defaults = Defaults::default();
        let mut backend = BackendConfig::default();
        let mut onboarding = OnboardingConfig::default();
        let mut renewals = RenewalsConfig::default();

        let config_path = match &cli_args.config_path {
            Some(explicit) => Some(explicit.clone()),
            None => Self::discover_config_file_with_env(start_dir, env)?,
        };

        if let Some(path) = &config_path {
            debug!(path = %path.display(), "Loading configuration file");
            let file = Self::load_config_file(path)
                .with_context(|| format!("Failed to load config file: {}", path.display()))?;
            let src = ConfigSource::Config;
            let attr = &mut source_attribution;

            if let Some(d) = file.defaults {
                apply(&mut defaults.verbose, d.verbose, "defaults.verbose", &src, attr);
                apply(&mut defaults.json_logs, d.json_logs, "defaults.json_logs", &src, attr);
            }
            if let Some(b) = file.backend {
                apply(&mut backend.base_url, b.base_url, "backend.base_url", &src, attr);
                apply(
                    &mut backend.request_timeout_secs,
                    b.request_timeout_secs,
                    "backend.request_timeout_secs",
                    &src,
                    attr,
                );
                apply(
                    &mut backend.connect_timeout_secs,
                    b.connect_timeout_secs,
                    "backend.connect_timeout_secs",
                    &src,
                    attr,
                );
                apply(&mut backend.token_env, b.token_env, "backend.token_env", &src, attr);
                apply(&mut backend.role, b.role.map(Some), "backend.role", &src, attr);
            }
            if let Some(o) = file.onboarding {
                apply(
                    &mut onboarding.cups_min_length,
                    o.cups_min_length,
                    "onboarding.cups_min_length",
                    &src,
                    attr,
                );
                apply(
                    &mut onboarding.request_code_prefix,
                    o.request_code_prefix,
                    "onboarding.request_code_prefix",
                    &src,
                    attr,
                );
                apply(
                    &mut onboarding.initial_switching_status,
                    o.initial_switching_status,
                    "onboarding.initial_switching_status",
                    &src,
                    attr,
                );
                apply(
                    &mut onboarding.default_access_tariff,
                    o.default_access_tariff,
                    "onboarding.default_access_tariff",
                    &src,
                    attr,
                );
            }
            if let Some(r) = file.renewals {
                apply(&mut renewals.window_days, r.window_days, "renewals.window_days", &src, attr);
                apply(
                    &mut renewals.critical_days,
                    r.critical_days,
                    "renewals.critical_days",
                    &src,
                    attr,
                );
            }
        }

        // Environment overrides the file
        let src = ConfigSource::Env;
        let attr = &mut source_attribution;
        apply(
            &mut backend.base_url,
            env.get("ENERDESK_BASE_URL").map(str::to_string),
            "backend.base_url",
            &src,
            attr,
        );
        apply(
            &mut backend.role,
            env.get("ENERDESK_ROLE").map(|r| Some(r.to_string())),
            "backend.role",
            &src,
            attr,
        );
        let token_env = backend.token_env.clone();
        apply(
            &mut backend.token,
            env.get(&token_env).map(|t| Some(t.to_string())),
            "backend.token",
            &src,
            attr,
        );

        // CLI flags override everything
        let src = ConfigSource::Cli;
        apply(&mut backend.base_url, cli_args.base_url.clone(), "backend.base_url", &src, attr);
        apply(
            &mut backend.request_timeout_secs,
            cli_args.request_timeout_secs,
            "backend.request_timeout_secs",
            &src,
            attr,
        );
        apply(
            &mut backend.token,
            cli_args.token.clone().map(Some),
            "backend.token",
            &src,
            attr,
        );
        apply(
            &mut backend.role,
            cli_args.role.clone().map(Some),
            "backend.role",
            &src,
            attr,
        );
        apply(
            &mut onboarding.cups_min_length,
            cli_args.cups_min_length,
            "onboarding.cups_min_length",
            &src,
            attr,
        );
        // Boolean flags only ever switch behaviour on
        apply(
            &mut defaults.verbose,
            cli_args.verbose.filter(|v| *v),
            "defaults.verbose",
            &src,
            attr,
        );
        apply(
            &mut defaults.json_logs,
            cli_args.json_logs.filter(|v| *v),
            "defaults.json_logs",
            &src,
            attr,
        );

        let config = Self {
            defaults,
            backend,
            onboarding,
            renewals,
            source_attribution,
        };

        config.validate()?;

        Ok(config)
    }

    /// Locate the config file: `$ENERDESK_HOME/config.toml` first, then an
    /// upward search for `.enerdesk/config.toml`.
    pub fn discover_config_file_with_env(
        start_dir: &Path,
        env: &EnvOverrides,
    ) -> Result<Option<PathBuf>> {
        if let Some(home) = env.get("ENERDESK_HOME") {
            let candidate = PathBuf::from(home).join("config.toml");
            if candidate.exists() {
                return Ok(Some(candidate));
            }
        }
        Self::discover_config_file_from(start_dir)
    }

    /// Discover config file by searching upward from a given directory
    ///
    /// Walks up the directory tree looking for `.enerdesk/config.toml`, stopping
    /// at repository root markers (.git, .hg, .svn) or filesystem root.
    pub fn discover_config_file_from(start_dir: &Path) -> Result<Option<PathBuf>> {
        let mut current_dir = start_dir;

        loop {
            let config_path = current_dir.join(".enerdesk").join("config.toml");
            if config_path.exists() {
                return Ok(Some(config_path));
            }

            if current_dir.join(".git").exists()
                || current_dir.join(".hg").exists()
                || current_dir.join(".svn").exists()
            {
                break;
            }

            match current_dir.parent() {
                Some(parent) => current_dir = parent,
                None => break,
            }
        }

        Ok(None)
    }

    /// Load configuration from TOML file
    fn load_config_file(path: &Path) -> Result<TomlConfig> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let config: TomlConfig = toml::from_str(&content).with_context(|| {
                    format!("Failed to parse TOML config file: {}", path.display())
                })?;
                Ok(config)
            }
            // Missing config file is OK, defaults apply
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TomlConfig::default()),
            Err(e) => Err(anyhow::anyhow!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let cfg_dir = dir.join(".enerdesk");
        fs::create_dir_all(&cfg_dir).unwrap();
        let path = cfg_dir.join("config.toml");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_defaults_without_any_source() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();

        let config =
            Config::discover_with_env(temp.path(), &CliArgs::default(), &EnvOverrides::default())
                .unwrap();

        assert_eq!(config.backend.base_url, "http://127.0.0.1:8000");
        assert_eq!(config.backend.request_timeout_secs, 30);
        assert_eq!(config.onboarding.cups_min_length, 20);
        assert_eq!(config.onboarding.initial_switching_status, "01-Solicitado");
        assert_eq!(config.renewals.window_days, 45);
        assert_eq!(
            config.source_attribution.get("backend.base_url"),
            Some(&ConfigSource::Default)
        );
        assert!(config.token().is_none());
    }

    #[test]
    fn test_upward_search_finds_parent_config() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();
        write_config(temp.path(), "[onboarding]\ncups_min_length = 22\n");
        let nested = temp.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        let found = Config::discover_config_file_from(&nested).unwrap();
        assert_eq!(found, Some(temp.path().join(".enerdesk").join("config.toml")));
    }

    #[test]
    fn test_search_stops_at_repository_root() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "[defaults]\nverbose = true\n");
        let repo = temp.path().join("repo");
        fs::create_dir_all(repo.join(".git")).unwrap();

        let found = Config::discover_config_file_from(&repo).unwrap();
        assert!(found.is_none(), "search must not escape the repository root");
    }

    #[test]
    fn test_enerdesk_home_takes_priority_over_search() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();
        write_config(temp.path(), "[backend]\nbase_url = \"http://search.local\"\n");
        let home = temp.path().join("home");
        fs::create_dir_all(&home).unwrap();
        fs::write(home.join("config.toml"), "[backend]\nbase_url = \"http://home.local\"\n")
            .unwrap();

        let env = EnvOverrides::from_pairs([("ENERDESK_HOME", home.to_string_lossy().into_owned())]);
        let config = Config::discover_with_env(temp.path(), &CliArgs::default(), &env).unwrap();
        assert_eq!(config.backend.base_url, "http://home.local");
    }

    #[test]
    fn test_precedence_cli_over_env_over_file() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();
        write_config(
            temp.path(),
            r#"
[backend]
base_url = "http://file.local"
request_timeout_secs = 45
role = "backoffice"

[onboarding]
cups_min_length = 22
"#,
        );

        let env = EnvOverrides::from_pairs([
            ("ENERDESK_BASE_URL", "http://env.local"),
            ("ENERDESK_TOKEN", "env-token"),
        ]);
        let cli = CliArgs {
            request_timeout_secs: Some(12),
            role: Some("admin".to_string()),
            ..CliArgs::default()
        };

        let config = Config::discover_with_env(temp.path(), &cli, &env).unwrap();

        assert_eq!(config.backend.base_url, "http://env.local");
        assert_eq!(config.backend.request_timeout_secs, 12);
        assert_eq!(config.backend.role.as_deref(), Some("admin"));
        assert_eq!(config.token(), Some("env-token"));
        assert_eq!(config.onboarding.cups_min_length, 22);

        let attr = &config.source_attribution;
        assert_eq!(attr.get("backend.base_url"), Some(&ConfigSource::Env));
        assert_eq!(attr.get("backend.request_timeout_secs"), Some(&ConfigSource::Cli));
        assert_eq!(attr.get("backend.role"), Some(&ConfigSource::Cli));
        assert_eq!(attr.get("onboarding.cups_min_length"), Some(&ConfigSource::Config));
        assert_eq!(attr.get("renewals.window_days"), Some(&ConfigSource::Default));
    }

    #[test]
    fn test_custom_token_env_is_honoured() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();
        write_config(temp.path(), "[backend]\ntoken_env = \"CRM_TOKEN\"\n");

        let env = EnvOverrides::from_pairs([("CRM_TOKEN", "abc"), ("ENERDESK_TOKEN", "ignored")]);
        let config = Config::discover_with_env(temp.path(), &CliArgs::default(), &env).unwrap();
        assert_eq!(config.token(), Some("abc"));
    }

    #[test]
    fn test_invalid_toml_is_reported_with_path() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();
        let path = write_config(temp.path(), "[backend\nbase_url = 1");

        let err = Config::discover_with_env(temp.path(), &CliArgs::default(), &EnvOverrides::default())
            .unwrap_err();
        let chain = format!("{err:#}");
        assert!(chain.contains(&path.display().to_string()), "missing path in: {chain}");
    }

    #[test]
    fn test_explicit_missing_path_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let cli = CliArgs {
            config_path: Some(temp.path().join("nope.toml")),
            ..CliArgs::default()
        };
        let config = Config::discover_with_env(temp.path(), &cli, &EnvOverrides::default()).unwrap();
        assert_eq!(config.onboarding.request_code_prefix, "SOL-");
    }
}
