//! Configuration resolution as seen by the onboarding flow
//!
//! Tests:
//! - Values from file, environment and CLI land in the onboarding settings
//! - Source attribution in the effective configuration
//! - Invalid values surface as typed `ConfigError`s through `anyhow`
//! - The configured session decides role gating

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use enerdesk::backend::testing::ScriptedBackend;
use enerdesk::{
    CliArgs, Config, ConfigSource, DraftField, EnvOverrides, Module, OnboardingError,
    OnboardingSettings, Orchestrator, SessionContext, WizardStep,
};
use enerdesk_utils::error::ConfigError;

fn project(config_body: &str) -> (TempDir, PathBuf) {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join(".git")).unwrap();
    let cfg_dir = temp.path().join(".enerdesk");
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(cfg_dir.join("config.toml"), config_body).unwrap();
    let root = temp.path().to_path_buf();
    (temp, root)
}

fn discover(root: &Path, cli: &CliArgs, env: &[(&str, &str)]) -> Result<Config> {
    Config::discover_with_env(root, cli, &EnvOverrides::from_pairs(env.iter().copied()))
}

#[test]
fn test_file_values_reach_onboarding_settings() -> Result<()> {
    let (_temp, root) = project(
        r#"
[onboarding]
cups_min_length = 22
request_code_prefix = "ALTA-"
initial_switching_status = "00-Borrador"
default_access_tariff = "3.0TD"
"#,
    );

    let config = discover(&root, &CliArgs::default(), &[])?;
    let settings = OnboardingSettings::from_config(&config);

    assert_eq!(settings.policy.cups_min_length, 22);
    assert_eq!(settings.request_code_prefix, "ALTA-");
    assert_eq!(settings.initial_switching_status, "00-Borrador");

    let mut wizard = settings.new_wizard();
    assert_eq!(wizard.draft().access_tariff, "3.0TD");
    wizard.set_field(DraftField::Name, "ACME");
    wizard.set_field(DraftField::TaxId, "B123");
    wizard.set_field(DraftField::Cups, "ES0021000000000000AB");
    assert_eq!(wizard.advance_to_final(), WizardStep::SupplyPoint);
    assert!(wizard.errors().contains_key(&DraftField::Cups));
    Ok(())
}

#[test]
fn test_cli_overrides_env_and_file_with_attribution() -> Result<()> {
    let (_temp, root) = project(
        r#"
[backend]
base_url = "http://file.local:8000"
role = "backoffice"

[onboarding]
cups_min_length = 22
"#,
    );
    let cli = CliArgs {
        cups_min_length: Some(18),
        ..CliArgs::default()
    };

    let config = discover(
        &root,
        &cli,
        &[
            ("ENERDESK_BASE_URL", "http://env.local:8000"),
            ("ENERDESK_TOKEN", "from-env"),
        ],
    )?;

    assert_eq!(config.backend.base_url, "http://env.local:8000");
    assert_eq!(config.onboarding.cups_min_length, 18);
    assert_eq!(config.token(), Some("from-env"));

    let effective = config.effective_config();
    assert_eq!(effective["backend.base_url"].1, "env");
    assert_eq!(effective["backend.role"], ("backoffice".to_string(), "config".to_string()));
    assert_eq!(effective["onboarding.cups_min_length"].1, "cli");
    assert_eq!(effective["backend.token"], ("[set]".to_string(), "env".to_string()));
    assert_eq!(effective["renewals.window_days"].1, "default");
    assert_eq!(
        config.source_attribution.get("backend.token"),
        Some(&ConfigSource::Env)
    );
    Ok(())
}

#[test]
fn test_invalid_value_is_a_typed_error() {
    let (_temp, root) = project("[renewals]\nwindow_days = 0\n");

    let err = discover(&root, &CliArgs::default(), &[]).unwrap_err();

    match err.downcast_ref::<ConfigError>() {
        Some(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, "renewals.window_days"),
        other => panic!("expected InvalidValue, got {other:?}"),
    }
}

#[test]
fn test_unknown_role_fails_session_construction() -> Result<()> {
    let (_temp, root) = project("");
    let cli = CliArgs {
        role: Some("superuser".to_string()),
        ..CliArgs::default()
    };

    let config = discover(&root, &cli, &[])?;

    assert!(SessionContext::from_config(&config).is_err());
    Ok(())
}

#[tokio::test]
async fn test_configured_role_gates_submission() -> Result<()> {
    let (_temp, root) = project("[backend]\nrole = \"contabilidad\"\n");
    let config = discover(&root, &CliArgs::default(), &[("ENERDESK_TOKEN", "t")])?;
    let session = SessionContext::from_config(&config)?;
    assert!(!session.can_access(Module::Crm));

    let settings = OnboardingSettings::from_config(&config);
    let mut wizard = settings.new_wizard();
    wizard.set_field(DraftField::Name, "ACME");
    wizard.set_field(DraftField::TaxId, "B123");
    wizard.set_field(DraftField::Cups, "ES0021000000000000AB");
    wizard.advance_to_final();

    let backend = Arc::new(ScriptedBackend::new());
    let orchestrator = Orchestrator::new(Arc::clone(&backend) as _, session, settings);
    let err = orchestrator.submit(&wizard).await.unwrap_err();

    assert!(matches!(err, OnboardingError::Forbidden { .. }));
    assert_eq!(backend.call_count(), 0);
    Ok(())
}
