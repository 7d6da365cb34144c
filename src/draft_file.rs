//! Onboarding drafts stored as TOML files.
//!
//! ```toml
//! [holder]
//! name = "ACME SL"
//! tax_id = "B12345678"
//!
//! [supply_point]
//! cups = "ES0021000000000000AB"
//! access_tariff = "3.0TD"
//!
//! [contract]
//! retailer = "Iberdrola"
//! start_date = 2025-02-01
//! p1 = "4,6"
//! p2 = 4.6
//!
//! [documents]
//! identity = "dni.pdf"
//! invoice = "factura.pdf"
//! ```
//!
//! Field names are the wizard's snake_case field names. Numbers and dates may
//! be written bare or quoted. Document paths are relative to the draft file.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use enerdesk_onboarding::{DocumentSlot, OnboardingSettings, PendingFile, Wizard};
use enerdesk_utils::error::{ConfigError, EnerdeskError};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DraftFile {
    #[serde(default)]
    holder: BTreeMap<String, toml::Value>,
    #[serde(default)]
    supply_point: BTreeMap<String, toml::Value>,
    #[serde(default)]
    contract: BTreeMap<String, toml::Value>,
    #[serde(default)]
    documents: DocumentPaths,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DocumentPaths {
    identity: Option<PathBuf>,
    invoice: Option<PathBuf>,
}

/// Load a draft file into a fresh wizard at step 1.
///
/// # Errors
///
/// - `EnerdeskError::Io` if the draft or a referenced document cannot be read
/// - `EnerdeskError::Config` if the TOML is malformed or names an unknown field
pub fn load_draft(path: &Path, settings: &OnboardingSettings) -> Result<Wizard, EnerdeskError> {
    let content = std::fs::read_to_string(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    parse_draft(&content, base_dir, settings).map_err(|err| match err {
        EnerdeskError::Config(ConfigError::InvalidFile(reason)) => {
            EnerdeskError::Config(ConfigError::InvalidFile(format!("{}: {reason}", path.display())))
        }
        other => other,
    })
}

/// Parse draft TOML, resolving document paths against `base_dir`.
///
/// # Errors
///
/// Same as [`load_draft`].
pub fn parse_draft(
    content: &str,
    base_dir: &Path,
    settings: &OnboardingSettings,
) -> Result<Wizard, EnerdeskError> {
    let file: DraftFile =
        toml::from_str(content).map_err(|e| ConfigError::InvalidFile(e.to_string()))?;

    let mut wizard = settings.new_wizard();

    for (section, fields) in [
        ("holder", &file.holder),
        ("supply_point", &file.supply_point),
        ("contract", &file.contract),
    ] {
        for (name, value) in fields {
            let key = format!("{section}.{name}");
            let text = value_text(&key, value)?;
            wizard
                .set_field_by_name(name, text)
                .map_err(|e| ConfigError::InvalidValue {
                    key: key.clone(),
                    value: e.to_string(),
                })?;
        }
    }

    for (slot, relative) in [
        (DocumentSlot::Identity, &file.documents.identity),
        (DocumentSlot::Invoice, &file.documents.invoice),
    ] {
        if let Some(relative) = relative {
            let file = PendingFile::from_path(&base_dir.join(relative))?;
            wizard.set_file(slot, file);
        }
    }

    Ok(wizard)
}

fn value_text(key: &str, value: &toml::Value) -> Result<String, ConfigError> {
    match value {
        toml::Value::String(s) => Ok(s.clone()),
        toml::Value::Integer(i) => Ok(i.to_string()),
        toml::Value::Float(f) => Ok(f.to_string()),
        toml::Value::Datetime(d) => Ok(d.to_string()),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: format!("expected text, number or date, found {}", other.type_str()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enerdesk_onboarding::WizardStep;
    use tempfile::TempDir;

    const DRAFT: &str = r#"
[holder]
name = "ACME"
tax_id = "B123"

[supply_point]
cups = "ES0021000000000000AB"
postal_code = 28001

[contract]
start_date = 2025-02-01
p1 = "4,6"
p2 = 4.6

[documents]
identity = "dni.pdf"
"#;

    #[test]
    fn test_load_draft_fills_fields_and_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("dni.pdf"), b"%PDF-1.4").unwrap();
        let path = dir.path().join("draft.toml");
        std::fs::write(&path, DRAFT).unwrap();

        let mut wizard = load_draft(&path, &OnboardingSettings::default()).unwrap();
        let draft = wizard.draft();
        assert_eq!(draft.name, "ACME");
        assert_eq!(draft.postal_code, "28001");
        assert_eq!(draft.start_date, "2025-02-01");
        assert_eq!(draft.power[0], "4,6");
        assert_eq!(draft.power[1], "4.6");
        assert_eq!(draft.identity_document.as_ref().unwrap().filename(), "dni.pdf");
        assert!(draft.invoice_document.is_none());
        assert_eq!(wizard.advance_to_final(), WizardStep::Documents);
    }

    #[test]
    fn test_unknown_field_is_a_config_error() {
        let err = parse_draft(
            "[holder]\nnif = \"B123\"\n",
            Path::new("."),
            &OnboardingSettings::default(),
        )
        .unwrap_err();
        match err {
            EnerdeskError::Config(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, "holder.nif"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_unknown_section_is_rejected() {
        let err = parse_draft("[billing]\niban = \"x\"\n", Path::new("."), &OnboardingSettings::default())
            .unwrap_err();
        assert!(matches!(err, EnerdeskError::Config(ConfigError::InvalidFile(_))));
    }

    #[test]
    fn test_missing_document_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = parse_draft(
            "[documents]\ninvoice = \"missing.pdf\"\n",
            dir.path(),
            &OnboardingSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EnerdeskError::Io(_)));
    }

    #[test]
    fn test_boolean_values_are_rejected() {
        let err = parse_draft("[holder]\nname = true\n", Path::new("."), &OnboardingSettings::default())
            .unwrap_err();
        assert!(matches!(err, EnerdeskError::Config(ConfigError::InvalidValue { .. })));
    }
}
