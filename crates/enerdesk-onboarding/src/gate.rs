//! Per-step validation gate.
//!
//! `validate` is pure: it looks at the draft and returns the field errors that
//! block leaving the given step. An empty map means the step may be left.

use std::collections::BTreeMap;

use crate::draft::{DraftField, OnboardingDraft};
use crate::wizard::WizardStep;

/// Field-level errors, keyed by field, in stable field order.
pub type ErrorMap = BTreeMap<DraftField, String>;

/// Minimum CUPS length accepted when no policy is configured.
pub const DEFAULT_CUPS_MIN_LENGTH: usize = 20;

/// Tunable parts of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// Minimum number of characters in a CUPS code. Length is the only check
    /// made on the code.
    pub cups_min_length: usize,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            cups_min_length: DEFAULT_CUPS_MIN_LENGTH,
        }
    }
}

/// Errors that block leaving `step` with this draft.
#[must_use]
pub fn validate(step: WizardStep, draft: &OnboardingDraft, policy: &ValidationPolicy) -> ErrorMap {
    let mut errors = ErrorMap::new();

    match step {
        WizardStep::Holder => {
            if is_blank(&draft.name) {
                errors.insert(DraftField::Name, "name is required".to_string());
            }
            if is_blank(&draft.tax_id) {
                errors.insert(DraftField::TaxId, "tax id is required".to_string());
            }
        }
        WizardStep::SupplyPoint => {
            let cups = draft.cups.trim();
            if cups.is_empty() {
                errors.insert(DraftField::Cups, "CUPS is required".to_string());
            } else if cups.chars().count() < policy.cups_min_length {
                errors.insert(
                    DraftField::Cups,
                    format!(
                        "CUPS must be at least {} characters (got {})",
                        policy.cups_min_length,
                        cups.chars().count()
                    ),
                );
            }
        }
        // Contract and document data is optional at entry time; the backend
        // rejects what it cannot accept.
        WizardStep::Contract | WizardStep::Documents => {}
    }

    errors
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
