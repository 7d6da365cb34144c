//! Client onboarding for enerdesk.
//!
//! A [`Wizard`] collects an [`OnboardingDraft`] over four steps, each guarded
//! by the validation [`gate`]. Submitting from the last step hands the draft
//! to the [`Orchestrator`], which runs the fixed [`chain`] of backend calls:
//!
//! ```text
//! client → documents (upload, register)* → supply point → contract → switching request
//! ```
//!
//! Progress and the terminal outcome are published through the
//! [`StatusReporter`], whose in-progress flag also blocks overlapping
//! submissions. Nothing is rolled back when a stage fails.

pub mod chain;
pub mod draft;
pub mod gate;
mod orchestrator;
pub mod status;
pub mod wizard;

pub use draft::{DocumentSlot, DraftField, OnboardingDraft, PendingFile};
pub use gate::{ErrorMap, ValidationPolicy, validate};
pub use orchestrator::{OnboardingReceipt, Orchestrator, PlannedCall, planned_calls};
pub use status::{Outcome, StatusEvent, StatusReporter, StatusSnapshot};
pub use wizard::{Wizard, WizardError, WizardStep};

use enerdesk_config::Config;

/// Onboarding policy resolved from the `[onboarding]` configuration section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardingSettings {
    pub policy: ValidationPolicy,
    pub request_code_prefix: String,
    pub initial_switching_status: String,
    pub default_access_tariff: String,
}

impl Default for OnboardingSettings {
    fn default() -> Self {
        Self {
            policy: ValidationPolicy::default(),
            request_code_prefix: "SOL-".to_string(),
            initial_switching_status: "01-Solicitado".to_string(),
            default_access_tariff: draft::DEFAULT_ACCESS_TARIFF.to_string(),
        }
    }
}

impl OnboardingSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let onboarding = &config.onboarding;
        Self {
            policy: ValidationPolicy {
                cups_min_length: onboarding.cups_min_length,
            },
            request_code_prefix: onboarding.request_code_prefix.clone(),
            initial_switching_status: onboarding.initial_switching_status.clone(),
            default_access_tariff: onboarding.default_access_tariff.clone(),
        }
    }

    /// Fresh wizard using this policy and tariff.
    #[must_use]
    pub fn new_wizard(&self) -> Wizard {
        Wizard::new(self.policy, self.default_access_tariff.clone())
    }
}
