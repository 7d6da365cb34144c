//! Wizard state holder: current step, draft values and the current error map.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::draft::{DocumentSlot, DraftField, OnboardingDraft, PendingFile};
use crate::gate::{self, ErrorMap, ValidationPolicy};

/// Position in the four-step wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Holder = 1,
    SupplyPoint = 2,
    Contract = 3,
    Documents = 4,
}

impl WizardStep {
    pub const FIRST: WizardStep = WizardStep::Holder;
    pub const LAST: WizardStep = WizardStep::Documents;

    #[must_use]
    pub fn number(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn next(self) -> Option<WizardStep> {
        match self {
            WizardStep::Holder => Some(WizardStep::SupplyPoint),
            WizardStep::SupplyPoint => Some(WizardStep::Contract),
            WizardStep::Contract => Some(WizardStep::Documents),
            WizardStep::Documents => None,
        }
    }

    #[must_use]
    pub fn previous(self) -> Option<WizardStep> {
        match self {
            WizardStep::Holder => None,
            WizardStep::SupplyPoint => Some(WizardStep::Holder),
            WizardStep::Contract => Some(WizardStep::SupplyPoint),
            WizardStep::Documents => Some(WizardStep::Contract),
        }
    }

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            WizardStep::Holder => "Holder",
            WizardStep::SupplyPoint => "Supply point",
            WizardStep::Contract => "Contract",
            WizardStep::Documents => "Documents",
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {}", self.number(), self.title())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WizardError {
    #[error("unknown draft field '{0}'")]
    UnknownField(String),
}

/// In-memory wizard. Never touches the network and never blocks.
#[derive(Debug, Clone)]
pub struct Wizard {
    step: WizardStep,
    draft: OnboardingDraft,
    errors: ErrorMap,
    policy: ValidationPolicy,
    access_tariff: String,
}

impl Default for Wizard {
    fn default() -> Self {
        Self::new(ValidationPolicy::default(), crate::draft::DEFAULT_ACCESS_TARIFF)
    }
}

impl Wizard {
    /// Fresh wizard at step 1 with an empty draft.
    #[must_use]
    pub fn new(policy: ValidationPolicy, access_tariff: impl Into<String>) -> Self {
        let access_tariff = access_tariff.into();
        Self {
            step: WizardStep::FIRST,
            draft: OnboardingDraft::with_access_tariff(access_tariff.clone()),
            errors: ErrorMap::new(),
            policy,
            access_tariff,
        }
    }

    #[must_use]
    pub fn step(&self) -> WizardStep {
        self.step
    }

    #[must_use]
    pub fn draft(&self) -> &OnboardingDraft {
        &self.draft
    }

    /// Errors from the last forward attempt, minus fields edited since.
    #[must_use]
    pub fn errors(&self) -> &ErrorMap {
        &self.errors
    }

    #[must_use]
    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    #[must_use]
    pub fn is_final_step(&self) -> bool {
        self.step == WizardStep::LAST
    }

    /// Merge a value into the draft and clear that field's error.
    pub fn set_field(&mut self, field: DraftField, value: impl Into<String>) {
        self.draft.set(field, value);
        self.errors.remove(&field);
    }

    /// Same as [`Wizard::set_field`], addressing the field by its snake_case name.
    ///
    /// # Errors
    ///
    /// Returns `WizardError::UnknownField` if no field has that name.
    pub fn set_field_by_name(&mut self, name: &str, value: impl Into<String>) -> Result<(), WizardError> {
        let field = DraftField::from_str(name.trim())
            .map_err(|_| WizardError::UnknownField(name.to_string()))?;
        self.set_field(field, value);
        Ok(())
    }

    pub fn set_file(&mut self, slot: DocumentSlot, file: PendingFile) {
        self.draft.set_file(slot, Some(file));
    }

    pub fn clear_file(&mut self, slot: DocumentSlot) {
        self.draft.set_file(slot, None);
    }

    /// Validate the current step and advance if it passes.
    ///
    /// Returns whether the wizard moved. At the last step it validates and
    /// stays put.
    pub fn next(&mut self) -> bool {
        self.errors = gate::validate(self.step, &self.draft, &self.policy);
        if !self.errors.is_empty() {
            return false;
        }
        match self.step.next() {
            Some(step) => {
                self.step = step;
                true
            }
            None => false,
        }
    }

    /// Step back without validating. Stays at step 1.
    pub fn back(&mut self) {
        if let Some(step) = self.step.previous() {
            self.step = step;
        }
        self.errors.clear();
    }

    /// Advance as far as the gate allows, stopping at the last step or the
    /// first step with errors. Returns the step reached.
    pub fn advance_to_final(&mut self) -> WizardStep {
        while !self.is_final_step() && self.next() {}
        self.step
    }

    /// Discard the draft and return to step 1.
    pub fn reset(&mut self) {
        self.step = WizardStep::FIRST;
        self.draft = OnboardingDraft::with_access_tariff(self.access_tariff.clone());
        self.errors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_holder() -> Wizard {
        let mut wizard = Wizard::default();
        wizard.set_field(DraftField::Name, "ACME");
        wizard.set_field(DraftField::TaxId, "B123");
        wizard
    }

    #[test]
    fn test_next_blocked_by_gate_records_errors() {
        let mut wizard = Wizard::default();
        assert!(!wizard.next());
        assert_eq!(wizard.step(), WizardStep::Holder);
        assert!(wizard.errors().contains_key(&DraftField::Name));
        assert!(wizard.errors().contains_key(&DraftField::TaxId));
    }

    #[test]
    fn test_set_field_clears_only_that_error() {
        let mut wizard = Wizard::default();
        wizard.next();
        wizard.set_field(DraftField::Name, "ACME");
        assert!(!wizard.errors().contains_key(&DraftField::Name));
        assert!(wizard.errors().contains_key(&DraftField::TaxId));
    }

    #[test]
    fn test_forward_through_all_steps() {
        let mut wizard = filled_holder();
        assert!(wizard.next());
        assert_eq!(wizard.step(), WizardStep::SupplyPoint);
        assert!(!wizard.next());
        wizard.set_field(DraftField::Cups, "ES0021000000000000AB");
        assert!(wizard.next());
        assert!(wizard.next());
        assert_eq!(wizard.step(), WizardStep::Documents);
        assert!(wizard.is_final_step());
        assert!(!wizard.next());
        assert_eq!(wizard.step(), WizardStep::Documents);
    }

    #[test]
    fn test_back_never_validates() {
        let mut wizard = filled_holder();
        wizard.next();
        wizard.set_field(DraftField::Name, "");
        wizard.back();
        assert_eq!(wizard.step(), WizardStep::Holder);
        wizard.back();
        assert_eq!(wizard.step(), WizardStep::Holder);
        assert!(wizard.errors().is_empty());
    }

    #[test]
    fn test_set_field_by_name() {
        let mut wizard = Wizard::default();
        wizard.set_field_by_name("postal_code", "28001").unwrap();
        wizard.set_field_by_name("p2", "4,6").unwrap();
        assert_eq!(wizard.draft().postal_code, "28001");
        assert_eq!(wizard.draft().power[1], "4,6");
        assert_eq!(
            wizard.set_field_by_name("nif", "x"),
            Err(WizardError::UnknownField("nif".to_string()))
        );
    }

    #[test]
    fn test_files_attach_and_clear() {
        let mut wizard = Wizard::default();
        wizard.set_file(DocumentSlot::Identity, PendingFile::new("dni.pdf", vec![1, 2]));
        assert!(wizard.draft().file(DocumentSlot::Identity).is_some());
        wizard.clear_file(DocumentSlot::Identity);
        assert!(wizard.draft().file(DocumentSlot::Identity).is_none());
    }

    #[test]
    fn test_advance_to_final_stops_at_first_blocking_step() {
        let mut wizard = filled_holder();
        assert_eq!(wizard.advance_to_final(), WizardStep::SupplyPoint);
        wizard.set_field(DraftField::Cups, "ES0021000000000000AB");
        assert_eq!(wizard.advance_to_final(), WizardStep::Documents);
    }

    #[test]
    fn test_reset_restores_empty_draft() {
        let mut wizard = Wizard::new(ValidationPolicy::default(), "3.0TD");
        wizard.set_field(DraftField::Name, "ACME");
        wizard.set_field(DraftField::TaxId, "B123");
        wizard.next();
        wizard.reset();
        assert_eq!(wizard.step(), WizardStep::Holder);
        assert!(wizard.draft().name.is_empty());
        assert_eq!(wizard.draft().access_tariff, "3.0TD");
    }

    #[test]
    fn test_step_display() {
        assert_eq!(WizardStep::SupplyPoint.to_string(), "2. Supply point");
        assert_eq!(WizardStep::Documents.number(), 4);
    }
}
