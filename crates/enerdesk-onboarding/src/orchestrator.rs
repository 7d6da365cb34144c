//! Driver loop for the onboarding chain.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, debug};

use enerdesk_backend::{CrmBackend, EntityId, Module, SessionContext};
use enerdesk_utils::error::{BackendError, OnboardingError, UserFriendlyError};
use enerdesk_utils::logging::{log_stage_complete, log_stage_error, log_stage_start, stage_span};
use enerdesk_utils::types::StageId;

use crate::OnboardingSettings;
use crate::chain::{self, RegisteredDocument, StepError, StepOutputs};
use crate::draft::OnboardingDraft;
use crate::status::{Outcome, StatusReporter, SubmissionGuard};
use crate::wizard::{Wizard, WizardStep};

/// Everything a successful run created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OnboardingReceipt {
    pub request_code: String,
    pub client_id: EntityId,
    pub documents: Vec<RegisteredDocument>,
    pub supply_point_id: EntityId,
    pub contract_id: EntityId,
    pub switching_request_id: EntityId,
    /// Number of backend calls the run made.
    pub calls: usize,
}

/// Stage and operation of one planned call, for dry runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlannedCall {
    pub stage: StageId,
    pub operation: &'static str,
}

/// Runs submissions of the onboarding wizard against a backend.
pub struct Orchestrator {
    backend: Arc<dyn CrmBackend>,
    session: SessionContext,
    settings: OnboardingSettings,
    reporter: Arc<StatusReporter>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(backend: Arc<dyn CrmBackend>, session: SessionContext, settings: OnboardingSettings) -> Self {
        Self {
            backend,
            session,
            settings,
            reporter: Arc::new(StatusReporter::new()),
        }
    }

    /// Share an existing reporter, e.g. one the caller already observes.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<StatusReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    #[must_use]
    pub fn reporter(&self) -> &Arc<StatusReporter> {
        &self.reporter
    }

    #[must_use]
    pub fn settings(&self) -> &OnboardingSettings {
        &self.settings
    }

    /// Calls a submission of `draft` would make, in order. No network effects.
    #[must_use]
    pub fn plan(&self, draft: &OnboardingDraft) -> Vec<PlannedCall> {
        planned_calls(draft, &self.settings)
    }

    /// Submit the wizard's draft.
    ///
    /// Only allowed from the final step. While a submission runs, further
    /// calls fail with `SubmissionInProgress` without touching the backend.
    /// A failure leaves already-created records in place and the wizard
    /// untouched; the caller resets the wizard after success.
    ///
    /// # Errors
    ///
    /// Returns an `OnboardingError` describing why the run did not start or
    /// which stage ended it.
    pub async fn submit(&self, wizard: &Wizard) -> Result<OnboardingReceipt, OnboardingError> {
        if wizard.step() != WizardStep::LAST {
            return Err(OnboardingError::NotAtFinalStep {
                current: wizard.step().number(),
            });
        }

        if !self.session.can_access(Module::Crm) {
            return Err(OnboardingError::Forbidden {
                role: self.session.role().to_string(),
            });
        }

        // Contract fields are local data; reject them before the client exists.
        chain::check_contract_fields(wizard.draft())
            .map_err(|error| step_error(StageId::Contract, 0, error))?;

        let request_code = self.next_request_code();
        let guard = self
            .reporter
            .try_begin(&request_code)
            .ok_or(OnboardingError::SubmissionInProgress)?;

        let result = self.run_chain(wizard.draft(), &request_code, &guard).await;

        let outcome = match &result {
            Ok(receipt) => Outcome::Succeeded {
                request_code: receipt.request_code.clone(),
            },
            Err(error) => Outcome::Failed {
                message: error.user_message(),
            },
        };
        guard.finish(outcome);

        result
    }

    async fn run_chain(
        &self,
        draft: &OnboardingDraft,
        request_code: &str,
        guard: &SubmissionGuard<'_>,
    ) -> Result<OnboardingReceipt, OnboardingError> {
        let steps = chain::plan(draft, request_code, &self.settings.initial_switching_status);
        let mut outputs = StepOutputs::default();
        let mut calls = 0usize;
        let mut current: Option<(StageId, Instant, usize)> = None;

        for step in &steps {
            let stage = step.stage();
            if current.map(|(running, _, _)| running) != Some(stage) {
                if let Some((done, started, first_call)) = current {
                    log_stage_complete(request_code, done, calls - first_call, started.elapsed().as_millis());
                }
                guard.enter_stage(stage);
                log_stage_start(request_code, stage);
                current = Some((stage, Instant::now(), calls));
            }
            let started = current.map_or_else(Instant::now, |(_, started, _)| started);

            let request = step.build(draft, &outputs).map_err(|error| {
                let error = step_error(stage, calls, error);
                log_stage_error(request_code, stage, &error.to_string(), started.elapsed().as_millis());
                error
            })?;
            let operation = step.operation();

            debug!(request_code = %request_code, stage = %stage, operation = operation, "Dispatching");
            let response = chain::dispatch(self.backend.as_ref(), request)
                .instrument(stage_span(request_code, stage))
                .await
                .map_err(|source| {
                    log_stage_error(request_code, stage, &source.to_string(), started.elapsed().as_millis());
                    OnboardingError::Stage {
                        stage,
                        calls_completed: calls,
                        source,
                    }
                })?;

            calls += 1;
            step.record(draft, response, &mut outputs)
                .map_err(|error| step_error(stage, calls, error))?;
            guard.call_completed(stage, operation);
        }

        if let Some((done, started, first_call)) = current {
            log_stage_complete(request_code, done, calls - first_call, started.elapsed().as_millis());
        }

        receipt(request_code, outputs, calls)
    }

    fn next_request_code(&self) -> String {
        request_code(&self.settings.request_code_prefix)
    }
}

/// `<prefix><unix millis>`, e.g. `SOL-1738400000000`.
fn request_code(prefix: &str) -> String {
    format!("{prefix}{}", Utc::now().timestamp_millis())
}

/// Calls a submission of `draft` would make, in order, without a backend.
#[must_use]
pub fn planned_calls(draft: &OnboardingDraft, settings: &OnboardingSettings) -> Vec<PlannedCall> {
    chain::plan(
        draft,
        &request_code(&settings.request_code_prefix),
        &settings.initial_switching_status,
    )
    .iter()
    .map(|step| PlannedCall {
        stage: step.stage(),
        operation: step.operation(),
    })
    .collect()
}

fn step_error(stage: StageId, calls_completed: usize, error: StepError) -> OnboardingError {
    match error {
        StepError::InvalidField { field, reason } => OnboardingError::InvalidDraft {
            stage,
            field: field.to_string(),
            reason,
        },
        other => OnboardingError::Stage {
            stage,
            calls_completed,
            source: BackendError::InvalidResponse(other.to_string()),
        },
    }
}

fn receipt(request_code: &str, outputs: StepOutputs, calls: usize) -> Result<OnboardingReceipt, OnboardingError> {
    let missing = |what: &'static str| OnboardingError::Stage {
        stage: StageId::SwitchingRequest,
        calls_completed: calls,
        source: BackendError::InvalidResponse(format!("{what} missing after a completed run")),
    };
    Ok(OnboardingReceipt {
        request_code: request_code.to_string(),
        client_id: outputs.client_id.ok_or_else(|| missing("client id"))?,
        documents: outputs.documents,
        supply_point_id: outputs.supply_point_id.ok_or_else(|| missing("supply point id"))?,
        contract_id: outputs.contract_id.ok_or_else(|| missing("contract id"))?,
        switching_request_id: outputs
            .switching_request_id
            .ok_or_else(|| missing("switching request id"))?,
        calls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::{DocumentSlot, DraftField, PendingFile};
    use enerdesk_backend::Role;
    use enerdesk_backend::testing::{Operation, ScriptedBackend};

    fn ready_wizard(with_documents: bool) -> Wizard {
        let mut wizard = Wizard::default();
        wizard.set_field(DraftField::Name, "ACME");
        wizard.set_field(DraftField::TaxId, "B123");
        wizard.set_field(DraftField::Cups, "ES0021000000000000AB");
        wizard.set_field(DraftField::P1, "4,6");
        if with_documents {
            wizard.set_file(DocumentSlot::Identity, PendingFile::new("dni.pdf", vec![1]));
            wizard.set_file(DocumentSlot::Invoice, PendingFile::new("factura.pdf", vec![2]));
        }
        assert_eq!(wizard.advance_to_final(), WizardStep::Documents);
        wizard
    }

    fn orchestrator(backend: Arc<ScriptedBackend>, role: Role) -> Orchestrator {
        Orchestrator::new(backend, SessionContext::new("tok", role), OnboardingSettings::default())
    }

    #[tokio::test]
    async fn test_successful_run_returns_receipt() {
        let backend = Arc::new(ScriptedBackend::new());
        let orchestrator = orchestrator(Arc::clone(&backend), Role::Sales);

        let receipt = orchestrator.submit(&ready_wizard(true)).await.unwrap();

        assert!(receipt.request_code.starts_with("SOL-"));
        assert_eq!(receipt.calls, 8);
        assert_eq!(receipt.documents.len(), 2);
        assert_eq!(receipt.documents[0].stored_path, "uploads/dni.pdf");
        assert_eq!(
            orchestrator.reporter().outcome(),
            Some(Outcome::Succeeded {
                request_code: receipt.request_code.clone()
            })
        );
        assert!(!orchestrator.reporter().in_progress());
    }

    #[tokio::test]
    async fn test_not_at_final_step_makes_no_calls() {
        let backend = Arc::new(ScriptedBackend::new());
        let orchestrator = orchestrator(Arc::clone(&backend), Role::Admin);
        let err = orchestrator.submit(&Wizard::default()).await.unwrap_err();
        assert!(matches!(err, OnboardingError::NotAtFinalStep { current: 1 }));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_role_without_crm_access_is_refused() {
        let backend = Arc::new(ScriptedBackend::new());
        let orchestrator = orchestrator(Arc::clone(&backend), Role::Accounting);
        let err = orchestrator.submit(&ready_wizard(false)).await.unwrap_err();
        assert!(matches!(err, OnboardingError::Forbidden { .. }));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_power_is_rejected_before_any_call() {
        let backend = Arc::new(ScriptedBackend::new());
        let orchestrator = orchestrator(Arc::clone(&backend), Role::Sales);
        let mut wizard = ready_wizard(true);
        wizard.set_field(DraftField::P2, "mucho");

        let err = orchestrator.submit(&wizard).await.unwrap_err();

        assert_eq!(err.stage(), Some(StageId::Contract));
        assert!(err.to_string().starts_with("Onboarding failed: invalid p2"));
        assert_eq!(backend.call_count(), 0);
        assert!(!orchestrator.reporter().in_progress());
    }

    #[tokio::test]
    async fn test_invalid_start_date_is_rejected_before_any_call() {
        let backend = Arc::new(ScriptedBackend::new());
        let orchestrator = orchestrator(Arc::clone(&backend), Role::Sales);
        let mut wizard = ready_wizard(false);
        wizard.set_field(DraftField::StartDate, "01/02/2025");

        let err = orchestrator.submit(&wizard).await.unwrap_err();

        match err {
            OnboardingError::InvalidDraft { stage, field, .. } => {
                assert_eq!(stage, StageId::Contract);
                assert_eq!(field, "start_date");
            }
            other => panic!("expected invalid draft, got {other:?}"),
        }
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_stage_failure_reports_completed_calls() {
        let backend = Arc::new(ScriptedBackend::new().fail_on(
            Operation::CreateSupplyPoint,
            BackendError::Unauthorized("expired".to_string()),
        ));
        let orchestrator = orchestrator(Arc::clone(&backend), Role::Sales);

        let err = orchestrator.submit(&ready_wizard(true)).await.unwrap_err();

        match err {
            OnboardingError::Stage {
                stage,
                calls_completed,
                ..
            } => {
                assert_eq!(stage, StageId::SupplyPoint);
                assert_eq!(calls_completed, 5);
            }
            other => panic!("expected stage failure, got {other:?}"),
        }
        match orchestrator.reporter().outcome() {
            Some(Outcome::Failed { message }) => assert!(message.starts_with("Onboarding failed:")),
            other => panic!("expected failure outcome, got {other:?}"),
        }
    }

    #[test]
    fn test_plan_lists_calls_without_dispatching() {
        let backend = Arc::new(ScriptedBackend::new());
        let orchestrator = orchestrator(Arc::clone(&backend), Role::Sales);
        let planned = orchestrator.plan(ready_wizard(true).draft());
        let operations: Vec<&str> = planned.iter().map(|call| call.operation).collect();
        assert_eq!(
            operations,
            vec![
                "create_client",
                "upload_file",
                "create_document",
                "upload_file",
                "create_document",
                "create_supply_point",
                "create_contract",
                "create_switching_request",
            ]
        );
        assert_eq!(backend.call_count(), 0);
    }
}
