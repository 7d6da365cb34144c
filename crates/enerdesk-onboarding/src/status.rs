//! Status reporter for onboarding submissions.
//!
//! Holds the in-progress flag that gates resubmission, the label of the stage
//! currently in flight, and the terminal outcome of the last run. Observers
//! are called synchronously as the orchestrator advances.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use enerdesk_utils::types::StageId;

/// How the last submission ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Succeeded { request_code: String },
    Failed { message: String },
}

/// Something observers are told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    Started { request_code: String },
    StageEntered { stage: StageId },
    CallCompleted {
        stage: StageId,
        operation: &'static str,
        calls_completed: usize,
    },
    Finished(Outcome),
}

/// Point-in-time view of the reporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub in_progress: bool,
    pub stage: Option<StageId>,
    pub label: Option<&'static str>,
    pub calls_completed: usize,
    pub outcome: Option<Outcome>,
}

type Observer = Box<dyn Fn(&StatusEvent) + Send + Sync>;

#[derive(Default)]
struct State {
    stage: Option<StageId>,
    calls_completed: usize,
    outcome: Option<Outcome>,
}

#[derive(Default)]
pub struct StatusReporter {
    in_progress: AtomicBool,
    state: Mutex<State>,
    observers: Mutex<Vec<Observer>>,
}

impl StatusReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for every subsequent event.
    pub fn subscribe(&self, observer: impl Fn(&StatusEvent) + Send + Sync + 'static) {
        lock(&self.observers).push(Box::new(observer));
    }

    #[must_use]
    pub fn in_progress(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Label of the stage in flight, if a submission is running.
    #[must_use]
    pub fn current_label(&self) -> Option<&'static str> {
        if !self.in_progress() {
            return None;
        }
        lock(&self.state).stage.map(|stage| stage.label())
    }

    #[must_use]
    pub fn outcome(&self) -> Option<Outcome> {
        lock(&self.state).outcome.clone()
    }

    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot {
        let in_progress = self.in_progress();
        let state = lock(&self.state);
        StatusSnapshot {
            in_progress,
            stage: state.stage,
            label: state.stage.filter(|_| in_progress).map(|stage| stage.label()),
            calls_completed: state.calls_completed,
            outcome: state.outcome.clone(),
        }
    }

    /// Claim the in-progress flag for a new submission.
    ///
    /// Returns `None` while another submission holds it. The flag is released
    /// when the returned guard is dropped.
    pub fn try_begin(&self, request_code: &str) -> Option<SubmissionGuard<'_>> {
        self.in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;

        *lock(&self.state) = State::default();
        self.notify(&StatusEvent::Started {
            request_code: request_code.to_string(),
        });

        Some(SubmissionGuard {
            reporter: self,
            finished: false,
        })
    }

    fn notify(&self, event: &StatusEvent) {
        for observer in lock(&self.observers).iter() {
            observer(event);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Exclusive handle on the reporter for one running submission.
pub struct SubmissionGuard<'a> {
    reporter: &'a StatusReporter,
    finished: bool,
}

impl SubmissionGuard<'_> {
    pub fn enter_stage(&self, stage: StageId) {
        lock(&self.reporter.state).stage = Some(stage);
        self.reporter.notify(&StatusEvent::StageEntered { stage });
    }

    pub fn call_completed(&self, stage: StageId, operation: &'static str) {
        let calls_completed = {
            let mut state = lock(&self.reporter.state);
            state.calls_completed += 1;
            state.calls_completed
        };
        self.reporter.notify(&StatusEvent::CallCompleted {
            stage,
            operation,
            calls_completed,
        });
    }

    /// Record the terminal outcome and release the in-progress flag.
    pub fn finish(mut self, outcome: Outcome) {
        self.complete(outcome);
    }

    fn complete(&mut self, outcome: Outcome) {
        self.finished = true;
        lock(&self.reporter.state).outcome = Some(outcome.clone());
        self.reporter.in_progress.store(false, Ordering::SeqCst);
        self.reporter.notify(&StatusEvent::Finished(outcome));
    }
}

impl Drop for SubmissionGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.complete(Outcome::Failed {
                message: "Onboarding failed: submission was interrupted".to_string(),
            });
        }
    }
}
