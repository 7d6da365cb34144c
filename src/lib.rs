//! enerdesk - client onboarding for energy-retail back offices
//!
//! This crate ties the enerdesk workspace together: the onboarding wizard and
//! orchestration chain, the CRM backend client, configuration discovery, and
//! the `enerdesk` command-line interface.
//!
//! # Quick Start (CLI)
//!
//! ```bash
//! enerdesk login --email ana@example.com
//! export ENERDESK_TOKEN=...
//! enerdesk validate draft.toml
//! enerdesk onboard draft.toml --dry-run
//! enerdesk onboard draft.toml --json
//! ```
//!
//! # Quick Start (Library)
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use enerdesk::{Config, DraftField, OnboardingSettings, Orchestrator, SessionContext};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::builder()
//!     .base_url("http://127.0.0.1:8000")
//!     .token("secret")
//!     .build()?;
//! let backend = enerdesk::backend::from_config(&config)?;
//! let settings = OnboardingSettings::from_config(&config);
//!
//! let mut wizard = settings.new_wizard();
//! wizard.set_field(DraftField::Name, "ACME SL");
//! wizard.set_field(DraftField::TaxId, "B12345678");
//! wizard.set_field(DraftField::Cups, "ES0021000000000000AB");
//! wizard.advance_to_final();
//!
//! let orchestrator = Orchestrator::new(backend, SessionContext::from_config(&config)?, settings);
//! let receipt = orchestrator.submit(&wizard).await?;
//! println!("switching request {}", receipt.request_code);
//! # Ok(())
//! # }
//! ```
//!
//! # Exit Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Success |
//! | 1 | Internal error |
//! | 2 | Configuration or CLI argument error |
//! | 3 | Draft blocked by the validation gate |
//! | 4 | Authentication or role failure |
//! | 5 | Onboarding stage or backend failure |
//! | 6 | Submission already in progress |

pub mod cli;
pub mod draft_file;

/// CRM backend collaborator.
pub use enerdesk_backend as backend;

pub use enerdesk_backend::{
    BackendError, CrmBackend, EntityId, HttpBackend, Module, Role, SessionContext,
};
pub use enerdesk_config::{CliArgs, Config, ConfigBuilder, ConfigSource, EnvOverrides};
pub use enerdesk_onboarding::{
    DocumentSlot, DraftField, ErrorMap, OnboardingDraft, OnboardingReceipt, OnboardingSettings,
    Orchestrator, Outcome, PendingFile, StatusEvent, StatusReporter, StatusSnapshot, Wizard,
    WizardStep,
};
pub use enerdesk_utils::error::{EnerdeskError, OnboardingError, UserFriendlyError};
pub use enerdesk_utils::exit_codes::ExitCode;
pub use enerdesk_utils::types::StageId;
