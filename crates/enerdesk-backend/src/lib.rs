//! CRM backend collaborator.
//!
//! Every remote operation the back office needs goes through the [`CrmBackend`]
//! trait. [`HttpBackend`] talks to the real REST backend; the scripted fake in
//! [`testing`] stands in for it in tests.

mod http_backend;
pub(crate) mod http_client;
mod listing;
mod session;
mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use enerdesk_utils::error::BackendError;
pub use http_backend::HttpBackend;
pub use listing::{SwitchingStatus, Urgency, within_renewal_window};
pub use session::{Module, Role, SessionContext};
pub use types::{
    AssistantReply, ClientSummary, ContractState, CrmBackend, Created, DashboardStats,
    DocumentKind, EntityId, InvoiceSummary, NewClient, NewContract, NewDocument, NewSupplyPoint,
    NewSwitchingRequest, RenewalAlert, StoredFile, SwitchingKind, SwitchingRequestSummary,
};

use enerdesk_config::Config;
use std::sync::Arc;

/// Construct the HTTP backend described by `config`.
///
/// The session (token and role) is taken from the resolved configuration.
///
/// # Errors
///
/// Returns `BackendError::Misconfiguration` if the role is unknown or the
/// HTTP client cannot be built.
pub fn from_config(config: &Config) -> Result<Arc<dyn CrmBackend>, BackendError> {
    let backend = HttpBackend::new_from_config(config)?;
    Ok(Arc::new(backend))
}
