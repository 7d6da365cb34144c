//! Scripted in-memory backend for tests.
//!
//! Records every dispatched call in order, hands out sequential ids, and can
//! be told to fail or pause at a chosen operation.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;

use enerdesk_utils::error::BackendError;

use crate::types::{
    AssistantReply, ClientSummary, Created, CrmBackend, DashboardStats, EntityId, InvoiceSummary,
    NewClient, NewContract, NewDocument, NewSupplyPoint, NewSwitchingRequest, RenewalAlert,
    StoredFile, SwitchingRequestSummary,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateClient,
    UploadFile,
    CreateDocument,
    CreateSupplyPoint,
    CreateContract,
    CreateSwitchingRequest,
    ListClients,
    ListSwitchingRequests,
    ListPendingRenewals,
    AskAssistant,
    ListInvoices,
    GenerateSepaRemittance,
    DashboardStats,
}

/// One dispatched call and the body it carried.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub operation: Operation,
    pub payload: Value,
}

#[derive(Default)]
struct Script {
    calls: Vec<RecordedCall>,
    failures: HashMap<Operation, BackendError>,
    pauses: HashMap<Operation, Arc<Notify>>,
    next_id: i64,
    clients: Vec<ClientSummary>,
    switching_requests: Vec<SwitchingRequestSummary>,
    renewals: Vec<RenewalAlert>,
    invoices: Vec<InvoiceSummary>,
    uploads_without_path: bool,
}

#[derive(Default)]
pub struct ScriptedBackend {
    script: Mutex<Script>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call to `operation` fail with `error`.
    #[must_use]
    pub fn fail_on(self, operation: Operation, error: BackendError) -> Self {
        self.lock().failures.insert(operation, error);
        self
    }

    /// Hold calls to `operation` until the returned handle is notified.
    pub fn pause_on(&self, operation: Operation) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.lock().pauses.insert(operation, Arc::clone(&notify));
        notify
    }

    /// Sleep this long inside every call.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    #[must_use]
    pub fn with_clients(self, clients: Vec<ClientSummary>) -> Self {
        self.lock().clients = clients;
        self
    }

    #[must_use]
    pub fn with_switching_requests(self, requests: Vec<SwitchingRequestSummary>) -> Self {
        self.lock().switching_requests = requests;
        self
    }

    #[must_use]
    pub fn with_renewals(self, renewals: Vec<RenewalAlert>) -> Self {
        self.lock().renewals = renewals;
        self
    }

    #[must_use]
    pub fn with_invoices(self, invoices: Vec<InvoiceSummary>) -> Self {
        self.lock().invoices = invoices;
        self
    }

    /// Answer uploads without a stored path, as some deployments do.
    #[must_use]
    pub fn without_stored_paths(self) -> Self {
        self.lock().uploads_without_path = true;
        self
    }

    /// Every call dispatched so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.lock().calls.iter().map(|c| c.operation).collect()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Highest number of calls that were ever in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Record the call, apply pause and latency, then report the scripted
    /// failure if there is one.
    async fn dispatch(&self, operation: Operation, payload: Value) -> Result<(), BackendError> {
        let pause = {
            let mut script = self.lock();
            script.calls.push(RecordedCall { operation, payload });
            script.pauses.get(&operation).cloned()
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(pause) = pause {
            pause.notified().await;
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.lock().failures.get(&operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn create(&self, operation: Operation, body: &impl Serialize) -> Result<Created, BackendError> {
        let payload = serde_json::to_value(body).unwrap_or(Value::Null);
        self.dispatch(operation, payload).await?;
        let mut script = self.lock();
        script.next_id += 1;
        Ok(Created {
            id: EntityId::Numeric(script.next_id),
        })
    }
}

#[async_trait]
impl CrmBackend for ScriptedBackend {
    async fn create_client(&self, client: &NewClient) -> Result<Created, BackendError> {
        self.create(Operation::CreateClient, client).await
    }

    async fn upload_file(&self, filename: &str, bytes: &[u8]) -> Result<StoredFile, BackendError> {
        let payload = json!({ "filename": filename, "size": bytes.len() });
        self.dispatch(Operation::UploadFile, payload).await?;
        let stored_path = (!self.lock().uploads_without_path).then(|| format!("uploads/{filename}"));
        Ok(StoredFile { stored_path })
    }

    async fn create_document(&self, document: &NewDocument) -> Result<Created, BackendError> {
        self.create(Operation::CreateDocument, document).await
    }

    async fn create_supply_point(
        &self,
        supply_point: &NewSupplyPoint,
    ) -> Result<Created, BackendError> {
        self.create(Operation::CreateSupplyPoint, supply_point).await
    }

    async fn create_contract(&self, contract: &NewContract) -> Result<Created, BackendError> {
        self.create(Operation::CreateContract, contract).await
    }

    async fn create_switching_request(
        &self,
        request: &NewSwitchingRequest,
    ) -> Result<Created, BackendError> {
        self.create(Operation::CreateSwitchingRequest, request).await
    }

    async fn list_clients(&self) -> Result<Vec<ClientSummary>, BackendError> {
        self.dispatch(Operation::ListClients, Value::Null).await?;
        Ok(self.lock().clients.clone())
    }

    async fn list_switching_requests(&self) -> Result<Vec<SwitchingRequestSummary>, BackendError> {
        self.dispatch(Operation::ListSwitchingRequests, Value::Null)
            .await?;
        Ok(self.lock().switching_requests.clone())
    }

    async fn list_pending_renewals(&self) -> Result<Vec<RenewalAlert>, BackendError> {
        self.dispatch(Operation::ListPendingRenewals, Value::Null)
            .await?;
        Ok(self.lock().renewals.clone())
    }

    async fn ask_assistant(&self, prompt: &str) -> Result<AssistantReply, BackendError> {
        self.dispatch(Operation::AskAssistant, json!({ "prompt": prompt }))
            .await?;
        Ok(AssistantReply {
            reply: format!("echo: {prompt}"),
        })
    }

    async fn list_invoices(&self) -> Result<Vec<InvoiceSummary>, BackendError> {
        self.dispatch(Operation::ListInvoices, Value::Null).await?;
        Ok(self.lock().invoices.clone())
    }

    /// A minimal document naming each matched invoice; unknown ids are ignored.
    async fn generate_sepa_remittance(&self, invoice_ids: &[EntityId]) -> Result<String, BackendError> {
        self.dispatch(Operation::GenerateSepaRemittance, json!(invoice_ids))
            .await?;
        let script = self.lock();
        let matched: Vec<&InvoiceSummary> = script
            .invoices
            .iter()
            .filter(|invoice| invoice_ids.contains(&invoice.id))
            .collect();
        if matched.is_empty() {
            return Err(BackendError::Rejected {
                status: 400,
                detail: "No se han seleccionado facturas".to_string(),
            });
        }
        let transactions: String = matched
            .iter()
            .map(|invoice| format!("<DrctDbtTxInf><EndToEndId>{}</EndToEndId></DrctDbtTxInf>", invoice.id))
            .collect();
        Ok(format!(
            "<Document><CstmrDrctDbtInitn><NbOfTxs>{}</NbOfTxs>{transactions}</CstmrDrctDbtInitn></Document>",
            matched.len()
        ))
    }

    async fn dashboard_stats(&self) -> Result<DashboardStats, BackendError> {
        self.dispatch(Operation::DashboardStats, Value::Null).await?;
        let script = self.lock();
        let active = script.clients.iter().filter(|client| client.is_active).count() as u64;
        let total = script.clients.len() as u64;
        Ok(DashboardStats {
            total_clients: total,
            active_clients: active,
            inactive_clients: total - active,
            new_today: 0,
            total_invoices: script.invoices.len() as u64,
            total_invoiced: script.invoices.iter().map(|invoice| invoice.amount).sum(),
        })
    }
}
