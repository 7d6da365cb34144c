//! Core types for the CRM backend abstraction

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use enerdesk_utils::error::BackendError;

use crate::listing::{SwitchingStatus, Urgency};

/// Opaque identifier of a backend-owned record.
///
/// The backend issues integers today; string ids are accepted and sent back
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Numeric(i64),
    Text(String),
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Numeric(id) => write!(f, "{id}"),
            EntityId::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        EntityId::Numeric(id)
    }
}

/// Response of every create endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Created {
    pub id: EntityId,
}

/// Response of `POST /upload/`.
///
/// Some deployments answer without a `url`; the upload still counts as done.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct StoredFile {
    #[serde(rename = "url", default)]
    pub stored_path: Option<String>,
}

/// Body of `POST /clientes/`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewClient {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "nif_cif")]
    pub tax_id: String,
    #[serde(rename = "persona_contacto")]
    pub contact_person: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "telefono")]
    pub phone: Option<String>,
    #[serde(rename = "iban")]
    pub bank_account: Option<String>,
}

/// Type tag of an attached document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    /// Proof of identity (DNI/NIE/CIF)
    #[serde(rename = "DNI")]
    Identity,
    /// Prior electricity invoice
    #[serde(rename = "FACTURA")]
    Invoice,
}

/// Body of `POST /documentos/`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewDocument {
    #[serde(rename = "tipo")]
    pub kind: DocumentKind,
    #[serde(rename = "nombre_archivo")]
    pub filename: String,
    #[serde(rename = "url_archivo")]
    pub stored_path: String,
    #[serde(rename = "cliente_id")]
    pub client_id: EntityId,
}

/// Body of `POST /puntos-suministro/`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSupplyPoint {
    pub cups: String,
    #[serde(rename = "direccion")]
    pub address: String,
    #[serde(rename = "codigo_postal")]
    pub postal_code: String,
    #[serde(rename = "provincia")]
    pub province: String,
    #[serde(rename = "tarifa_acceso")]
    pub access_tariff: String,
    #[serde(rename = "distribuidora")]
    pub distributor: Option<String>,
    #[serde(rename = "cliente_id")]
    pub client_id: EntityId,
}

/// Lifecycle state a contract is created in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ContractState {
    #[serde(rename = "Borrador")]
    Draft,
}

/// Body of `POST /contratos/`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewContract {
    #[serde(rename = "punto_suministro_id")]
    pub supply_point_id: EntityId,
    #[serde(rename = "comercializadora")]
    pub retailer: String,
    #[serde(rename = "producto")]
    pub product: String,
    #[serde(rename = "fecha_inicio")]
    pub start_date: Option<NaiveDate>,
    #[serde(rename = "fecha_fin")]
    pub end_date: Option<NaiveDate>,
    pub p1: f64,
    pub p2: f64,
    pub p3: f64,
    pub p4: f64,
    pub p5: f64,
    pub p6: f64,
    #[serde(rename = "estado")]
    pub state: ContractState,
}

/// Kind of switching process. Only supplier change with no contractual
/// modifications is ever requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwitchingKind {
    C1,
}

/// Body of `POST /procesos-atr/`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSwitchingRequest {
    #[serde(rename = "tipo")]
    pub kind: SwitchingKind,
    #[serde(rename = "codigo_solicitud")]
    pub code: String,
    #[serde(rename = "estado_atr")]
    pub status: String,
    #[serde(rename = "contrato_id")]
    pub contract_id: EntityId,
}

/// Row of `GET /clientes/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSummary {
    pub id: EntityId,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "nif_cif")]
    pub tax_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Row of `GET /procesos-atr/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchingRequestSummary {
    pub id: EntityId,
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "tipo")]
    pub kind: String,
    #[serde(rename = "cliente", default)]
    pub client: Option<String>,
    #[serde(default)]
    pub cups: Option<String>,
    #[serde(rename = "fecha", default)]
    pub date: Option<String>,
    #[serde(rename = "estado")]
    pub status: String,
}

impl SwitchingRequestSummary {
    #[must_use]
    pub fn status_class(&self) -> SwitchingStatus {
        SwitchingStatus::classify(&self.status)
    }
}

/// Row of `GET /renovaciones/pendientes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenewalAlert {
    pub id: EntityId,
    #[serde(rename = "cliente")]
    pub client: String,
    #[serde(rename = "telefono", default)]
    pub phone: Option<String>,
    pub cups: String,
    #[serde(rename = "comercializadora")]
    pub retailer: String,
    #[serde(rename = "fecha_fin", default)]
    pub end_date: Option<NaiveDate>,
    #[serde(rename = "dias_restantes")]
    pub days_remaining: i64,
}

impl RenewalAlert {
    #[must_use]
    pub fn urgency(&self, critical_days: i64) -> Urgency {
        Urgency::for_days(self.days_remaining, critical_days)
    }
}

/// Row of `GET /facturas/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceSummary {
    pub id: EntityId,
    #[serde(rename = "monto")]
    pub amount: f64,
    #[serde(rename = "concepto")]
    pub concept: String,
    #[serde(rename = "cliente_id")]
    pub client_id: EntityId,
    #[serde(rename = "estado", default = "default_invoice_status")]
    pub status: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

fn default_invoice_status() -> String {
    "Pendiente".to_string()
}

impl InvoiceSummary {
    /// Still waiting to be collected.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case("pendiente")
    }
}

/// Response of `GET /dashboard-stats/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    #[serde(rename = "total_clientes")]
    pub total_clients: u64,
    #[serde(rename = "activos")]
    pub active_clients: u64,
    #[serde(rename = "inactivos")]
    pub inactive_clients: u64,
    #[serde(rename = "nuevos_hoy")]
    pub new_today: u64,
    #[serde(rename = "total_facturas")]
    pub total_invoices: u64,
    #[serde(rename = "total_dinero")]
    pub total_invoiced: f64,
}

/// Response of `POST /ia/consultar`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantReply {
    pub reply: String,
}

/// Trait for CRM backend implementations
///
/// The onboarding orchestrator and the CLI only ever talk to the backend
/// through this trait, so a scripted fake can replace the HTTP client.
/// Every call is independent; implementations never retry mutations.
#[async_trait]
pub trait CrmBackend: Send + Sync {
    /// Create a client. A non-success response means a duplicate or invalid identity.
    async fn create_client(&self, client: &NewClient) -> Result<Created, BackendError>;

    /// Store raw file bytes and return the path the backend kept them under.
    async fn upload_file(&self, filename: &str, bytes: &[u8]) -> Result<StoredFile, BackendError>;

    async fn create_document(&self, document: &NewDocument) -> Result<Created, BackendError>;

    async fn create_supply_point(
        &self,
        supply_point: &NewSupplyPoint,
    ) -> Result<Created, BackendError>;

    async fn create_contract(&self, contract: &NewContract) -> Result<Created, BackendError>;

    async fn create_switching_request(
        &self,
        request: &NewSwitchingRequest,
    ) -> Result<Created, BackendError>;

    async fn list_clients(&self) -> Result<Vec<ClientSummary>, BackendError>;

    async fn list_switching_requests(&self) -> Result<Vec<SwitchingRequestSummary>, BackendError>;

    async fn list_pending_renewals(&self) -> Result<Vec<RenewalAlert>, BackendError>;

    /// Forward a free-text prompt to the assistant service.
    async fn ask_assistant(&self, prompt: &str) -> Result<AssistantReply, BackendError>;

    async fn list_invoices(&self) -> Result<Vec<InvoiceSummary>, BackendError>;

    /// Build the SEPA direct-debit remittance (pain.008 XML) for `invoice_ids`.
    ///
    /// The backend refuses an empty selection, or one matching no invoice.
    async fn generate_sepa_remittance(&self, invoice_ids: &[EntityId]) -> Result<String, BackendError>;

    async fn dashboard_stats(&self) -> Result<DashboardStats, BackendError>;
}
