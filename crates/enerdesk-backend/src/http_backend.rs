//! REST implementation of [`CrmBackend`].

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use enerdesk_config::Config;
use enerdesk_utils::error::BackendError;

use crate::http_client::HttpClient;
use crate::session::{LoginRequest, LoginResponse, SessionContext};
use crate::types::{
    AssistantReply, ClientSummary, Created, CrmBackend, DashboardStats, EntityId, InvoiceSummary,
    NewClient, NewContract, NewDocument, NewSupplyPoint, NewSwitchingRequest, RenewalAlert,
    StoredFile, SwitchingRequestSummary,
};

/// CRM backend reached over HTTP.
///
/// Every request carries the session's bearer token, if it has one.
#[derive(Clone)]
pub struct HttpBackend {
    client: Arc<HttpClient>,
    base_url: String,
    session: SessionContext,
}

impl HttpBackend {
    /// # Errors
    ///
    /// Returns `BackendError::Misconfiguration` if the base URL is not http(s)
    /// or the HTTP client cannot be constructed
    pub fn new(
        base_url: impl Into<String>,
        session: SessionContext,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, BackendError> {
        let base_url: String = base_url.into();
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(BackendError::Misconfiguration(format!(
                "base URL '{base_url}' must start with http:// or https://"
            )));
        }

        let client = HttpClient::new(connect_timeout, request_timeout)?;

        Ok(Self {
            client: Arc::new(client),
            base_url,
            session,
        })
    }

    /// Create a backend from the `[backend]` configuration section.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Misconfiguration` for an unknown role or an
    /// unusable base URL.
    pub fn new_from_config(config: &Config) -> Result<Self, BackendError> {
        let session = SessionContext::from_config(config)?;
        Self::new(
            config.backend.base_url.clone(),
            session,
            Duration::from_secs(config.backend.connect_timeout_secs),
            Duration::from_secs(config.backend.request_timeout_secs),
        )
    }

    /// Same backend, acting under another session.
    #[must_use]
    pub fn with_session(mut self, session: SessionContext) -> Self {
        self.session = session;
        self
    }

    #[must_use]
    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Exchange credentials for a session via `POST /login`.
    ///
    /// The backend answers bad credentials with a 400; that is reported as
    /// `BackendError::Unauthorized`.
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionContext, BackendError> {
        let request = self
            .client
            .client()
            .post(self.url("/login"))
            .json(&LoginRequest { email, password });

        let response = match self.client.send_once(request, "login").await {
            Err(BackendError::Rejected { detail, .. }) => {
                return Err(BackendError::Unauthorized(format!("login refused: {detail}")));
            }
            other => other?,
        };

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(format!("login response: {e}")))?;

        debug!(role = ?body.role, "Login succeeded");
        Ok(body.into_session(email))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.session.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn post_json<B, R>(&self, path: &str, body: &B, operation: &str) -> Result<R, BackendError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned + Send,
    {
        let request = self.authorized(self.client.client().post(self.url(path))).json(body);
        let response = self.client.send_once(request, operation).await?;
        parse_body(response, operation).await
    }

    async fn get_json<R>(&self, path: &str, operation: &str) -> Result<R, BackendError>
    where
        R: DeserializeOwned + Send,
    {
        let request = self.authorized(self.client.client().get(self.url(path)));
        let response = self.client.execute_with_retry(request, operation).await?;
        parse_body(response, operation).await
    }
}

async fn parse_body<R: DeserializeOwned>(
    response: reqwest::Response,
    operation: &str,
) -> Result<R, BackendError> {
    response
        .json()
        .await
        .map_err(|e| BackendError::InvalidResponse(format!("{operation} response: {e}")))
}

#[async_trait]
impl CrmBackend for HttpBackend {
    async fn create_client(&self, client: &NewClient) -> Result<Created, BackendError> {
        self.post_json("/clientes/", client, "create_client").await
    }

    async fn upload_file(&self, filename: &str, bytes: &[u8]) -> Result<StoredFile, BackendError> {
        let part = Part::bytes(bytes.to_vec()).file_name(filename.to_string());
        let form = Form::new().part("file", part);
        let request = self
            .authorized(self.client.client().post(self.url("/upload/")))
            .multipart(form);

        debug!(filename = filename, size = bytes.len(), "Uploading document");
        let response = self.client.send_once(request, "upload_file").await?;
        parse_body(response, "upload_file").await
    }

    async fn create_document(&self, document: &NewDocument) -> Result<Created, BackendError> {
        self.post_json("/documentos/", document, "create_document").await
    }

    async fn create_supply_point(
        &self,
        supply_point: &NewSupplyPoint,
    ) -> Result<Created, BackendError> {
        self.post_json("/puntos-suministro/", supply_point, "create_supply_point")
            .await
    }

    async fn create_contract(&self, contract: &NewContract) -> Result<Created, BackendError> {
        self.post_json("/contratos/", contract, "create_contract").await
    }

    async fn create_switching_request(
        &self,
        request: &NewSwitchingRequest,
    ) -> Result<Created, BackendError> {
        self.post_json("/procesos-atr/", request, "create_switching_request")
            .await
    }

    async fn list_clients(&self) -> Result<Vec<ClientSummary>, BackendError> {
        self.get_json("/clientes/", "list_clients").await
    }

    async fn list_switching_requests(&self) -> Result<Vec<SwitchingRequestSummary>, BackendError> {
        self.get_json("/procesos-atr/", "list_switching_requests").await
    }

    async fn list_pending_renewals(&self) -> Result<Vec<RenewalAlert>, BackendError> {
        self.get_json("/renovaciones/pendientes", "list_pending_renewals")
            .await
    }

    async fn ask_assistant(&self, prompt: &str) -> Result<AssistantReply, BackendError> {
        #[derive(Serialize)]
        struct Prompt<'a> {
            prompt: &'a str,
        }
        self.post_json("/ia/consultar", &Prompt { prompt }, "ask_assistant")
            .await
    }

    async fn list_invoices(&self) -> Result<Vec<InvoiceSummary>, BackendError> {
        self.get_json("/facturas/", "list_invoices").await
    }

    async fn generate_sepa_remittance(&self, invoice_ids: &[EntityId]) -> Result<String, BackendError> {
        let request = self
            .authorized(self.client.client().post(self.url("/facturas/generar-remesa")))
            .json(invoice_ids);

        debug!(invoices = invoice_ids.len(), "Requesting SEPA remittance");
        let response = self
            .client
            .send_once(request, "generate_sepa_remittance")
            .await?;
        let xml = response.text().await.map_err(|e| {
            BackendError::InvalidResponse(format!("generate_sepa_remittance response: {e}"))
        })?;
        if xml.trim().is_empty() {
            return Err(BackendError::InvalidResponse(
                "generate_sepa_remittance response: empty document".to_string(),
            ));
        }
        Ok(xml)
    }

    async fn dashboard_stats(&self) -> Result<DashboardStats, BackendError> {
        self.get_json("/dashboard-stats/", "dashboard_stats").await
    }
}
