//! Shared HTTP client infrastructure for the CRM backend
//!
//! One `reqwest::Client` per backend, with the timeout policy applied per
//! request. Reads are retried on 5xx and network failures; mutations are sent
//! exactly once.

use once_cell::sync::Lazy;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use enerdesk_utils::error::BackendError;
use enerdesk_utils::redaction::redact_error_message;

/// Maximum number of retry attempts for idempotent reads
const MAX_RETRIES: u32 = 2;

/// Initial backoff duration for retries, scaled linearly per attempt
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Longest error body excerpt kept in an error
const MAX_DETAIL_CHARS: usize = 300;

static USER_AGENT: Lazy<String> = Lazy::new(|| format!("enerdesk/{}", env!("CARGO_PKG_VERSION")));

#[derive(Clone)]
pub(crate) struct HttpClient {
    client: Arc<Client>,
    request_timeout: Duration,
}

impl HttpClient {
    /// # Errors
    ///
    /// Returns `BackendError::Misconfiguration` if the client cannot be constructed
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(4)
            .user_agent(USER_AGENT.as_str())
            .build()
            .map_err(|e| {
                BackendError::Misconfiguration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client: Arc::new(client),
            request_timeout,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Send a mutating request exactly once.
    pub async fn send_once(
        &self,
        request_builder: RequestBuilder,
        operation: &str,
    ) -> Result<Response, BackendError> {
        debug!(
            operation = operation,
            timeout_secs = self.request_timeout.as_secs(),
            "Sending backend request"
        );

        let response = request_builder
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| self.map_transport_error(&e, operation))?;

        check_status(response, operation).await
    }

    /// Execute an idempotent request with the retry policy
    ///
    /// - Up to 2 retries for 5xx and network failures
    /// - Linear backoff: 500ms, 1s
    /// - No retries for 4xx or timeouts
    pub async fn execute_with_retry(
        &self,
        request_builder: RequestBuilder,
        operation: &str,
    ) -> Result<Response, BackendError> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let request = request_builder
                .try_clone()
                .ok_or_else(|| {
                    BackendError::Transport("Failed to clone request for retry".to_string())
                })?
                .timeout(self.request_timeout);

            debug!(operation = operation, attempt = attempt, "Executing backend read");

            let result = match request.send().await {
                Ok(response) => check_status(response, operation).await,
                Err(e) => Err(self.map_transport_error(&e, operation)),
            };

            match result {
                Err(error) if error.is_retryable() && attempt <= MAX_RETRIES => {
                    warn!(
                        operation = operation,
                        attempt = attempt,
                        error = %error,
                        "Backend read failed, will retry"
                    );
                    tokio::time::sleep(INITIAL_BACKOFF * attempt).await;
                }
                other => return other,
            }
        }
    }

    fn map_transport_error(&self, error: &reqwest::Error, operation: &str) -> BackendError {
        if error.is_timeout() {
            return BackendError::Timeout {
                duration: self.request_timeout,
            };
        }
        BackendError::Transport(format!(
            "{operation} request failed: {}",
            redact_error_message(&error.to_string())
        ))
    }
}

/// Turn non-success statuses into `BackendError`, reading the body for detail.
async fn check_status(response: Response, operation: &str) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = extract_detail(&body);
    debug!(operation = operation, status = status.as_u16(), detail = %detail, "Backend refused request");
    Err(map_status_error(status, operation, detail))
}

/// Map HTTP error status codes to `BackendError` variants
///
/// - 401/403 → `BackendError::Unauthorized`
/// - other 4xx → `BackendError::Rejected`
/// - 5xx → `BackendError::ServerError`
fn map_status_error(status: StatusCode, operation: &str, detail: String) -> BackendError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            BackendError::Unauthorized(format!("{operation} refused with {status}"))
        }
        s if s.is_server_error() => BackendError::ServerError {
            status: s.as_u16(),
            detail,
        },
        s => BackendError::Rejected {
            status: s.as_u16(),
            detail,
        },
    }
}

/// Pull a readable message out of an error body.
///
/// The backend answers `{"detail": "..."}`; validation errors carry a list
/// under the same key. Anything else is kept verbatim, truncated.
pub(crate) fn extract_detail(body: &str) -> String {
    let detail = match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => match map.get("detail") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => body.trim().to_string(),
        },
        _ => body.trim().to_string(),
    };

    let detail = if detail.is_empty() {
        "no detail provided".to_string()
    } else {
        detail
    };

    let truncated: String = detail.chars().take(MAX_DETAIL_CHARS).collect();
    redact_error_message(&truncated)
}
