use crate::config::BackendConfig;
use crate::errors::GatewayError;
use crate::metrics_defs;
use crate::operation::{Credential, OperationRequest, Payload};
use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use http::header::CONTENT_TYPE;
use shared::counter;
use std::time::Duration;

/// Result of one backend call. Produced exactly once per backend per
/// request and never mutated; the coordinator owns the pair until the
/// emitter consumes the reconciled decision.
#[derive(Clone, Debug, PartialEq)]
pub enum BackendOutcome {
    /// The backend returned 200; body passes through verbatim
    Success { body: Bytes },
    /// The backend spoke but declined the operation
    UpstreamError { status: StatusCode, body: Bytes },
    /// The exchange never completed (DNS, connect, timeout, body read)
    TransportError { cause: String },
}

impl BackendOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BackendOutcome::Success { .. })
    }
}

/// Seam between the coordinator and the wire. Implementations are total:
/// every code path yields an outcome, never an error the caller must
/// catch.
#[async_trait]
pub trait BackendInvoker: Send + Sync {
    async fn invoke(
        &self,
        backend: &BackendConfig,
        request: &OperationRequest,
        credential: &Credential,
    ) -> BackendOutcome;
}

/// HTTP client performing one operation against one named backend.
pub struct UpstreamClient {
    client: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(http_timeout_secs: u64) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(http_timeout_secs))
            .build()?;
        Ok(Self { client })
    }

    async fn send(
        &self,
        backend: &BackendConfig,
        request: &OperationRequest,
        credential: &Credential,
    ) -> Result<reqwest::Response, GatewayError> {
        let url = backend.url.join(request.kind.upstream_path())?;

        let builder = self
            .client
            .request(request.kind.method(), url)
            .bearer_auth(credential.token());

        let builder = match &request.payload {
            Payload::Json(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(body.clone()),
            Payload::Photo(staged) => {
                // Independently-opened read per backend; multipart bodies
                // cannot share a cursor.
                let bytes = staged.read().await?;
                let part = reqwest::multipart::Part::bytes(bytes)
                    .file_name(staged.file_name().to_owned());
                builder.multipart(reqwest::multipart::Form::new().part("avatar", part))
            }
        };

        Ok(builder.send().await?)
    }
}

fn outcome_label(outcome: &BackendOutcome) -> &'static str {
    match outcome {
        BackendOutcome::Success { .. } => "success",
        BackendOutcome::UpstreamError { .. } => "upstream_error",
        BackendOutcome::TransportError { .. } => "transport_error",
    }
}

#[async_trait]
impl BackendInvoker for UpstreamClient {
    async fn invoke(
        &self,
        backend: &BackendConfig,
        request: &OperationRequest,
        credential: &Credential,
    ) -> BackendOutcome {
        let outcome = self.exchange(backend, request, credential).await;
        counter!(
            metrics_defs::BACKEND_OUTCOMES,
            "backend" => backend.name.clone(),
            "outcome" => outcome_label(&outcome)
        )
        .increment(1);
        outcome
    }
}

impl UpstreamClient {
    async fn exchange(
        &self,
        backend: &BackendConfig,
        request: &OperationRequest,
        credential: &Credential,
    ) -> BackendOutcome {
        let response = match self.send(backend, request, credential).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(
                    backend = %backend.name,
                    operation = request.kind.name(),
                    error = %err,
                    "upstream exchange failed"
                );
                return BackendOutcome::TransportError {
                    cause: err.to_string(),
                };
            }
        };

        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(err) => {
                return BackendOutcome::TransportError {
                    cause: err.to_string(),
                };
            }
        };

        if status == StatusCode::OK {
            tracing::info!(
                backend = %backend.name,
                operation = request.kind.name(),
                "backend accepted operation"
            );
            BackendOutcome::Success { body }
        } else {
            tracing::warn!(
                backend = %backend.name,
                operation = request.kind.name(),
                %status,
                "backend declined operation"
            );
            BackendOutcome::UpstreamError { status, body }
        }
    }
}
