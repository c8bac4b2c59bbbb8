use crate::adapt;
use crate::emit::{self, ResponseBody};
use crate::errors::GatewayError;
use crate::metrics_defs;
use crate::operation::{OperationKind, OperationRequest, Payload};
use crate::reconcile::FanOutCoordinator;
use http::Method;
use http::header::CONTENT_TYPE;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::service::Service;
use hyper::{Request, Response};
use shared::{counter, histogram};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

/// Maps an inbound method and path to the operation it requests.
fn route(method: &Method, path: &str) -> Option<OperationKind> {
    match path {
        "/api/users" if *method == Method::POST => Some(OperationKind::CreateUser),
        "/api/users/me" if *method == Method::PUT => Some(OperationKind::EditUser),
        "/api/users/me" if *method == Method::DELETE => Some(OperationKind::DeleteUser),
        "/api/users/me/updateUserPhoto" if *method == Method::POST => {
            Some(OperationKind::UpdatePhoto)
        }
        _ => None,
    }
}

/// Methods advertised on preflight for each known path.
fn allowed_methods(path: &str) -> &'static str {
    match path {
        "/api/users" | "/api/users/me/updateUserPhoto" => "POST, OPTIONS",
        "/api/users/me" => "PUT, DELETE, OPTIONS",
        _ => "POST, PUT, DELETE, OPTIONS",
    }
}

/// Hyper service wiring the adapter, coordinator, and emitter together.
pub struct GatewayService {
    coordinator: Arc<FanOutCoordinator>,
}

impl GatewayService {
    pub fn new(coordinator: Arc<FanOutCoordinator>) -> Self {
        Self { coordinator }
    }
}

impl Service<Request<Incoming>> for GatewayService {
    type Response = Response<ResponseBody>;
    type Error = GatewayError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, request: Request<Incoming>) -> Self::Future {
        let coordinator = self.coordinator.clone();
        Box::pin(async move { Ok(handle_request(coordinator, request).await) })
    }
}

/// Full pipeline for one request. Always produces exactly one response:
/// every outcome, early rejection or reconciled fan-out, converges on the
/// single return value instead of writing to the connection on its own.
pub async fn handle_request<B>(
    coordinator: Arc<FanOutCoordinator>,
    request: Request<B>,
) -> Response<ResponseBody>
where
    B: hyper::body::Body + Send + 'static,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    // Preflight is answered locally and needs no credential
    if method == Method::OPTIONS {
        return emit::preflight(allowed_methods(&path));
    }

    let response = match run_operation(coordinator, request).await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(%method, path, error = %err, "request rejected before fan-out");
            emit::emit_error(&err)
        }
    };

    histogram!(metrics_defs::REQUEST_DURATION).record(started.elapsed().as_secs_f64());
    response
}

async fn run_operation<B>(
    coordinator: Arc<FanOutCoordinator>,
    request: Request<B>,
) -> Result<Response<ResponseBody>, GatewayError>
where
    B: hyper::body::Body + Send + 'static,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let kind =
        route(request.method(), request.uri().path()).ok_or(GatewayError::NoRouteMatched)?;

    // Credential check precedes any body work or backend call
    let credential = adapt::extract_credential(request.headers())?;

    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();

    let body = request
        .into_body()
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|err| GatewayError::RequestBodyError(err.to_string()))?;

    let payload = match kind {
        OperationKind::UpdatePhoto => {
            Payload::Photo(adapt::stage_photo(&content_type, body).await?)
        }
        _ => Payload::Json(body),
    };
    let operation = OperationRequest { kind, payload };

    counter!(metrics_defs::REQUESTS).increment(1);
    tracing::info!(operation = kind.name(), "dispatching to both backends");

    let result = coordinator.dispatch(&operation, &credential).await;

    // The staged file (if any) is dropped with `operation` right after
    // this, once both backend calls have concluded.
    Ok(emit::emit(result))
}
