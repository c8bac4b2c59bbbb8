use crate::errors::GatewayError;
use crate::reconcile::ReconciledResult;
use bytes::Bytes;
use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_MAX_AGE, HeaderValue,
};
use http::{Response, StatusCode};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};

pub type ResponseBody = BoxBody<Bytes, GatewayError>;

fn full_body(bytes: Bytes) -> ResponseBody {
    Full::new(bytes).map_err(|never| match never {}).boxed()
}

/// Base CORS headers present on every response, preflight or not.
pub fn apply_cors(response: &mut Response<ResponseBody>) {
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Authorization, Content-Type"),
    );
}

/// 204 preflight answer advertising the methods the path accepts, with a
/// one hour preflight cache.
pub fn preflight(allowed_methods: &'static str) -> Response<ResponseBody> {
    let mut response = Response::new(full_body(Bytes::new()));
    *response.status_mut() = StatusCode::NO_CONTENT;
    {
        let headers = response.headers_mut();
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(allowed_methods),
        );
        headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("3600"));
    }
    apply_cors(&mut response);
    response
}

/// Terminal mapping from the reconciled decision to the one HTTP response.
/// Every fan-out, whatever its timing, funnels through this single call.
pub fn emit(result: ReconciledResult) -> Response<ResponseBody> {
    let status = result.status();
    let body = match result {
        ReconciledResult::Replicated { body } | ReconciledResult::Partial { body } => body,
        ReconciledResult::Inconsistent { failed_backend } => {
            Bytes::from(format!("Image upload failed on {failed_backend}"))
        }
        ReconciledResult::Rejected { body, .. } => body,
        ReconciledResult::Unreachable { backends: [a, b] } => {
            Bytes::from(format!("transport failure reaching {a} and {b}"))
        }
    };

    let mut response = Response::new(full_body(body));
    *response.status_mut() = status;
    apply_cors(&mut response);
    response
}

/// Response for errors raised before any backend was contacted.
pub fn emit_error(err: &GatewayError) -> Response<ResponseBody> {
    let mut response = Response::new(full_body(Bytes::from(err.to_string())));
    *response.status_mut() = err.status();
    apply_cors(&mut response);
    response
}
