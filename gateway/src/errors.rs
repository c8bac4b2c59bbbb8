use http::StatusCode;
use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T, E = GatewayError> = std::result::Result<T, E>;

/// Errors raised on the inbound half of the pipeline, before the fan-out
/// decision exists. Upstream failures never appear here; they travel as
/// `BackendOutcome` values instead.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Missing auth token")]
    MissingCredential,

    #[error("No route matched for request")]
    NoRouteMatched,

    #[error("Failed to read request body: {0}")]
    RequestBodyError(String),

    #[error("Invalid multipart payload: {0}")]
    Multipart(#[from] multer::Error),

    #[error("No file field found in upload")]
    MissingUpload,

    #[error("Invalid upstream URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Status written when this error terminates a request early.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::MissingCredential => StatusCode::UNAUTHORIZED,
            GatewayError::NoRouteMatched => StatusCode::NOT_FOUND,
            GatewayError::RequestBodyError(_)
            | GatewayError::Multipart(_)
            | GatewayError::MissingUpload => StatusCode::BAD_REQUEST,
            GatewayError::InvalidUrl(_)
            | GatewayError::HttpClient(_)
            | GatewayError::Internal(_)
            | GatewayError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
