use crate::errors::GatewayError;
use crate::operation::{Credential, StagedFile};
use bytes::Bytes;
use futures_util::stream;
use http::HeaderMap;
use http::header::AUTHORIZATION;
use multer::Multipart;
use tempfile::NamedTempFile;

/// Lifts the bearer credential out of the inbound headers. Absence fails
/// the request with 401 before any backend call is attempted.
pub fn extract_credential(headers: &HeaderMap) -> Result<Credential, GatewayError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or(GatewayError::MissingCredential)?;
    let value = header
        .to_str()
        .map_err(|_| GatewayError::MissingCredential)?;
    let token = value.strip_prefix("Bearer ").unwrap_or(value);
    tracing::debug!("extracted bearer credential");
    Ok(Credential::new(token))
}

/// Parses an already-collected multipart body, writes the single uploaded
/// file field to a scoped temp file, and returns the staged handle. Each
/// backend later opens its own read of that file.
pub async fn stage_photo(content_type: &str, body: Bytes) -> Result<StagedFile, GatewayError> {
    let boundary = multer::parse_boundary(content_type)?;
    let body_stream = stream::once(async move { Ok::<Bytes, std::convert::Infallible>(body) });
    let mut multipart = Multipart::new(body_stream, boundary);

    while let Some(field) = multipart.next_field().await? {
        let Some(file_name) = field.file_name().map(str::to_owned) else {
            tracing::debug!(
                field = field.name().unwrap_or("<unnamed>"),
                "skipping non-file field"
            );
            continue;
        };

        let data = field.bytes().await?;
        let file = NamedTempFile::new()?;
        tokio::fs::write(file.path(), &data).await?;
        tracing::info!(file = %file_name, size = data.len(), "staged uploaded file");
        return Ok(StagedFile::new(file, file_name));
    }

    Err(GatewayError::MissingUpload)
}
