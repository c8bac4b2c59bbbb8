use crate::reconcile::ReconcilePolicy;
use bytes::Bytes;
use http::Method;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// The four user-management operations the gateway mirrors. Each variant
/// is a thin descriptor: method, fixed upstream path, and the policy used
/// when the two backends disagree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationKind {
    CreateUser,
    EditUser,
    DeleteUser,
    UpdatePhoto,
}

impl OperationKind {
    /// Stable name for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::CreateUser => "create_user",
            OperationKind::EditUser => "edit_user",
            OperationKind::DeleteUser => "delete_user",
            OperationKind::UpdatePhoto => "update_photo",
        }
    }

    pub fn method(&self) -> Method {
        match self {
            OperationKind::CreateUser | OperationKind::UpdatePhoto => Method::POST,
            OperationKind::EditUser => Method::PUT,
            OperationKind::DeleteUser => Method::DELETE,
        }
    }

    /// Fixed resource path on both backends.
    pub fn upstream_path(&self) -> &'static str {
        match self {
            OperationKind::CreateUser => "/api/users",
            OperationKind::EditUser | OperationKind::DeleteUser => "/api/users/me",
            OperationKind::UpdatePhoto => "/api/users/me/updateUserPhoto?_method=put",
        }
    }

    /// CRUD results are individually retryable, so one good side is worth
    /// returning. A half-applied avatar is a visible defect, so the photo
    /// operation demands both sides.
    pub fn policy(&self) -> ReconcilePolicy {
        match self {
            OperationKind::UpdatePhoto => ReconcilePolicy::AllOrNothing,
            _ => ReconcilePolicy::FavorAvailability,
        }
    }
}

/// Opaque bearer token lifted from the inbound request and forwarded
/// verbatim to both backends. Lives exactly as long as one request.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Payload carried to both backends. Immutable once built; both upstream
/// invocations only read it.
#[derive(Clone, Debug)]
pub enum Payload {
    /// Raw request body, forwarded unmodified
    Json(Bytes),
    /// Staged upload for the photo operation
    Photo(StagedFile),
}

/// The logical intent of one inbound request.
#[derive(Clone, Debug)]
pub struct OperationRequest {
    pub kind: OperationKind,
    pub payload: Payload,
}

/// Temporary local copy of an uploaded file. Clones share the underlying
/// temp file; it is deleted when the last clone drops, which happens only
/// after both backend calls have concluded.
#[derive(Clone, Debug)]
pub struct StagedFile {
    file: Arc<NamedTempFile>,
    file_name: String,
}

impl StagedFile {
    pub fn new(file: NamedTempFile, file_name: String) -> Self {
        Self {
            file: Arc::new(file),
            file_name,
        }
    }

    /// Name the client gave the upload, reused for the outgoing part.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Opens its own read of the staged bytes. A stream cursor is never
    /// shared between backends; every send reads the file independently.
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(self.file.path()).await
    }
}
