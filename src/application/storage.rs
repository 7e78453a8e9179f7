//! Blob storage seam for rendered certificates.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error("stored blob `{path}` not found")]
    NotFound { path: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Relative path of a certificate blob; unique per (tenant, certificate).
pub fn certificate_path(tenant_id: Uuid, certificate_id: Uuid) -> String {
    format!("{tenant_id}/{certificate_id}.pdf")
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist `bytes` and return the opaque path used to load them back.
    async fn save(
        &self,
        tenant_id: Uuid,
        certificate_id: Uuid,
        bytes: &[u8],
    ) -> Result<String, StorageError>;

    async fn load(&self, path: &str) -> Result<Bytes, StorageError>;

    /// Missing blobs are treated as success.
    async fn delete(&self, path: &str) -> Result<(), StorageError>;
}
