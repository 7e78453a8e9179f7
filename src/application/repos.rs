//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{
    Certificate, CertificateJob, CertificateTemplate, DataMap, VerificationToken,
};
use crate::domain::types::CertificateStatus;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait TemplatesRepo: Send + Sync {
    async fn list_templates(&self, tenant_id: Uuid) -> Result<Vec<CertificateTemplate>, RepoError>;

    async fn find_template(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<CertificateTemplate>, RepoError>;

    async fn insert_template(&self, template: &CertificateTemplate) -> Result<(), RepoError>;

    async fn update_template(&self, template: &CertificateTemplate) -> Result<(), RepoError>;
}

#[derive(Debug, Clone)]
pub struct FinalizeIssuanceParams {
    pub certificate_id: Uuid,
    pub hash: String,
    pub storage_path: String,
    pub data: DataMap,
}

/// One atomic unit of certificate issuance.
///
/// Writes staged through a unit become visible together on [`IssuanceUnit::commit`];
/// dropping the unit without committing discards all of them.
#[async_trait]
pub trait IssuanceUnit: Send {
    async fn insert_certificate(&mut self, certificate: &Certificate) -> Result<(), RepoError>;

    async fn insert_token(&mut self, token: &VerificationToken) -> Result<(), RepoError>;

    /// Writes the final hash, storage path and mapping onto the certificate
    /// and copies the hash into its token's checksum.
    async fn finalize(&mut self, params: FinalizeIssuanceParams) -> Result<(), RepoError>;

    async fn commit(self: Box<Self>) -> Result<(), RepoError>;
}

#[async_trait]
pub trait CertificatesRepo: Send + Sync {
    async fn list_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<Certificate>, RepoError>;

    async fn find_for_tenant(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Certificate>, RepoError>;

    /// Unscoped lookup used by public verification.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Certificate>, RepoError>;

    /// Returns `false` when no certificate with `id` exists for the tenant.
    async fn update_status(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        status: CertificateStatus,
    ) -> Result<bool, RepoError>;

    async fn begin_issuance(&self) -> Result<Box<dyn IssuanceUnit>, RepoError>;
}

#[async_trait]
pub trait VerificationTokensRepo: Send + Sync {
    async fn find_by_public_id(
        &self,
        public_id: Uuid,
    ) -> Result<Option<VerificationToken>, RepoError>;

    async fn find_by_certificate(
        &self,
        certificate_id: Uuid,
    ) -> Result<Option<VerificationToken>, RepoError>;
}

#[async_trait]
pub trait CertificateJobsRepo: Send + Sync {
    async fn insert_job(&self, job: &CertificateJob) -> Result<(), RepoError>;

    /// Unscoped lookup used by the processor, which runs without a tenant.
    async fn find_job(&self, id: Uuid) -> Result<Option<CertificateJob>, RepoError>;

    async fn find_job_for_tenant(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<CertificateJob>, RepoError>;

    /// Atomically move up to `limit` oldest PENDING jobs to PROCESSING and
    /// return their ids ordered by `(created_at, id)`. Concurrent callers
    /// never receive the same id.
    async fn claim_pending(&self, limit: u32) -> Result<Vec<Uuid>, RepoError>;

    /// PROCESSING → COMPLETED. Returns `false` when the job was not PROCESSING.
    async fn complete_job(&self, id: Uuid, certificate_id: Uuid) -> Result<bool, RepoError>;

    /// PROCESSING → FAILED. Returns `false` when the job was not PROCESSING.
    async fn fail_job(&self, id: Uuid, error_message: &str) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn ping(&self) -> Result<(), RepoError>;
}
