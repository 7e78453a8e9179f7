//! Certificate generation, reads and revocation.
//!
//! Issuance runs as one [`IssuanceUnit`]: the pending certificate row, its
//! verification token and the final hash/storage update commit together, so
//! readers either see a finalized certificate or nothing at all.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::error::ServiceError;
use crate::application::rendering::{ContentRenderer, ImageEncoder, render_off_thread};
use crate::application::repos::{
    CertificatesRepo, FinalizeIssuanceParams, IssuanceUnit, TemplatesRepo,
};
use crate::application::storage::{BlobStore, StorageError};
use crate::application::tokens::TokenRegistry;
use crate::domain::entities::{
    Certificate, CertificateJob, CertificateTemplate, DataMap, PENDING_MARKER, VerificationToken,
};
use crate::domain::placeholders::apply_placeholders;
use crate::domain::tenant::TenantContext;
use crate::domain::types::CertificateStatus;

/// Data key that receives the verification image unless the caller supplied one.
pub const QR_CODE_KEY: &str = "qrCodeImage";

/// Hex-encoded SHA-256 of the rendered document.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes).as_slice())
}

/// Certificate plus the public handle third parties use to verify it.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateView {
    #[serde(flatten)]
    pub certificate: Certificate,
    pub verification_public_id: Option<Uuid>,
    pub verification_url: Option<String>,
}

pub struct CertificatePipeline {
    templates: Arc<dyn TemplatesRepo>,
    certificates: Arc<dyn CertificatesRepo>,
    tokens: TokenRegistry,
    renderer: Arc<dyn ContentRenderer>,
    encoder: Arc<dyn ImageEncoder>,
    blobs: Arc<dyn BlobStore>,
    qr_size: u32,
}

impl CertificatePipeline {
    pub fn new(
        templates: Arc<dyn TemplatesRepo>,
        certificates: Arc<dyn CertificatesRepo>,
        tokens: TokenRegistry,
        renderer: Arc<dyn ContentRenderer>,
        encoder: Arc<dyn ImageEncoder>,
        blobs: Arc<dyn BlobStore>,
        qr_size: u32,
    ) -> Self {
        Self {
            templates,
            certificates,
            tokens,
            renderer,
            encoder,
            blobs,
            qr_size,
        }
    }

    /// Render a preview. The QR code points at a random public id that is never registered.
    pub async fn simulate(
        &self,
        ctx: &TenantContext,
        template_id: Uuid,
        data: DataMap,
    ) -> Result<Vec<u8>, ServiceError> {
        let tenant_id = ctx.require()?;
        let template = self.find_template(tenant_id, template_id).await?;

        let mut data = data;
        let throwaway = self.tokens.verification_url(Uuid::new_v4());
        self.embed_verification_image(&mut data, &throwaway)?;

        let html = apply_placeholders(&template.html_template, &data);
        Ok(render_off_thread(self.renderer.clone(), html).await?)
    }

    pub async fn generate(
        &self,
        ctx: &TenantContext,
        template_id: Uuid,
        data: DataMap,
        created_by: &str,
    ) -> Result<CertificateView, ServiceError> {
        let tenant_id = ctx.require()?;
        let template = self.find_template(tenant_id, template_id).await?;
        let (certificate, token) = self.issue(tenant_id, &template, data, created_by).await?;

        metrics::counter!("certify_certificates_generated_total").increment(1);
        info!(
            target = "certify::application::certificates",
            tenant_id = %tenant_id,
            certificate_id = %certificate.header.id,
            template_id = %template_id,
            "certificate issued"
        );

        Ok(self.view(certificate, Some(token)))
    }

    /// Generate on behalf of a claimed job. `ctx` must be bound to the job's tenant.
    pub async fn process_job(
        &self,
        ctx: &TenantContext,
        job: &CertificateJob,
    ) -> Result<CertificateView, ServiceError> {
        let tenant_id = ctx.require()?;
        if tenant_id != job.tenant_id {
            return Err(ServiceError::Invariant(format!(
                "job `{}` belongs to a different tenant than the bound context",
                job.header.id
            )));
        }
        self.generate(ctx, job.template_id, job.request_data.clone(), &job.requested_by)
            .await
    }

    pub async fn list_for_tenant(
        &self,
        ctx: &TenantContext,
    ) -> Result<Vec<CertificateView>, ServiceError> {
        let tenant_id = ctx.require()?;
        let certificates = self.certificates.list_for_tenant(tenant_id).await?;

        let mut views = Vec::with_capacity(certificates.len());
        for certificate in certificates {
            views.push(self.describe(certificate).await?);
        }
        Ok(views)
    }

    pub async fn get_for_tenant(
        &self,
        ctx: &TenantContext,
        id: Uuid,
    ) -> Result<CertificateView, ServiceError> {
        let certificate = self.find_certificate(ctx, id).await?;
        self.describe(certificate).await
    }

    /// Tenant-unscoped lookup reserved for public verification.
    pub async fn get_by_id(&self, id: Uuid) -> Result<CertificateView, ServiceError> {
        let certificate = self
            .certificates
            .find_by_id(id)
            .await?
            .ok_or(ServiceError::not_found("certificate"))?;
        self.describe(certificate).await
    }

    pub async fn download(&self, ctx: &TenantContext, id: Uuid) -> Result<Bytes, ServiceError> {
        let certificate = self.find_certificate(ctx, id).await?;
        match self.blobs.load(&certificate.storage_path).await {
            Ok(bytes) => Ok(bytes),
            Err(StorageError::NotFound { .. }) => Err(ServiceError::not_found("stored certificate")),
            Err(err) => Err(err.into()),
        }
    }

    /// Mark a certificate REVOKED. Repeating the call on a revoked certificate is a no-op.
    pub async fn revoke(
        &self,
        ctx: &TenantContext,
        id: Uuid,
        reason: Option<&str>,
    ) -> Result<CertificateView, ServiceError> {
        let mut certificate = self.find_certificate(ctx, id).await?;

        if certificate.revoke() {
            let updated = self
                .certificates
                .update_status(certificate.tenant_id, id, CertificateStatus::Revoked)
                .await?;
            if !updated {
                return Err(ServiceError::not_found("certificate"));
            }
            info!(
                target = "certify::application::certificates",
                tenant_id = %certificate.tenant_id,
                certificate_id = %id,
                reason = reason.unwrap_or("unspecified"),
                "certificate revoked"
            );
        }

        self.describe(certificate).await
    }

    async fn issue(
        &self,
        tenant_id: Uuid,
        template: &CertificateTemplate,
        data: DataMap,
        created_by: &str,
    ) -> Result<(Certificate, VerificationToken), ServiceError> {
        let mut unit = self.certificates.begin_issuance().await?;

        let mut certificate =
            Certificate::pending(tenant_id, template.header.id, data.clone(), created_by);
        unit.insert_certificate(&certificate).await?;

        let mut token = self
            .tokens
            .issue(unit.as_mut(), certificate.header.id, PENDING_MARKER, None)
            .await?;

        let mut data = data;
        let url = self.tokens.verification_url(token.public_id);
        self.embed_verification_image(&mut data, &url)?;

        let html = apply_placeholders(&template.html_template, &data);
        let pdf = render_off_thread(self.renderer.clone(), html).await?;
        let hash = content_hash(&pdf);
        let storage_path = self.blobs.save(tenant_id, certificate.header.id, &pdf).await?;

        if let Err(err) = Self::finalize(unit, &mut certificate, &hash, &storage_path, data).await
        {
            if let Err(cleanup) = self.blobs.delete(&storage_path).await {
                warn!(
                    target = "certify::application::certificates",
                    certificate_id = %certificate.header.id,
                    storage_path = %storage_path,
                    error = %cleanup,
                    "failed to remove blob of abandoned issuance"
                );
            }
            return Err(err);
        }

        token.checksum = hash;
        Ok((certificate, token))
    }

    async fn finalize(
        mut unit: Box<dyn IssuanceUnit>,
        certificate: &mut Certificate,
        hash: &str,
        storage_path: &str,
        data: DataMap,
    ) -> Result<(), ServiceError> {
        certificate.finalize(hash.to_string(), storage_path.to_string(), data.clone())?;
        unit.finalize(FinalizeIssuanceParams {
            certificate_id: certificate.header.id,
            hash: hash.to_string(),
            storage_path: storage_path.to_string(),
            data,
        })
        .await?;
        unit.commit().await?;
        Ok(())
    }

    fn embed_verification_image(&self, data: &mut DataMap, url: &str) -> Result<(), ServiceError> {
        if data.contains_key(QR_CODE_KEY) {
            return Ok(());
        }
        let image = self.encoder.encode(url, self.qr_size)?;
        data.insert(QR_CODE_KEY.to_string(), image.into());
        Ok(())
    }

    async fn find_template(
        &self,
        tenant_id: Uuid,
        template_id: Uuid,
    ) -> Result<CertificateTemplate, ServiceError> {
        self.templates
            .find_template(tenant_id, template_id)
            .await?
            .ok_or(ServiceError::not_found("template"))
    }

    async fn find_certificate(
        &self,
        ctx: &TenantContext,
        id: Uuid,
    ) -> Result<Certificate, ServiceError> {
        let tenant_id = ctx.require()?;
        self.certificates
            .find_for_tenant(tenant_id, id)
            .await?
            .ok_or(ServiceError::not_found("certificate"))
    }

    async fn describe(&self, certificate: Certificate) -> Result<CertificateView, ServiceError> {
        let token = self.tokens.for_certificate(certificate.header.id).await?;
        Ok(self.view(certificate, token))
    }

    fn view(&self, certificate: Certificate, token: Option<VerificationToken>) -> CertificateView {
        let public_id = token.map(|token| token.public_id);
        CertificateView {
            certificate,
            verification_public_id: public_id,
            verification_url: public_id.map(|id| self.tokens.verification_url(id)),
        }
    }
}
