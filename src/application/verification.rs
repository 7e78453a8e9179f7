use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::application::certificates::CertificatePipeline;
use crate::application::error::ServiceError;
use crate::application::tokens::TokenRegistry;
use crate::domain::verification::{Verdict, verdict};

/// Public, tenant-agnostic verification of issued certificates.
#[derive(Clone)]
pub struct VerificationService {
    tokens: TokenRegistry,
    pipeline: Arc<CertificatePipeline>,
}

impl VerificationService {
    pub fn new(tokens: TokenRegistry, pipeline: Arc<CertificatePipeline>) -> Self {
        Self { tokens, pipeline }
    }

    /// Fails with [`ServiceError::NotFound`] when `public_id` was never registered.
    pub async fn verify(&self, public_id: Uuid) -> Result<Verdict, ServiceError> {
        let token = self.tokens.resolve(public_id).await?;
        let view = self.pipeline.get_by_id(token.certificate_id).await?;
        let verdict = verdict(&view.certificate, &token);

        metrics::counter!("certify_verifications_total", "reason" => verdict.reason.as_str())
            .increment(1);
        debug!(
            target = "certify::application::verification",
            certificate_id = %verdict.certificate_id,
            reason = verdict.reason.as_str(),
            "certificate verified"
        );

        Ok(verdict)
    }
}
