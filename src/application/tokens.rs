//! Public verification token issue and lookup.

use std::sync::Arc;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::error::ServiceError;
use crate::application::repos::{IssuanceUnit, VerificationTokensRepo};
use crate::domain::entities::VerificationToken;

#[derive(Clone)]
pub struct TokenRegistry {
    repo: Arc<dyn VerificationTokensRepo>,
    base_url: String,
}

impl TokenRegistry {
    pub fn new(repo: Arc<dyn VerificationTokensRepo>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { repo, base_url }
    }

    /// Register a token inside the caller's issuance unit. Nothing is visible
    /// to [`TokenRegistry::resolve`] until the unit commits.
    pub async fn issue(
        &self,
        unit: &mut dyn IssuanceUnit,
        certificate_id: Uuid,
        checksum: &str,
        expires_at: Option<OffsetDateTime>,
    ) -> Result<VerificationToken, ServiceError> {
        let token = VerificationToken::issue(certificate_id, checksum, expires_at);
        unit.insert_token(&token).await?;
        Ok(token)
    }

    pub async fn resolve(&self, public_id: Uuid) -> Result<VerificationToken, ServiceError> {
        self.repo
            .find_by_public_id(public_id)
            .await?
            .ok_or(ServiceError::not_found("verification token"))
    }

    pub async fn for_certificate(
        &self,
        certificate_id: Uuid,
    ) -> Result<Option<VerificationToken>, ServiceError> {
        Ok(self.repo.find_by_certificate(certificate_id).await?)
    }

    pub fn verification_url(&self, public_id: Uuid) -> String {
        format!("{}/{public_id}", self.base_url)
    }
}
