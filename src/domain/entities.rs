//! Persisted entities and their state transitions.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::error::DomainError;
use super::types::{CertificateStatus, JobStatus};

/// Key→value mapping rendered into a template.
pub type DataMap = serde_json::Map<String, serde_json::Value>;

/// Value stored in `hash`, `storage_path` and token `checksum` until issuance finalizes.
pub const PENDING_MARKER: &str = "pending";

/// Identity and audit columns shared by every tenant-owned entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordHeader {
    pub id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl RecordHeader {
    pub fn new() -> Self {
        Self::at(OffsetDateTime::now_utc())
    }

    pub fn at(now: OffsetDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = OffsetDateTime::now_utc();
    }
}

impl Default for RecordHeader {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderDefinition {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CertificateTemplate {
    #[serde(flatten)]
    pub header: RecordHeader,
    pub tenant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub html_template: String,
    pub placeholders: Vec<PlaceholderDefinition>,
    pub active: bool,
    pub version: i32,
}

/// Editable template fields, shared by create and update.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateContent {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub html_template: String,
    #[serde(default)]
    pub placeholders: Vec<PlaceholderDefinition>,
}

impl TemplateContent {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::blank("template name"));
        }
        if self.html_template.trim().is_empty() {
            return Err(DomainError::blank("template html"));
        }

        let mut seen = HashSet::new();
        for placeholder in &self.placeholders {
            if placeholder.key.trim().is_empty()
                || placeholder.label.trim().is_empty()
                || placeholder.kind.trim().is_empty()
            {
                return Err(DomainError::blank("placeholder key, label and type"));
            }
            if !seen.insert(placeholder.key.as_str()) {
                return Err(DomainError::DuplicatePlaceholder {
                    key: placeholder.key.clone(),
                });
            }
        }

        Ok(())
    }
}

impl CertificateTemplate {
    pub fn create(tenant_id: Uuid, content: TemplateContent) -> Result<Self, DomainError> {
        content.validate()?;
        Ok(Self {
            header: RecordHeader::new(),
            tenant_id,
            name: content.name,
            description: content.description,
            html_template: content.html_template,
            placeholders: content.placeholders,
            active: true,
            version: 1,
        })
    }

    /// Replace the editable content; every edit bumps `version` by one.
    pub fn revise(&mut self, content: TemplateContent) -> Result<(), DomainError> {
        content.validate()?;
        self.name = content.name;
        self.description = content.description;
        self.html_template = content.html_template;
        self.placeholders = content.placeholders;
        self.version += 1;
        self.header.touch();
        Ok(())
    }

    pub fn deactivate(&mut self) {
        self.active = false;
        self.header.touch();
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Certificate {
    #[serde(flatten)]
    pub header: RecordHeader,
    pub tenant_id: Uuid,
    pub template_id: Uuid,
    pub data: DataMap,
    pub status: CertificateStatus,
    pub storage_path: String,
    pub hash: String,
    pub created_by: String,
}

impl Certificate {
    /// Initial row written before the PDF exists; `hash` and `storage_path`
    /// carry [`PENDING_MARKER`] until [`Certificate::finalize`].
    pub fn pending(tenant_id: Uuid, template_id: Uuid, data: DataMap, created_by: &str) -> Self {
        Self {
            header: RecordHeader::new(),
            tenant_id,
            template_id,
            data,
            status: CertificateStatus::Generated,
            storage_path: PENDING_MARKER.to_string(),
            hash: PENDING_MARKER.to_string(),
            created_by: created_by.to_string(),
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.hash != PENDING_MARKER && self.storage_path != PENDING_MARKER
    }

    pub fn finalize(
        &mut self,
        hash: String,
        storage_path: String,
        data: DataMap,
    ) -> Result<(), DomainError> {
        if self.is_finalized() {
            return Err(DomainError::AlreadyFinalized {
                certificate_id: self.header.id,
            });
        }
        self.hash = hash;
        self.storage_path = storage_path;
        self.data = data;
        self.header.touch();
        Ok(())
    }

    /// Returns `false` when the certificate was already revoked.
    pub fn revoke(&mut self) -> bool {
        if self.status == CertificateStatus::Revoked {
            return false;
        }
        self.status = CertificateStatus::Revoked;
        self.header.touch();
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationToken {
    pub public_id: Uuid,
    pub certificate_id: Uuid,
    pub checksum: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl VerificationToken {
    /// The public id is random and carries no relation to the certificate id.
    pub fn issue(certificate_id: Uuid, checksum: &str, expires_at: Option<OffsetDateTime>) -> Self {
        Self {
            public_id: Uuid::new_v4(),
            certificate_id,
            checksum: checksum.to_string(),
            expires_at,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CertificateJob {
    #[serde(flatten)]
    pub header: RecordHeader,
    pub tenant_id: Uuid,
    pub template_id: Uuid,
    pub request_data: DataMap,
    pub status: JobStatus,
    pub certificate_id: Option<Uuid>,
    pub requested_by: String,
    pub error_message: Option<String>,
}

impl CertificateJob {
    pub fn pending(
        tenant_id: Uuid,
        template_id: Uuid,
        request_data: DataMap,
        requested_by: &str,
    ) -> Self {
        Self {
            header: RecordHeader::new(),
            tenant_id,
            template_id,
            request_data,
            status: JobStatus::Pending,
            certificate_id: None,
            requested_by: requested_by.to_string(),
            error_message: None,
        }
    }
}
