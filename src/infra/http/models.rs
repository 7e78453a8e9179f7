use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{CertificateJob, DataMap};
use crate::domain::types::JobStatus;

#[derive(Debug, Deserialize, Serialize)]
pub struct GenerateCertificateRequest {
    pub template_id: Uuid,
    #[serde(default)]
    pub data: DataMap,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TemplatePreviewRequest {
    #[serde(default)]
    pub data: DataMap,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RevokeCertificateRequest {
    pub reason: Option<String>,
}

/// Job status as reported to the submitting tenant; the request payload stays internal.
#[derive(Debug, Serialize)]
pub struct CertificateJobResponse {
    pub id: Uuid,
    pub template_id: Uuid,
    pub status: JobStatus,
    pub certificate_id: Option<Uuid>,
    pub error_message: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<CertificateJob> for CertificateJobResponse {
    fn from(job: CertificateJob) -> Self {
        Self {
            id: job.header.id,
            template_id: job.template_id,
            status: job.status,
            certificate_id: job.certificate_id,
            error_message: job.error_message,
            created_at: job.header.created_at,
            updated_at: job.header.updated_at,
        }
    }
}
