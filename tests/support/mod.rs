//! In-memory adapters shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tempfile::TempDir;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use certify::application::certificates::CertificatePipeline;
use certify::application::jobs::{CertificateJobQueue, JobQueueSettings};
use certify::application::rendering::{ContentRenderer, EncodeError, ImageEncoder, RenderError};
use certify::application::repos::{
    CertificateJobsRepo, CertificatesRepo, FinalizeIssuanceParams, HealthCheck, IssuanceUnit,
    RepoError, TemplatesRepo, VerificationTokensRepo,
};
use certify::application::services::{Collaborators, ServiceOptions, Services};
use certify::application::storage::BlobStore;
use certify::application::templates::TemplateService;
use certify::application::verification::VerificationService;
use certify::domain::entities::{
    Certificate, CertificateJob, CertificateTemplate, DataMap, PlaceholderDefinition,
    TemplateContent, VerificationToken,
};
use certify::domain::tenant::TenantContext;
use certify::domain::types::{CertificateStatus, JobStatus};
use certify::infra::http::ApiState;
use certify::infra::storage::FileBlobStore;

pub const BASE_URL: &str = "https://certs.example.test/public/verify";
pub const QR_SIZE: u32 = 200;

#[derive(Default)]
struct StoreState {
    templates: HashMap<Uuid, CertificateTemplate>,
    certificates: HashMap<Uuid, Certificate>,
    tokens: HashMap<Uuid, VerificationToken>,
    jobs: HashMap<Uuid, CertificateJob>,
}

/// Every repository over one shared map set; issuance units stage writes until commit.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
    fail_finalize: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn fail_next_finalize(&self) {
        self.fail_finalize.store(true, Ordering::SeqCst);
    }

    pub async fn certificate(&self, id: Uuid) -> Option<Certificate> {
        self.state.lock().await.certificates.get(&id).cloned()
    }

    pub async fn certificate_count(&self) -> usize {
        self.state.lock().await.certificates.len()
    }

    pub async fn token_count(&self) -> usize {
        self.state.lock().await.tokens.len()
    }

    pub async fn token_for(&self, certificate_id: Uuid) -> Option<VerificationToken> {
        self.state
            .lock()
            .await
            .tokens
            .values()
            .find(|token| token.certificate_id == certificate_id)
            .cloned()
    }

    pub async fn job(&self, id: Uuid) -> Option<CertificateJob> {
        self.state.lock().await.jobs.get(&id).cloned()
    }

    /// Overwrite the stored hash, as an attacker with database access would.
    pub async fn tamper_hash(&self, certificate_id: Uuid, hash: &str) {
        if let Some(certificate) = self.state.lock().await.certificates.get_mut(&certificate_id) {
            certificate.hash = hash.to_string();
        }
    }

    pub async fn set_job_status(&self, id: Uuid, status: JobStatus) {
        if let Some(job) = self.state.lock().await.jobs.get_mut(&id) {
            job.status = status;
        }
    }
}

#[async_trait]
impl TemplatesRepo for MemoryStore {
    async fn list_templates(&self, tenant_id: Uuid) -> Result<Vec<CertificateTemplate>, RepoError> {
        let state = self.state.lock().await;
        let mut templates: Vec<_> = state
            .templates
            .values()
            .filter(|template| template.tenant_id == tenant_id)
            .cloned()
            .collect();
        templates.sort_by_key(|template| (template.header.created_at, template.header.id));
        Ok(templates)
    }

    async fn find_template(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<CertificateTemplate>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .templates
            .get(&id)
            .filter(|template| template.tenant_id == tenant_id)
            .cloned())
    }

    async fn insert_template(&self, template: &CertificateTemplate) -> Result<(), RepoError> {
        self.state
            .lock()
            .await
            .templates
            .insert(template.header.id, template.clone());
        Ok(())
    }

    async fn update_template(&self, template: &CertificateTemplate) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        match state.templates.get_mut(&template.header.id) {
            Some(existing) if existing.tenant_id == template.tenant_id => {
                *existing = template.clone();
                Ok(())
            }
            _ => Err(RepoError::NotFound),
        }
    }
}

struct MemoryIssuanceUnit {
    state: Arc<Mutex<StoreState>>,
    fail_finalize: Arc<AtomicBool>,
    certificates: Vec<Certificate>,
    tokens: Vec<VerificationToken>,
}

#[async_trait]
impl IssuanceUnit for MemoryIssuanceUnit {
    async fn insert_certificate(&mut self, certificate: &Certificate) -> Result<(), RepoError> {
        self.certificates.push(certificate.clone());
        Ok(())
    }

    async fn insert_token(&mut self, token: &VerificationToken) -> Result<(), RepoError> {
        if self
            .tokens
            .iter()
            .any(|staged| staged.certificate_id == token.certificate_id)
        {
            return Err(RepoError::Duplicate {
                constraint: "verification_tokens_certificate_id_key".to_string(),
            });
        }
        self.tokens.push(token.clone());
        Ok(())
    }

    async fn finalize(&mut self, params: FinalizeIssuanceParams) -> Result<(), RepoError> {
        if self.fail_finalize.swap(false, Ordering::SeqCst) {
            return Err(RepoError::from_persistence("connection reset during finalize"));
        }
        let certificate = self
            .certificates
            .iter_mut()
            .find(|certificate| certificate.header.id == params.certificate_id)
            .ok_or_else(|| RepoError::integrity("certificate row missing from issuance"))?;
        certificate.hash = params.hash.clone();
        certificate.storage_path = params.storage_path;
        certificate.data = params.data;

        let token = self
            .tokens
            .iter_mut()
            .find(|token| token.certificate_id == params.certificate_id)
            .ok_or_else(|| RepoError::integrity("verification token missing from issuance"))?;
        token.checksum = params.hash;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        for certificate in self.certificates {
            state.certificates.insert(certificate.header.id, certificate);
        }
        for token in self.tokens {
            state.tokens.insert(token.public_id, token);
        }
        Ok(())
    }
}

#[async_trait]
impl CertificatesRepo for MemoryStore {
    async fn list_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<Certificate>, RepoError> {
        let state = self.state.lock().await;
        let mut certificates: Vec<_> = state
            .certificates
            .values()
            .filter(|certificate| certificate.tenant_id == tenant_id)
            .cloned()
            .collect();
        certificates.sort_by_key(|certificate| (certificate.header.created_at, certificate.header.id));
        Ok(certificates)
    }

    async fn find_for_tenant(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Certificate>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .certificates
            .get(&id)
            .filter(|certificate| certificate.tenant_id == tenant_id)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Certificate>, RepoError> {
        Ok(self.state.lock().await.certificates.get(&id).cloned())
    }

    async fn update_status(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        status: CertificateStatus,
    ) -> Result<bool, RepoError> {
        let mut state = self.state.lock().await;
        match state.certificates.get_mut(&id) {
            Some(certificate) if certificate.tenant_id == tenant_id => {
                certificate.status = status;
                certificate.header.updated_at = OffsetDateTime::now_utc();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn begin_issuance(&self) -> Result<Box<dyn IssuanceUnit>, RepoError> {
        Ok(Box::new(MemoryIssuanceUnit {
            state: self.state.clone(),
            fail_finalize: self.fail_finalize.clone(),
            certificates: Vec::new(),
            tokens: Vec::new(),
        }))
    }
}

#[async_trait]
impl VerificationTokensRepo for MemoryStore {
    async fn find_by_public_id(
        &self,
        public_id: Uuid,
    ) -> Result<Option<VerificationToken>, RepoError> {
        Ok(self.state.lock().await.tokens.get(&public_id).cloned())
    }

    async fn find_by_certificate(
        &self,
        certificate_id: Uuid,
    ) -> Result<Option<VerificationToken>, RepoError> {
        Ok(self.token_for(certificate_id).await)
    }
}

#[async_trait]
impl CertificateJobsRepo for MemoryStore {
    async fn insert_job(&self, job: &CertificateJob) -> Result<(), RepoError> {
        self.state.lock().await.jobs.insert(job.header.id, job.clone());
        Ok(())
    }

    async fn find_job(&self, id: Uuid) -> Result<Option<CertificateJob>, RepoError> {
        Ok(self.job(id).await)
    }

    async fn find_job_for_tenant(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<CertificateJob>, RepoError> {
        Ok(self.job(id).await.filter(|job| job.tenant_id == tenant_id))
    }

    async fn claim_pending(&self, limit: u32) -> Result<Vec<Uuid>, RepoError> {
        let mut state = self.state.lock().await;
        let mut pending: Vec<_> = state
            .jobs
            .values()
            .filter(|job| job.status == JobStatus::Pending)
            .map(|job| (job.header.created_at, job.header.id))
            .collect();
        pending.sort();
        pending.truncate(limit as usize);

        let now = OffsetDateTime::now_utc();
        let mut claimed = Vec::with_capacity(pending.len());
        for (_, id) in pending {
            if let Some(job) = state.jobs.get_mut(&id) {
                job.status = JobStatus::Processing;
                job.header.updated_at = now;
                claimed.push(id);
            }
        }
        Ok(claimed)
    }

    async fn complete_job(&self, id: Uuid, certificate_id: Uuid) -> Result<bool, RepoError> {
        let mut state = self.state.lock().await;
        match state.jobs.get_mut(&id) {
            Some(job) if job.status == JobStatus::Processing => {
                job.status = JobStatus::Completed;
                job.certificate_id = Some(certificate_id);
                job.error_message = None;
                job.header.updated_at = OffsetDateTime::now_utc();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn fail_job(&self, id: Uuid, error_message: &str) -> Result<bool, RepoError> {
        let mut state = self.state.lock().await;
        match state.jobs.get_mut(&id) {
            Some(job) if job.status == JobStatus::Processing => {
                job.status = JobStatus::Failed;
                job.error_message = Some(error_message.to_string());
                job.header.updated_at = OffsetDateTime::now_utc();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl HealthCheck for MemoryStore {
    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

/// Emits the substituted markup verbatim so tests can inspect what was rendered.
#[derive(Debug, Default)]
pub struct EchoRenderer;

impl ContentRenderer for EchoRenderer {
    fn render(&self, html: &str) -> Result<Vec<u8>, RenderError> {
        let mut bytes = b"%PDF-echo\n".to_vec();
        bytes.extend_from_slice(html.as_bytes());
        Ok(bytes)
    }
}

/// Fails whenever the markup contains `fail`.
#[derive(Debug, Default)]
pub struct PickyRenderer;

impl ContentRenderer for PickyRenderer {
    fn render(&self, html: &str) -> Result<Vec<u8>, RenderError> {
        if html.contains("fail") {
            return Err(RenderError::markup("refusing to render `fail`"));
        }
        EchoRenderer.render(html)
    }
}

/// Sleeps before echoing, so a job stays in flight long enough to observe.
#[derive(Debug)]
pub struct SlowRenderer(pub Duration);

impl ContentRenderer for SlowRenderer {
    fn render(&self, html: &str) -> Result<Vec<u8>, RenderError> {
        std::thread::sleep(self.0);
        EchoRenderer.render(html)
    }
}

/// Stands in for a QR image: `qr:<url>` keeps the encoded URL readable.
#[derive(Debug, Default)]
pub struct UrlEchoEncoder;

impl ImageEncoder for UrlEchoEncoder {
    fn encode(&self, url: &str, size: u32) -> Result<String, EncodeError> {
        if size == 0 {
            return Err(EncodeError::InvalidSize { size });
        }
        Ok(format!("qr:{url}"))
    }
}

pub struct Harness {
    pub store: MemoryStore,
    pub blobs: Arc<FileBlobStore>,
    pub templates: Arc<TemplateService>,
    pub pipeline: Arc<CertificatePipeline>,
    pub queue: Arc<CertificateJobQueue>,
    pub verification: Arc<VerificationService>,
    _storage: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(Arc::new(EchoRenderer), JobQueueSettings::default())
    }

    pub fn with_renderer(renderer: Arc<dyn ContentRenderer>) -> Self {
        Self::build(renderer, JobQueueSettings::default())
    }

    pub fn build(renderer: Arc<dyn ContentRenderer>, settings: JobQueueSettings) -> Self {
        let store = MemoryStore::default();
        Self::assemble(store.clone(), store, renderer, settings)
    }

    /// Request services on `store`, job executions on `job_store`.
    pub fn split(store: MemoryStore, job_store: MemoryStore) -> Self {
        Self::assemble(
            store,
            job_store,
            Arc::new(EchoRenderer),
            JobQueueSettings::default(),
        )
    }

    fn assemble(
        store: MemoryStore,
        job_store: MemoryStore,
        renderer: Arc<dyn ContentRenderer>,
        settings: JobQueueSettings,
    ) -> Self {
        let storage = tempfile::tempdir().expect("temp storage dir");
        let blobs = Arc::new(FileBlobStore::new(storage.path().to_path_buf()).expect("blob store"));

        let services = Services::build(
            Arc::new(store.clone()),
            Arc::new(job_store),
            Collaborators {
                renderer,
                encoder: Arc::new(UrlEchoEncoder),
                blobs: blobs.clone() as Arc<dyn BlobStore>,
            },
            ServiceOptions {
                verification_base_url: BASE_URL.to_string(),
                qr_size: QR_SIZE,
                jobs: settings,
            },
        );

        Self {
            templates: services.templates,
            verification: services.verification,
            pipeline: services.certificates,
            queue: services.jobs,
            store,
            blobs,
            _storage: storage,
        }
    }

    pub fn api_state(&self) -> ApiState {
        ApiState {
            templates: self.templates.clone(),
            certificates: self.pipeline.clone(),
            jobs: self.queue.clone(),
            verification: self.verification.clone(),
            health: Arc::new(self.store.clone()),
        }
    }

    pub async fn seed_template(&self, tenant_id: Uuid, html: &str) -> CertificateTemplate {
        self.templates
            .create(&TenantContext::for_tenant(tenant_id), template_content(html))
            .await
            .expect("seed template")
    }

    pub async fn stored_pdf(&self, certificate: &Certificate) -> Vec<u8> {
        self.blobs
            .load(&certificate.storage_path)
            .await
            .expect("stored pdf")
            .to_vec()
    }
}

pub fn template_content(html: &str) -> TemplateContent {
    TemplateContent {
        name: "Course completion".to_string(),
        description: Some("Awarded on completing a course".to_string()),
        html_template: html.to_string(),
        placeholders: vec![PlaceholderDefinition {
            key: "name".to_string(),
            label: "Recipient".to_string(),
            kind: "text".to_string(),
            required: true,
        }],
    }
}

pub fn data(pairs: &[(&str, &str)]) -> DataMap {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
        .collect()
}

pub fn context(tenant_id: Uuid) -> TenantContext {
    TenantContext::for_tenant(tenant_id)
}
