//! Service graph shared by the `serve` and `worker` commands.

use std::sync::Arc;

use crate::application::{
    certificates::CertificatePipeline,
    jobs::{CertificateJobQueue, JobQueueSettings},
    rendering::{ContentRenderer, ImageEncoder},
    repos::{CertificateJobsRepo, CertificatesRepo, TemplatesRepo, VerificationTokensRepo},
    storage::BlobStore,
    templates::TemplateService,
    tokens::TokenRegistry,
    verification::VerificationService,
};

/// Every repository a service graph needs, backed by one connection pool.
pub trait RepositorySet:
    TemplatesRepo + CertificatesRepo + VerificationTokensRepo + CertificateJobsRepo + 'static
{
}

impl<T> RepositorySet for T where
    T: TemplatesRepo + CertificatesRepo + VerificationTokensRepo + CertificateJobsRepo + 'static
{
}

#[derive(Clone)]
pub struct Collaborators {
    pub renderer: Arc<dyn ContentRenderer>,
    pub encoder: Arc<dyn ImageEncoder>,
    pub blobs: Arc<dyn BlobStore>,
}

#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub verification_base_url: String,
    pub qr_size: u32,
    pub jobs: JobQueueSettings,
}

pub struct Services {
    pub templates: Arc<TemplateService>,
    pub certificates: Arc<CertificatePipeline>,
    pub jobs: Arc<CertificateJobQueue>,
    pub verification: Arc<VerificationService>,
}

impl Services {
    /// Request handlers run on `http`. The job queue and the pipeline that
    /// executes claimed jobs run on `jobs`, so an issuance transaction held
    /// open across rendering never occupies an `http` connection.
    pub fn build<H, J>(
        http: Arc<H>,
        jobs: Arc<J>,
        collaborators: Collaborators,
        options: ServiceOptions,
    ) -> Self
    where
        H: RepositorySet,
        J: RepositorySet,
    {
        let tokens = TokenRegistry::new(http.clone(), options.verification_base_url.clone());
        let certificates = Arc::new(pipeline(
            http.clone(),
            tokens.clone(),
            &collaborators,
            &options,
        ));

        let job_tokens = TokenRegistry::new(jobs.clone(), options.verification_base_url.clone());
        let job_pipeline = Arc::new(pipeline(jobs.clone(), job_tokens, &collaborators, &options));
        let queue = Arc::new(CertificateJobQueue::new(jobs, job_pipeline, options.jobs));

        Self {
            templates: Arc::new(TemplateService::new(http, collaborators.renderer)),
            verification: Arc::new(VerificationService::new(tokens, certificates.clone())),
            certificates,
            jobs: queue,
        }
    }
}

fn pipeline<R: RepositorySet>(
    repositories: Arc<R>,
    tokens: TokenRegistry,
    collaborators: &Collaborators,
    options: &ServiceOptions,
) -> CertificatePipeline {
    CertificatePipeline::new(
        repositories.clone(),
        repositories,
        tokens,
        collaborators.renderer.clone(),
        collaborators.encoder.clone(),
        collaborators.blobs.clone(),
        options.qr_size,
    )
}
