use std::sync::Arc;

use futures::{StreamExt, stream};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::certificates::CertificatePipeline;
use crate::application::error::ServiceError;
use crate::application::repos::CertificateJobsRepo;
use crate::domain::entities::{CertificateJob, DataMap};
use crate::domain::tenant::TenantContext;
use crate::domain::types::JobStatus;

/// Upper bound on jobs moved to PROCESSING by one claim.
pub const MAX_BATCH_SIZE: u32 = 50;

#[derive(Debug, Clone, Copy)]
pub struct JobQueueSettings {
    pub batch_size: u32,
    pub error_message_limit: usize,
}

impl Default for JobQueueSettings {
    fn default() -> Self {
        Self {
            batch_size: MAX_BATCH_SIZE,
            error_message_limit: 500,
        }
    }
}

/// Result of executing one claimed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { certificate_id: Uuid },
    Failed,
    /// The job vanished or was no longer PROCESSING when re-read.
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub claimed: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errored: usize,
}

/// Durable claim-based queue of certificate generation requests.
pub struct CertificateJobQueue {
    jobs: Arc<dyn CertificateJobsRepo>,
    pipeline: Arc<CertificatePipeline>,
    settings: JobQueueSettings,
}

impl CertificateJobQueue {
    pub fn new(
        jobs: Arc<dyn CertificateJobsRepo>,
        pipeline: Arc<CertificatePipeline>,
        settings: JobQueueSettings,
    ) -> Self {
        Self {
            jobs,
            pipeline,
            settings,
        }
    }

    pub fn batch_size(&self) -> u32 {
        self.settings.batch_size.clamp(1, MAX_BATCH_SIZE)
    }

    pub async fn submit(
        &self,
        ctx: &TenantContext,
        template_id: Uuid,
        request_data: DataMap,
        requested_by: &str,
    ) -> Result<CertificateJob, ServiceError> {
        let tenant_id = ctx.require()?;
        let job = CertificateJob::pending(tenant_id, template_id, request_data, requested_by);
        self.jobs.insert_job(&job).await?;

        info!(
            target = "certify::application::jobs",
            job_id = %job.header.id,
            tenant_id = %tenant_id,
            template_id = %template_id,
            "certificate job submitted"
        );
        Ok(job)
    }

    pub async fn get_job(
        &self,
        ctx: &TenantContext,
        id: Uuid,
    ) -> Result<CertificateJob, ServiceError> {
        let tenant_id = ctx.require()?;
        self.jobs
            .find_job_for_tenant(tenant_id, id)
            .await?
            .ok_or(ServiceError::not_found("job"))
    }

    /// Claim up to `limit` (capped at the configured batch size) oldest PENDING jobs.
    pub async fn claim_batch(&self, limit: u32) -> Result<Vec<Uuid>, ServiceError> {
        let limit = limit.min(self.batch_size());
        if limit == 0 {
            return Ok(Vec::new());
        }

        let claimed = self.jobs.claim_pending(limit).await?;
        if !claimed.is_empty() {
            metrics::counter!("certify_jobs_claimed_total").increment(claimed.len() as u64);
            debug!(
                target = "certify::application::jobs",
                count = claimed.len(),
                "claimed pending jobs"
            );
        }
        Ok(claimed)
    }

    /// Run one claimed job to a terminal state.
    ///
    /// Generation failures become FAILED rows and are not returned as errors;
    /// only a failure to read or write the job row itself is.
    pub async fn execute(&self, job_id: Uuid) -> Result<JobOutcome, ServiceError> {
        let Some(job) = self.jobs.find_job(job_id).await? else {
            warn!(
                target = "certify::application::jobs",
                job_id = %job_id,
                "claimed job disappeared before execution"
            );
            return Ok(JobOutcome::Skipped);
        };

        if job.status != JobStatus::Processing {
            debug!(
                target = "certify::application::jobs",
                job_id = %job_id,
                status = job.status.as_str(),
                "job no longer processing; skipping"
            );
            return Ok(JobOutcome::Skipped);
        }

        let mut ctx = TenantContext::unbound();
        let generated = {
            let bound = ctx.bind(job.tenant_id);
            self.pipeline.process_job(&bound, &job).await
        };

        match generated {
            Ok(view) => {
                let certificate_id = view.certificate.header.id;
                if !self.jobs.complete_job(job_id, certificate_id).await? {
                    warn!(
                        target = "certify::application::jobs",
                        job_id = %job_id,
                        "job left PROCESSING before completion was recorded"
                    );
                    return Ok(JobOutcome::Skipped);
                }
                metrics::counter!("certify_jobs_completed_total").increment(1);
                info!(
                    target = "certify::application::jobs",
                    job_id = %job_id,
                    tenant_id = %job.tenant_id,
                    certificate_id = %certificate_id,
                    "certificate job completed"
                );
                Ok(JobOutcome::Completed { certificate_id })
            }
            Err(err) => {
                let message = truncate_chars(&err.to_string(), self.settings.error_message_limit);
                if !self.jobs.fail_job(job_id, &message).await? {
                    warn!(
                        target = "certify::application::jobs",
                        job_id = %job_id,
                        "job left PROCESSING before failure was recorded"
                    );
                    return Ok(JobOutcome::Skipped);
                }
                metrics::counter!("certify_jobs_failed_total").increment(1);
                warn!(
                    target = "certify::application::jobs",
                    job_id = %job_id,
                    tenant_id = %job.tenant_id,
                    error = %err,
                    "certificate job failed"
                );
                Ok(JobOutcome::Failed)
            }
        }
    }

    /// Claim one batch and run every job in it, at most `concurrency` at a time.
    /// A failing job never stops its siblings.
    pub async fn poll_once(&self, concurrency: usize) -> Result<PollSummary, ServiceError> {
        let claimed = self.claim_batch(self.batch_size()).await?;
        let mut summary = PollSummary {
            claimed: claimed.len(),
            ..PollSummary::default()
        };

        let mut executions = stream::iter(claimed)
            .map(|job_id| async move { (job_id, self.execute(job_id).await) })
            .buffer_unordered(concurrency.max(1));

        while let Some((job_id, result)) = executions.next().await {
            match result {
                Ok(JobOutcome::Completed { .. }) => summary.completed += 1,
                Ok(JobOutcome::Failed) => summary.failed += 1,
                Ok(JobOutcome::Skipped) => summary.skipped += 1,
                Err(err) => {
                    summary.errored += 1;
                    warn!(
                        target = "certify::application::jobs",
                        job_id = %job_id,
                        error = %err,
                        "job execution could not record its outcome"
                    );
                }
            }
        }

        Ok(summary)
    }
}

fn truncate_chars(message: &str, limit: usize) -> String {
    match message.char_indices().nth(limit) {
        Some((index, _)) => message[..index].to_string(),
        None => message.to_string(),
    }
}
