use async_trait::async_trait;
use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{CertificateJobsRepo, RepoError};
use crate::domain::entities::{CertificateJob, DataMap, RecordHeader};

use super::util::parse_job_status;
use super::{PostgresRepositories, map_sqlx_error};

const JOB_COLUMNS: &str = "id, tenant_id, template_id, request_data, status, certificate_id, \
     requested_by, error_message, created_at, updated_at";

/// Claims the oldest PENDING rows, skipping rows another claimer holds locked.
const CLAIM_PENDING_SQL: &str = r#"
    UPDATE certificate_jobs
    SET status = 'PROCESSING', updated_at = now()
    WHERE status = 'PENDING'
      AND id IN (
        SELECT id
        FROM certificate_jobs
        WHERE status = 'PENDING'
        ORDER BY created_at, id
        LIMIT $1
        FOR UPDATE SKIP LOCKED
      )
    RETURNING id, created_at
"#;

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    tenant_id: Uuid,
    template_id: Uuid,
    request_data: Json<DataMap>,
    status: String,
    certificate_id: Option<Uuid>,
    requested_by: String,
    error_message: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<JobRow> for CertificateJob {
    type Error = RepoError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(CertificateJob {
            header: RecordHeader {
                id: row.id,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            tenant_id: row.tenant_id,
            template_id: row.template_id,
            request_data: row.request_data.0,
            status: parse_job_status(&row.status)?,
            certificate_id: row.certificate_id,
            requested_by: row.requested_by,
            error_message: row.error_message,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ClaimedRow {
    id: Uuid,
    created_at: OffsetDateTime,
}

#[async_trait]
impl CertificateJobsRepo for PostgresRepositories {
    async fn insert_job(&self, job: &CertificateJob) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO certificate_jobs
                (id, tenant_id, template_id, request_data, status, certificate_id, requested_by,
                 error_message, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(job.header.id)
        .bind(job.tenant_id)
        .bind(job.template_id)
        .bind(Json(&job.request_data))
        .bind(job.status.as_str())
        .bind(job.certificate_id)
        .bind(&job.requested_by)
        .bind(&job.error_message)
        .bind(job.header.created_at)
        .bind(job.header.updated_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_job(&self, id: Uuid) -> Result<Option<CertificateJob>, RepoError> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM certificate_jobs WHERE id = $1");
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(CertificateJob::try_from).transpose()
    }

    async fn find_job_for_tenant(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<CertificateJob>, RepoError> {
        let sql =
            format!("SELECT {JOB_COLUMNS} FROM certificate_jobs WHERE id = $1 AND tenant_id = $2");
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(CertificateJob::try_from).transpose()
    }

    async fn claim_pending(&self, limit: u32) -> Result<Vec<Uuid>, RepoError> {
        let mut rows = sqlx::query_as::<_, ClaimedRow>(CLAIM_PENDING_SQL)
            .bind(i64::from(limit))
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        // RETURNING does not preserve the subquery order.
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(rows.into_iter().map(|row| row.id).collect())
    }

    async fn complete_job(&self, id: Uuid, certificate_id: Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE certificate_jobs
            SET status = 'COMPLETED', certificate_id = $2, error_message = NULL, updated_at = now()
            WHERE id = $1 AND status = 'PROCESSING'
            "#,
        )
        .bind(id)
        .bind(certificate_id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn fail_job(&self, id: Uuid, error_message: &str) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE certificate_jobs
            SET status = 'FAILED', error_message = $2, updated_at = now()
            WHERE id = $1 AND status = 'PROCESSING'
            "#,
        )
        .bind(id)
        .bind(error_message)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }
}
