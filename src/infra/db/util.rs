use crate::application::repos::RepoError;
use crate::domain::types::{CertificateStatus, JobStatus};

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::Database(db) if db.message().contains("duplicate key") => {
            RepoError::Duplicate {
                constraint: db.constraint().unwrap_or("unknown").to_string(),
            }
        }
        sqlx::Error::Database(db)
            if db.message().contains("violates foreign key constraint")
                || db.message().contains("invalid input syntax") =>
        {
            RepoError::InvalidInput {
                message: db.message().to_string(),
            }
        }
        sqlx::Error::Database(db) if db.message().contains("violates") => RepoError::Integrity {
            message: db.message().to_string(),
        },
        sqlx::Error::Database(db)
            if db
                .message()
                .contains("canceling statement due to user request") =>
        {
            RepoError::Timeout
        }
        other => RepoError::from_persistence(other),
    }
}

pub(super) fn parse_certificate_status(value: &str) -> Result<CertificateStatus, RepoError> {
    CertificateStatus::try_from(value)
        .map_err(|_| RepoError::integrity(format!("unknown certificate status `{value}`")))
}

pub(super) fn parse_job_status(value: &str) -> Result<JobStatus, RepoError> {
    JobStatus::try_from(value).map_err(|_| RepoError::integrity(format!("unknown job status `{value}`")))
}
