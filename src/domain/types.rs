//! Shared domain enumerations aligned with persisted status columns.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertificateStatus {
    Generated,
    Revoked,
}

impl CertificateStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CertificateStatus::Generated => "GENERATED",
            CertificateStatus::Revoked => "REVOKED",
        }
    }
}

impl TryFrom<&str> for CertificateStatus {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "GENERATED" => Ok(CertificateStatus::Generated),
            "REVOKED" => Ok(CertificateStatus::Revoked),
            _ => Err(()),
        }
    }
}

/// Lifecycle of a queued generation request.
///
/// `Pending` is the only initial state. `Completed` and `Failed` are terminal:
/// nothing moves a job out of them, and a failed job is retried only by
/// submitting a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl TryFrom<&str> for JobStatus {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "PENDING" => Ok(JobStatus::Pending),
            "PROCESSING" => Ok(JobStatus::Processing),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_status_terminality() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn statuses_parse_their_column_values() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::try_from(status.as_str()), Ok(status));
        }
        assert_eq!(
            CertificateStatus::try_from("REVOKED"),
            Ok(CertificateStatus::Revoked)
        );
        assert!(CertificateStatus::try_from("generated").is_err());
    }

    #[test]
    fn statuses_serialize_as_upper_case() {
        let json = serde_json::to_string(&JobStatus::Processing).expect("serialize status");
        assert_eq!(json, "\"PROCESSING\"");
    }
}
