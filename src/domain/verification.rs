//! Verdict rules for public certificate verification.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::entities::{Certificate, VerificationToken};
use super::types::CertificateStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationReason {
    Ok,
    HashMismatch,
    Revoked,
    InvalidStatus,
}

impl VerificationReason {
    pub fn as_str(self) -> &'static str {
        match self {
            VerificationReason::Ok => "OK",
            VerificationReason::HashMismatch => "HASH_MISMATCH",
            VerificationReason::Revoked => "REVOKED",
            VerificationReason::InvalidStatus => "INVALID_STATUS",
        }
    }
}

/// Public verification result. Carries no tenant, storage or payload data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub valid: bool,
    pub reason: VerificationReason,
    pub certificate_id: Uuid,
    pub template_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,
}

/// Checks run in order; a checksum divergence outranks any status explanation.
pub fn evaluate(certificate: &Certificate, token: &VerificationToken) -> VerificationReason {
    if certificate.hash != token.checksum {
        return VerificationReason::HashMismatch;
    }
    match certificate.status {
        CertificateStatus::Revoked => VerificationReason::Revoked,
        CertificateStatus::Generated if certificate.is_finalized() => VerificationReason::Ok,
        CertificateStatus::Generated => VerificationReason::InvalidStatus,
    }
}

pub fn verdict(certificate: &Certificate, token: &VerificationToken) -> Verdict {
    let reason = evaluate(certificate, token);
    Verdict {
        valid: reason == VerificationReason::Ok,
        reason,
        certificate_id: certificate.header.id,
        template_id: certificate.template_id,
        issued_at: certificate.header.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{DataMap, PENDING_MARKER};

    fn issued(hash: &str) -> (Certificate, VerificationToken) {
        let mut certificate =
            Certificate::pending(Uuid::new_v4(), Uuid::new_v4(), DataMap::new(), "ada");
        certificate
            .finalize(hash.to_string(), "t/c.pdf".to_string(), DataMap::new())
            .expect("finalize");
        let token = VerificationToken::issue(certificate.header.id, hash, None);
        (certificate, token)
    }

    #[test]
    fn matching_generated_certificate_is_valid() {
        let (certificate, token) = issued("h1");
        let verdict = verdict(&certificate, &token);
        assert!(verdict.valid);
        assert_eq!(verdict.reason, VerificationReason::Ok);
        assert_eq!(verdict.certificate_id, certificate.header.id);
    }

    #[test]
    fn revoked_certificate_is_invalid() {
        let (mut certificate, token) = issued("h1");
        certificate.revoke();
        let verdict = verdict(&certificate, &token);
        assert!(!verdict.valid);
        assert_eq!(verdict.reason, VerificationReason::Revoked);
    }

    #[test]
    fn hash_mismatch_outranks_revocation() {
        let (mut certificate, token) = issued("h1");
        certificate.revoke();
        certificate.hash = "tampered".to_string();
        assert_eq!(
            evaluate(&certificate, &token),
            VerificationReason::HashMismatch
        );
    }

    #[test]
    fn unfinalized_certificate_reports_invalid_status() {
        let certificate =
            Certificate::pending(Uuid::new_v4(), Uuid::new_v4(), DataMap::new(), "ada");
        let token = VerificationToken::issue(certificate.header.id, PENDING_MARKER, None);
        assert_eq!(
            evaluate(&certificate, &token),
            VerificationReason::InvalidStatus
        );
    }

    #[test]
    fn verdict_serializes_public_fields_only() {
        let (certificate, token) = issued("h1");
        let json = serde_json::to_value(verdict(&certificate, &token)).expect("serialize");
        let object = json.as_object().expect("object");
        let mut keys: Vec<_> = object.keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            ["certificateId", "issuedAt", "reason", "templateId", "valid"]
        );
        assert_eq!(object["reason"], "OK");
    }
}
