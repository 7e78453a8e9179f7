mod support;

use certify::application::error::ServiceError;
use certify::domain::verification::VerificationReason;
use uuid::Uuid;

use support::{BASE_URL, Harness, context, data};

const TEMPLATE: &str = "<p>${name}</p><img src=\"${qrCodeImage}\">";

async fn issue(harness: &Harness, tenant: Uuid) -> (Uuid, Uuid) {
    let template = harness.seed_template(tenant, TEMPLATE).await;
    let view = harness
        .pipeline
        .generate(&context(tenant), template.header.id, data(&[("name", "Ada")]), "registrar")
        .await
        .expect("generate");
    let public_id = view.verification_public_id.expect("public id");
    (view.certificate.header.id, public_id)
}

#[tokio::test]
async fn genuine_certificate_verifies() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();
    let (certificate_id, public_id) = issue(&harness, tenant).await;

    let verdict = harness.verification.verify(public_id).await.expect("verdict");
    assert!(verdict.valid);
    assert_eq!(verdict.reason, VerificationReason::Ok);
    assert_eq!(verdict.certificate_id, certificate_id);
}

#[tokio::test]
async fn revoked_certificate_reports_revoked() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();
    let (certificate_id, public_id) = issue(&harness, tenant).await;

    harness
        .pipeline
        .revoke(&context(tenant), certificate_id, Some("fraud"))
        .await
        .expect("revoke");

    let verdict = harness.verification.verify(public_id).await.expect("verdict");
    assert!(!verdict.valid);
    assert_eq!(verdict.reason, VerificationReason::Revoked);
}

#[tokio::test]
async fn tampered_hash_reports_mismatch_even_when_revoked() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();
    let (certificate_id, public_id) = issue(&harness, tenant).await;

    harness.store.tamper_hash(certificate_id, "0000").await;
    let verdict = harness.verification.verify(public_id).await.expect("verdict");
    assert!(!verdict.valid);
    assert_eq!(verdict.reason, VerificationReason::HashMismatch);

    harness
        .pipeline
        .revoke(&context(tenant), certificate_id, None)
        .await
        .expect("revoke");
    let verdict = harness.verification.verify(public_id).await.expect("verdict");
    assert_eq!(verdict.reason, VerificationReason::HashMismatch);
}

#[tokio::test]
async fn unknown_public_id_is_not_found() {
    let harness = Harness::new();
    let err = harness
        .verification
        .verify(Uuid::new_v4())
        .await
        .expect_err("unknown");
    assert!(matches!(err, ServiceError::NotFound { .. }));
}

#[tokio::test]
async fn certificate_id_is_not_a_verification_handle() {
    let harness = Harness::new();
    let (certificate_id, _) = issue(&harness, Uuid::new_v4()).await;
    let err = harness
        .verification
        .verify(certificate_id)
        .await
        .expect_err("certificate id");
    assert!(matches!(err, ServiceError::NotFound { .. }));
}

#[tokio::test]
async fn simulated_qr_code_never_verifies() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();
    let template = harness.seed_template(tenant, TEMPLATE).await;

    let bytes = harness
        .pipeline
        .simulate(&context(tenant), template.header.id, data(&[("name", "Ada")]))
        .await
        .expect("simulate");
    let rendered = String::from_utf8(bytes).expect("utf8");

    let prefix = format!("qr:{BASE_URL}/");
    let start = rendered.find(&prefix).expect("qr url") + prefix.len();
    let public_id = Uuid::parse_str(&rendered[start..start + 36]).expect("public id");

    let err = harness
        .verification
        .verify(public_id)
        .await
        .expect_err("throwaway id");
    assert!(matches!(err, ServiceError::NotFound { .. }));
}
