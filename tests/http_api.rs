mod support;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use certify::infra::http::build_router;

use support::Harness;

const TEMPLATE: &str = "<p>Awarded to ${name}</p><img src=\"${qrCodeImage}\">";

async fn send(harness: &Harness, request: Request<Body>) -> Response {
    build_router(harness.api_state())
        .oneshot(request)
        .await
        .expect("router response")
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn json_request(method: &str, uri: &str, tenant: Option<Uuid>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(tenant) = tenant {
        builder = builder.header("X-Tenant-Id", tenant.to_string());
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

fn get(uri: &str, tenant: Option<Uuid>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(tenant) = tenant {
        builder = builder.header("X-Tenant-Id", tenant.to_string());
    }
    builder.body(Body::empty()).expect("request")
}

async fn create_template(harness: &Harness, tenant: Uuid) -> String {
    let response = send(
        harness,
        json_request(
            "POST",
            "/api/v1/templates",
            Some(tenant),
            json!({
                "name": "Course completion",
                "html_template": TEMPLATE,
                "placeholders": [{ "key": "name", "label": "Recipient", "type": "text", "required": true }],
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    body["id"].as_str().expect("template id").to_string()
}

async fn generate(harness: &Harness, tenant: Uuid, template_id: &str) -> Value {
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/certificates")
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-Tenant-Id", tenant.to_string())
        .header("X-Principal", "registrar@example.test")
        .body(Body::from(
            json!({ "template_id": template_id, "data": { "name": "Ada" } }).to_string(),
        ))
        .expect("request");
    let response = send(harness, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    json_body(response).await
}

#[tokio::test]
async fn missing_tenant_header_is_unauthorized() {
    let harness = Harness::new();
    let response = send(&harness, get("/api/v1/templates", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "unauthorized");
}

#[tokio::test]
async fn malformed_tenant_header_is_a_bad_request() {
    let harness = Harness::new();
    let request = Request::builder()
        .uri("/api/v1/templates")
        .header("X-Tenant-Id", "tenant-one")
        .body(Body::empty())
        .expect("request");
    let response = send(&harness, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn generated_certificate_verifies_publicly() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();
    let template_id = create_template(&harness, tenant).await;

    let certificate = generate(&harness, tenant, &template_id).await;
    assert_eq!(certificate["status"], "GENERATED");
    assert_eq!(certificate["created_by"], "registrar@example.test");
    let public_id = certificate["verification_public_id"]
        .as_str()
        .expect("public id");
    assert!(
        certificate["verification_url"]
            .as_str()
            .is_some_and(|url| url.ends_with(public_id))
    );

    let response = send(&harness, get(&format!("/public/verify/{public_id}"), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let verdict = json_body(response).await;
    assert_eq!(verdict["valid"], true);
    assert_eq!(verdict["reason"], "OK");
    assert_eq!(verdict["certificateId"], certificate["id"]);
    assert!(verdict.get("tenantId").is_none());
}

#[tokio::test]
async fn unknown_verification_ids_get_an_empty_404() {
    let harness = Harness::new();
    for path in [
        format!("/public/verify/{}", Uuid::new_v4()),
        "/public/verify/not-a-uuid".to_string(),
    ] {
        let response = send(&harness, get(&path, None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        assert!(bytes.is_empty());
    }
}

#[tokio::test]
async fn principal_defaults_to_unknown() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();
    let template_id = create_template(&harness, tenant).await;

    let response = send(
        &harness,
        json_request(
            "POST",
            "/api/v1/certificates",
            Some(tenant),
            json!({ "template_id": template_id, "data": { "name": "Ada" } }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["created_by"], "unknown");
}

#[tokio::test]
async fn download_and_simulate_return_pdf_headers() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();
    let template_id = create_template(&harness, tenant).await;
    let certificate = generate(&harness, tenant, &template_id).await;
    let id = certificate["id"].as_str().expect("id");

    let response = send(
        &harness,
        get(&format!("/api/v1/certificates/{id}/download"), Some(tenant)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        format!("attachment; filename=certificate-{id}.pdf").as_str()
    );

    let response = send(
        &harness,
        json_request(
            "POST",
            "/api/v1/certificates/simulate",
            Some(tenant),
            json!({ "template_id": template_id, "data": { "name": "Ada" } }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "inline; filename=certificate-preview.pdf"
    );
}

#[tokio::test]
async fn revoke_accepts_an_empty_body_and_rejects_garbage() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();
    let template_id = create_template(&harness, tenant).await;
    let certificate = generate(&harness, tenant, &template_id).await;
    let id = certificate["id"].as_str().expect("id");
    let uri = format!("/api/v1/certificates/{id}/revoke");

    let garbage = Request::builder()
        .method("POST")
        .uri(&uri)
        .header("X-Tenant-Id", tenant.to_string())
        .body(Body::from("{not json"))
        .expect("request");
    let response = send(&harness, garbage).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let empty = Request::builder()
        .method("POST")
        .uri(&uri)
        .header("X-Tenant-Id", tenant.to_string())
        .body(Body::empty())
        .expect("request");
    let response = send(&harness, empty).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "REVOKED");

    let public_id = body["verification_public_id"].as_str().expect("public id");
    let verdict = json_body(send(&harness, get(&format!("/public/verify/{public_id}"), None)).await).await;
    assert_eq!(verdict["valid"], false);
    assert_eq!(verdict["reason"], "REVOKED");
}

#[tokio::test]
async fn async_submission_is_tracked_per_tenant() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();
    let template_id = create_template(&harness, tenant).await;

    let response = send(
        &harness,
        json_request(
            "POST",
            "/api/v1/certificates/async",
            Some(tenant),
            json!({ "template_id": template_id, "data": { "name": "Ada" } }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let job = json_body(response).await;
    assert_eq!(job["status"], "PENDING");
    assert!(job.get("request_data").is_none());
    let job_id = job["id"].as_str().expect("job id");

    let response = send(
        &harness,
        get(&format!("/api/v1/certificates/jobs/{job_id}"), Some(tenant)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        &harness,
        get(&format!("/api/v1/certificates/jobs/{job_id}"), Some(Uuid::new_v4())),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn template_delete_deactivates() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();
    let template_id = create_template(&harness, tenant).await;

    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/api/v1/templates/{template_id}"))
        .header("X-Tenant-Id", tenant.to_string())
        .body(Body::empty())
        .expect("request");
    let response = send(&harness, request).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(
        &harness,
        get(&format!("/api/v1/templates/{template_id}"), Some(tenant)),
    )
    .await;
    let body = json_body(response).await;
    assert_eq!(body["active"], false);
}

#[tokio::test]
async fn database_health_reports_no_content() {
    let harness = Harness::new();
    let response = send(&harness, get("/_health/db", None)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
