use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::application::certificates::CertificateView;

use super::context::CallerContext;
use super::error::ApiError;
use super::models::{CertificateJobResponse, GenerateCertificateRequest, RevokeCertificateRequest};
use super::pdf_response;
use super::state::ApiState;

pub async fn list_certificates(
    State(state): State<ApiState>,
    caller: CallerContext,
) -> Result<Json<Vec<CertificateView>>, ApiError> {
    let certificates = state.certificates.list_for_tenant(&caller.tenant).await?;
    Ok(Json(certificates))
}

pub async fn get_certificate(
    State(state): State<ApiState>,
    caller: CallerContext,
    Path(id): Path<Uuid>,
) -> Result<Json<CertificateView>, ApiError> {
    let certificate = state.certificates.get_for_tenant(&caller.tenant, id).await?;
    Ok(Json(certificate))
}

pub async fn generate_certificate(
    State(state): State<ApiState>,
    caller: CallerContext,
    Json(payload): Json<GenerateCertificateRequest>,
) -> Result<Json<CertificateView>, ApiError> {
    let certificate = state
        .certificates
        .generate(
            &caller.tenant,
            payload.template_id,
            payload.data,
            &caller.principal,
        )
        .await?;
    Ok(Json(certificate))
}

pub async fn simulate_certificate(
    State(state): State<ApiState>,
    caller: CallerContext,
    Json(payload): Json<GenerateCertificateRequest>,
) -> Result<Response, ApiError> {
    let pdf = state
        .certificates
        .simulate(&caller.tenant, payload.template_id, payload.data)
        .await?;
    Ok(pdf_response(
        pdf,
        "inline; filename=certificate-preview.pdf".to_string(),
    ))
}

pub async fn submit_certificate_job(
    State(state): State<ApiState>,
    caller: CallerContext,
    Json(payload): Json<GenerateCertificateRequest>,
) -> Result<Response, ApiError> {
    let job = state
        .jobs
        .submit(
            &caller.tenant,
            payload.template_id,
            payload.data,
            &caller.principal,
        )
        .await?;
    Ok((StatusCode::ACCEPTED, Json(CertificateJobResponse::from(job))).into_response())
}

pub async fn get_certificate_job(
    State(state): State<ApiState>,
    caller: CallerContext,
    Path(id): Path<Uuid>,
) -> Result<Json<CertificateJobResponse>, ApiError> {
    let job = state.jobs.get_job(&caller.tenant, id).await?;
    Ok(Json(CertificateJobResponse::from(job)))
}

/// The body is optional; an empty body revokes without a reason.
pub async fn revoke_certificate(
    State(state): State<ApiState>,
    caller: CallerContext,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<CertificateView>, ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        RevokeCertificateRequest::default()
    } else {
        serde_json::from_slice::<RevokeCertificateRequest>(&body).map_err(|err| {
            ApiError::bad_request("Invalid revoke request", Some(err.to_string()))
        })?
    };

    let certificate = state
        .certificates
        .revoke(&caller.tenant, id, request.reason.as_deref())
        .await?;
    Ok(Json(certificate))
}

pub async fn download_certificate(
    State(state): State<ApiState>,
    caller: CallerContext,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let pdf = state.certificates.download(&caller.tenant, id).await?;
    Ok(pdf_response(
        pdf,
        format!("attachment; filename=certificate-{id}.pdf"),
    ))
}
