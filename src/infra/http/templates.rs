use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::domain::entities::{CertificateTemplate, TemplateContent};

use super::context::CallerContext;
use super::error::ApiError;
use super::models::TemplatePreviewRequest;
use super::pdf_response;
use super::state::ApiState;

pub async fn list_templates(
    State(state): State<ApiState>,
    caller: CallerContext,
) -> Result<Json<Vec<CertificateTemplate>>, ApiError> {
    let templates = state.templates.list(&caller.tenant).await?;
    Ok(Json(templates))
}

pub async fn get_template(
    State(state): State<ApiState>,
    caller: CallerContext,
    Path(id): Path<Uuid>,
) -> Result<Json<CertificateTemplate>, ApiError> {
    let template = state.templates.get(&caller.tenant, id).await?;
    Ok(Json(template))
}

pub async fn create_template(
    State(state): State<ApiState>,
    caller: CallerContext,
    Json(payload): Json<TemplateContent>,
) -> Result<Response, ApiError> {
    let template = state.templates.create(&caller.tenant, payload).await?;
    Ok((StatusCode::CREATED, Json(template)).into_response())
}

pub async fn update_template(
    State(state): State<ApiState>,
    caller: CallerContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<TemplateContent>,
) -> Result<Json<CertificateTemplate>, ApiError> {
    let template = state.templates.update(&caller.tenant, id, payload).await?;
    Ok(Json(template))
}

pub async fn deactivate_template(
    State(state): State<ApiState>,
    caller: CallerContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.templates.deactivate(&caller.tenant, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn preview_template(
    State(state): State<ApiState>,
    caller: CallerContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<TemplatePreviewRequest>,
) -> Result<Response, ApiError> {
    let pdf = state
        .templates
        .preview(&caller.tenant, id, &payload.data)
        .await?;
    Ok(pdf_response(pdf, "inline; filename=preview.pdf".to_string()))
}
