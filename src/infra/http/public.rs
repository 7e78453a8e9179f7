use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::application::error::ServiceError;

use super::error::ApiError;
use super::state::ApiState;

/// Unauthenticated verdict lookup. Unknown or malformed ids get an empty 404.
pub async fn verify_certificate(
    State(state): State<ApiState>,
    Path(public_id): Path<String>,
) -> Result<Response, ApiError> {
    let Ok(public_id) = Uuid::parse_str(public_id.trim()) else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };

    match state.verification.verify(public_id).await {
        Ok(verdict) => Ok(Json(verdict).into_response()),
        Err(ServiceError::NotFound { .. }) => Ok(StatusCode::NOT_FOUND.into_response()),
        Err(err) => Err(err.into()),
    }
}
