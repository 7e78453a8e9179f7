//! HTTP transport. Authentication happens upstream; see [`context::CallerContext`].

mod certificates;
pub mod context;
pub mod error;
mod middleware;
pub mod models;
mod public;
mod state;
mod templates;

pub use context::CallerContext;
pub use error::ApiError;
pub use state::ApiState;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{StatusCode, header},
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::application::error::ErrorReport;
use crate::application::repos::RepoError;

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/public/verify/{public_id}", get(public::verify_certificate))
        .route(
            "/api/v1/templates",
            get(templates::list_templates).post(templates::create_template),
        )
        .route(
            "/api/v1/templates/{id}",
            get(templates::get_template)
                .put(templates::update_template)
                .delete(templates::deactivate_template),
        )
        .route(
            "/api/v1/templates/{id}/preview",
            post(templates::preview_template),
        )
        .route(
            "/api/v1/certificates",
            get(certificates::list_certificates).post(certificates::generate_certificate),
        )
        .route(
            "/api/v1/certificates/simulate",
            post(certificates::simulate_certificate),
        )
        .route(
            "/api/v1/certificates/async",
            post(certificates::submit_certificate_job),
        )
        .route(
            "/api/v1/certificates/jobs/{id}",
            get(certificates::get_certificate_job),
        )
        .route(
            "/api/v1/certificates/{id}",
            get(certificates::get_certificate),
        )
        .route(
            "/api/v1/certificates/{id}/revoke",
            post(certificates::revoke_certificate),
        )
        .route(
            "/api/v1/certificates/{id}/download",
            get(certificates::download_certificate),
        )
        .route("/_health/db", get(db_health))
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}

async fn db_health(State(state): State<ApiState>) -> Response {
    db_health_response(state.health.ping().await)
}

fn db_health_response(result: Result<(), RepoError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

fn pdf_response(body: impl Into<Body>, disposition: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body.into(),
    )
        .into_response()
}
