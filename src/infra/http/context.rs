//! Caller identity supplied by the upstream gateway.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::domain::tenant::TenantContext;

use super::error::ApiError;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const PRINCIPAL_HEADER: &str = "x-principal";
pub const UNKNOWN_PRINCIPAL: &str = "unknown";

/// Tenant binding and principal for one request.
///
/// A missing tenant header yields an unbound context; the services reject it.
#[derive(Debug, Clone)]
pub struct CallerContext {
    pub tenant: TenantContext,
    pub principal: String,
}

impl<S> FromRequestParts<S> for CallerContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant = match parts.headers.get(TENANT_HEADER) {
            None => TenantContext::unbound(),
            Some(value) => {
                let raw = value
                    .to_str()
                    .map_err(|_| ApiError::bad_request("Invalid tenant header", None))?;
                let tenant_id = Uuid::parse_str(raw.trim()).map_err(|err| {
                    ApiError::bad_request("Invalid tenant header", Some(err.to_string()))
                })?;
                TenantContext::for_tenant(tenant_id)
            }
        };

        let principal = parts
            .headers
            .get(PRINCIPAL_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(UNKNOWN_PRINCIPAL)
            .to_string();

        Ok(Self { tenant, principal })
    }
}
