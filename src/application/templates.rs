use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::application::error::ServiceError;
use crate::application::rendering::{ContentRenderer, render_off_thread};
use crate::application::repos::TemplatesRepo;
use crate::domain::entities::{CertificateTemplate, DataMap, TemplateContent};
use crate::domain::placeholders::apply_placeholders;
use crate::domain::tenant::TenantContext;

/// Tenant-scoped template management.
#[derive(Clone)]
pub struct TemplateService {
    repo: Arc<dyn TemplatesRepo>,
    renderer: Arc<dyn ContentRenderer>,
}

impl TemplateService {
    pub fn new(repo: Arc<dyn TemplatesRepo>, renderer: Arc<dyn ContentRenderer>) -> Self {
        Self { repo, renderer }
    }

    pub async fn list(&self, ctx: &TenantContext) -> Result<Vec<CertificateTemplate>, ServiceError> {
        let tenant_id = ctx.require()?;
        Ok(self.repo.list_templates(tenant_id).await?)
    }

    pub async fn get(
        &self,
        ctx: &TenantContext,
        id: Uuid,
    ) -> Result<CertificateTemplate, ServiceError> {
        let tenant_id = ctx.require()?;
        self.repo
            .find_template(tenant_id, id)
            .await?
            .ok_or(ServiceError::not_found("template"))
    }

    pub async fn create(
        &self,
        ctx: &TenantContext,
        content: TemplateContent,
    ) -> Result<CertificateTemplate, ServiceError> {
        let tenant_id = ctx.require()?;
        let template = CertificateTemplate::create(tenant_id, content)?;
        self.repo.insert_template(&template).await?;

        info!(
            target = "certify::application::templates",
            tenant_id = %tenant_id,
            template_id = %template.header.id,
            "template created"
        );
        Ok(template)
    }

    pub async fn update(
        &self,
        ctx: &TenantContext,
        id: Uuid,
        content: TemplateContent,
    ) -> Result<CertificateTemplate, ServiceError> {
        let mut template = self.get(ctx, id).await?;
        template.revise(content)?;
        self.repo.update_template(&template).await?;

        info!(
            target = "certify::application::templates",
            tenant_id = %template.tenant_id,
            template_id = %id,
            version = template.version,
            "template revised"
        );
        Ok(template)
    }

    pub async fn deactivate(
        &self,
        ctx: &TenantContext,
        id: Uuid,
    ) -> Result<CertificateTemplate, ServiceError> {
        let mut template = self.get(ctx, id).await?;
        if template.active {
            template.deactivate();
            self.repo.update_template(&template).await?;
        }
        Ok(template)
    }

    /// Substitute and render without a verification image or any persistence.
    pub async fn preview(
        &self,
        ctx: &TenantContext,
        id: Uuid,
        data: &DataMap,
    ) -> Result<Vec<u8>, ServiceError> {
        let template = self.get(ctx, id).await?;
        let html = apply_placeholders(&template.html_template, data);
        Ok(render_off_thread(self.renderer.clone(), html).await?)
    }
}
