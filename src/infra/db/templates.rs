use async_trait::async_trait;
use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{RepoError, TemplatesRepo};
use crate::domain::entities::{CertificateTemplate, PlaceholderDefinition, RecordHeader};

use super::{PostgresRepositories, map_sqlx_error};

const TEMPLATE_COLUMNS: &str = "id, tenant_id, name, description, html_template, placeholders, \
     active, version, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct TemplateRow {
    id: Uuid,
    tenant_id: Uuid,
    name: String,
    description: Option<String>,
    html_template: String,
    placeholders: Json<Vec<PlaceholderDefinition>>,
    active: bool,
    version: i32,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<TemplateRow> for CertificateTemplate {
    fn from(row: TemplateRow) -> Self {
        CertificateTemplate {
            header: RecordHeader {
                id: row.id,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            tenant_id: row.tenant_id,
            name: row.name,
            description: row.description,
            html_template: row.html_template,
            placeholders: row.placeholders.0,
            active: row.active,
            version: row.version,
        }
    }
}

#[async_trait]
impl TemplatesRepo for PostgresRepositories {
    async fn list_templates(&self, tenant_id: Uuid) -> Result<Vec<CertificateTemplate>, RepoError> {
        let sql = format!(
            "SELECT {TEMPLATE_COLUMNS} FROM certificate_templates \
             WHERE tenant_id = $1 ORDER BY created_at, id"
        );
        let rows = sqlx::query_as::<_, TemplateRow>(&sql)
            .bind(tenant_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CertificateTemplate::from).collect())
    }

    async fn find_template(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<CertificateTemplate>, RepoError> {
        let sql = format!(
            "SELECT {TEMPLATE_COLUMNS} FROM certificate_templates WHERE id = $1 AND tenant_id = $2"
        );
        let row = sqlx::query_as::<_, TemplateRow>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(CertificateTemplate::from))
    }

    async fn insert_template(&self, template: &CertificateTemplate) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO certificate_templates
                (id, tenant_id, name, description, html_template, placeholders, active, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(template.header.id)
        .bind(template.tenant_id)
        .bind(&template.name)
        .bind(&template.description)
        .bind(&template.html_template)
        .bind(Json(&template.placeholders))
        .bind(template.active)
        .bind(template.version)
        .bind(template.header.created_at)
        .bind(template.header.updated_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn update_template(&self, template: &CertificateTemplate) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE certificate_templates
            SET name = $3, description = $4, html_template = $5, placeholders = $6,
                active = $7, version = $8, updated_at = $9
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(template.header.id)
        .bind(template.tenant_id)
        .bind(&template.name)
        .bind(&template.description)
        .bind(&template.html_template)
        .bind(Json(&template.placeholders))
        .bind(template.active)
        .bind(template.version)
        .bind(template.header.updated_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
