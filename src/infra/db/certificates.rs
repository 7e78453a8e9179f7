use async_trait::async_trait;
use sqlx::{Postgres, Transaction, types::Json};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CertificatesRepo, FinalizeIssuanceParams, IssuanceUnit, RepoError,
};
use crate::domain::entities::{Certificate, DataMap, RecordHeader, VerificationToken};
use crate::domain::types::CertificateStatus;

use super::util::parse_certificate_status;
use super::{PostgresRepositories, map_sqlx_error};

const CERTIFICATE_COLUMNS: &str = "id, tenant_id, template_id, data, status, storage_path, hash, \
     created_by, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct CertificateRow {
    id: Uuid,
    tenant_id: Uuid,
    template_id: Uuid,
    data: Json<DataMap>,
    status: String,
    storage_path: String,
    hash: String,
    created_by: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<CertificateRow> for Certificate {
    type Error = RepoError;

    fn try_from(row: CertificateRow) -> Result<Self, Self::Error> {
        Ok(Certificate {
            header: RecordHeader {
                id: row.id,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            tenant_id: row.tenant_id,
            template_id: row.template_id,
            data: row.data.0,
            status: parse_certificate_status(&row.status)?,
            storage_path: row.storage_path,
            hash: row.hash,
            created_by: row.created_by,
        })
    }
}

#[async_trait]
impl CertificatesRepo for PostgresRepositories {
    async fn list_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<Certificate>, RepoError> {
        let sql = format!(
            "SELECT {CERTIFICATE_COLUMNS} FROM certificates \
             WHERE tenant_id = $1 ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, CertificateRow>(&sql)
            .bind(tenant_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(Certificate::try_from).collect()
    }

    async fn find_for_tenant(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Certificate>, RepoError> {
        let sql =
            format!("SELECT {CERTIFICATE_COLUMNS} FROM certificates WHERE id = $1 AND tenant_id = $2");
        let row = sqlx::query_as::<_, CertificateRow>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(Certificate::try_from).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Certificate>, RepoError> {
        let sql = format!("SELECT {CERTIFICATE_COLUMNS} FROM certificates WHERE id = $1");
        let row = sqlx::query_as::<_, CertificateRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(Certificate::try_from).transpose()
    }

    async fn update_status(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        status: CertificateStatus,
    ) -> Result<bool, RepoError> {
        let result = sqlx::query(
            "UPDATE certificates SET status = $3, updated_at = now() WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .bind(status.as_str())
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn begin_issuance(&self) -> Result<Box<dyn IssuanceUnit>, RepoError> {
        let tx = self.begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(PgIssuanceUnit { tx }))
    }
}

/// Issuance writes staged in one Postgres transaction; dropping it rolls back.
struct PgIssuanceUnit {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl IssuanceUnit for PgIssuanceUnit {
    async fn insert_certificate(&mut self, certificate: &Certificate) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO certificates
                (id, tenant_id, template_id, data, status, storage_path, hash, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(certificate.header.id)
        .bind(certificate.tenant_id)
        .bind(certificate.template_id)
        .bind(Json(&certificate.data))
        .bind(certificate.status.as_str())
        .bind(&certificate.storage_path)
        .bind(&certificate.hash)
        .bind(&certificate.created_by)
        .bind(certificate.header.created_at)
        .bind(certificate.header.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn insert_token(&mut self, token: &VerificationToken) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO certificate_verification_tokens
                (public_id, certificate_id, checksum, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(token.public_id)
        .bind(token.certificate_id)
        .bind(&token.checksum)
        .bind(token.expires_at)
        .bind(token.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn finalize(&mut self, params: FinalizeIssuanceParams) -> Result<(), RepoError> {
        let updated = sqlx::query(
            r#"
            UPDATE certificates
            SET hash = $2, storage_path = $3, data = $4, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(params.certificate_id)
        .bind(&params.hash)
        .bind(&params.storage_path)
        .bind(Json(&params.data))
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        if updated.rows_affected() != 1 {
            return Err(RepoError::integrity(format!(
                "certificate `{}` vanished during issuance",
                params.certificate_id
            )));
        }

        let updated = sqlx::query(
            "UPDATE certificate_verification_tokens SET checksum = $2 WHERE certificate_id = $1",
        )
        .bind(params.certificate_id)
        .bind(&params.hash)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        if updated.rows_affected() != 1 {
            return Err(RepoError::integrity(format!(
                "verification token for certificate `{}` missing during issuance",
                params.certificate_id
            )));
        }

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepoError> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }
}
