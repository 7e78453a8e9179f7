use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{RepoError, VerificationTokensRepo};
use crate::domain::entities::VerificationToken;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(Debug, sqlx::FromRow)]
struct TokenRow {
    public_id: Uuid,
    certificate_id: Uuid,
    checksum: String,
    expires_at: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
}

impl From<TokenRow> for VerificationToken {
    fn from(row: TokenRow) -> Self {
        VerificationToken {
            public_id: row.public_id,
            certificate_id: row.certificate_id,
            checksum: row.checksum,
            expires_at: row.expires_at,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl VerificationTokensRepo for PostgresRepositories {
    async fn find_by_public_id(
        &self,
        public_id: Uuid,
    ) -> Result<Option<VerificationToken>, RepoError> {
        let row = sqlx::query_as::<_, TokenRow>(
            r#"
            SELECT public_id, certificate_id, checksum, expires_at, created_at
            FROM certificate_verification_tokens
            WHERE public_id = $1
            "#,
        )
        .bind(public_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(VerificationToken::from))
    }

    async fn find_by_certificate(
        &self,
        certificate_id: Uuid,
    ) -> Result<Option<VerificationToken>, RepoError> {
        let row = sqlx::query_as::<_, TokenRow>(
            r#"
            SELECT public_id, certificate_id, checksum, expires_at, created_at
            FROM certificate_verification_tokens
            WHERE certificate_id = $1
            "#,
        )
        .bind(certificate_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(VerificationToken::from))
    }
}
