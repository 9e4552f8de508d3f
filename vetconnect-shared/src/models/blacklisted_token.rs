/// Revoked session tokens
///
/// Rows are keyed by the SHA-256 hex of the JWT, never the raw token. A row
/// only matters until `expires_at`; after that the JWT fails validation on
/// its own and the worker's sweeper deletes the row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BlacklistedToken {
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl BlacklistedToken {
    /// Revokes a token until `expires_at`
    ///
    /// Revoking the same token twice is a no-op.
    pub async fn insert(
        pool: &PgPool,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO blacklisted_tokens (token_hash, expires_at)
            VALUES ($1, $2)
            ON CONFLICT (token_hash) DO NOTHING
            "#,
        )
        .bind(token_hash)
        .bind(expires_at)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Whether an unexpired revocation exists for this hash
    pub async fn is_blacklisted(pool: &PgPool, token_hash: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM blacklisted_tokens WHERE token_hash = $1 AND expires_at > NOW())",
        )
        .bind(token_hash)
        .fetch_one(pool)
        .await
    }

    /// Deletes rows whose token has expired and returns how many were removed
    pub async fn delete_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM blacklisted_tokens WHERE expires_at < NOW()")
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }
}
