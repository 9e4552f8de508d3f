/// Audit log rows
///
/// The table is append-only: there is no update or delete here. Writes go
/// through [`crate::audit::record`], which never fails the caller.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE audit_logs (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID REFERENCES users (id) ON DELETE SET NULL,
///     user_role VARCHAR(20),
///     action VARCHAR(64) NOT NULL,
///     entity VARCHAR(32),
///     entity_id UUID,
///     detail JSONB,
///     ip_address VARCHAR(64),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

/// A stored audit entry joined with the acting user's current username
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub user_role: Option<String>,
    pub action: String,
    pub entity: Option<String>,
    pub entity_id: Option<Uuid>,
    pub detail: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,

    /// `None` for anonymous actions or deleted users
    pub username: Option<String>,
}

/// Values for a new audit row
#[derive(Debug, Clone, Default)]
pub struct NewAuditLog {
    pub user_id: Option<Uuid>,
    pub user_role: Option<String>,
    pub action: String,
    pub entity: Option<String>,
    pub entity_id: Option<Uuid>,
    pub detail: Option<serde_json::Value>,
    pub ip_address: Option<String>,
}

/// Filters for listing and counting
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub action: Option<String>,
    pub user_id: Option<Uuid>,
}

impl AuditLogFilter {
    fn apply(&self, query: &mut QueryBuilder<'_, Postgres>, alias: &str) {
        if let Some(action) = &self.action {
            query.push(format!(" AND {alias}action = "));
            query.push_bind(action.clone());
        }

        if let Some(user_id) = self.user_id {
            query.push(format!(" AND {alias}user_id = "));
            query.push_bind(user_id);
        }
    }
}

impl AuditLog {
    /// Appends a row
    pub async fn insert(pool: &PgPool, entry: NewAuditLog) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (user_id, user_role, action, entity, entity_id, detail, ip_address)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.user_role)
        .bind(entry.action)
        .bind(entry.entity)
        .bind(entry.entity_id)
        .bind(entry.detail)
        .bind(entry.ip_address)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// One page of entries, newest first
    ///
    /// `page` is 1-based.
    pub async fn list(
        pool: &PgPool,
        filter: &AuditLogFilter,
        page: i64,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT l.id, l.user_id, l.user_role, l.action, l.entity, l.entity_id,
                   l.detail, l.ip_address, l.created_at, u.username
            FROM audit_logs l
            LEFT JOIN users u ON u.id = l.user_id
            WHERE 1=1
            "#,
        );

        filter.apply(&mut query, "l.");

        query.push(" ORDER BY l.created_at DESC LIMIT ");
        query.push_bind(limit);
        query.push(" OFFSET ");
        query.push_bind(page.saturating_sub(1).max(0).saturating_mul(limit.max(0)));

        query.build_query_as::<AuditLog>().fetch_all(pool).await
    }

    /// Total entries matching the filter
    pub async fn count(pool: &PgPool, filter: &AuditLogFilter) -> Result<i64, sqlx::Error> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM audit_logs WHERE 1=1");

        filter.apply(&mut query, "");

        query.build_query_scalar().fetch_one(pool).await
    }
}
