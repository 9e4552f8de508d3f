/// User model and database operations
///
/// Clinic clients and administrators share one table; `role` tells them
/// apart. Accounts start unverified and carry a one-time verification token
/// until the emailed link is followed.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     username VARCHAR(30) NOT NULL,
///     email VARCHAR(255) NOT NULL,            -- unique on LOWER(email)
///     password_hash VARCHAR(255) NOT NULL,
///     role user_role NOT NULL DEFAULT 'user',
///     is_verified BOOLEAN NOT NULL DEFAULT FALSE,
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     verification_token VARCHAR(64),
///     verification_token_expires TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use vetconnect_shared::models::user::{User, CreateUser};
/// use vetconnect_shared::db::pool::{create_pool, DatabaseConfig};
/// use chrono::{Duration, Utc};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     username: "pet_owner".to_string(),
///     email: "owner@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     verification_token: "ab12...".to_string(),
///     verification_token_expires: Utc::now() + Duration::hours(1),
/// }).await?;
///
/// let found = User::find_by_email(&pool, "OWNER@example.com").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Pet owner using the client portal
    User,

    /// Clinic staff with access to the back office
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }

    /// Whether this role satisfies a requirement for `required`
    pub fn has_permission(&self, required: UserRole) -> bool {
        match required {
            UserRole::User => true,
            UserRole::Admin => *self == UserRole::Admin,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    /// 3 to 30 word characters
    pub username: String,

    /// Stored lowercase
    pub email: String,

    /// Argon2id PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub role: UserRole,

    /// Set once the emailed verification link has been followed
    pub is_verified: bool,

    /// Cleared by an admin to lock the account out
    pub is_active: bool,

    /// One-time verification token (64 hex chars), cleared on verification
    #[serde(skip_serializing)]
    pub verification_token: Option<String>,

    #[serde(skip_serializing)]
    pub verification_token_expires: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new, unverified user
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub username: String,

    /// Lowercased before insert
    pub email: String,

    /// Argon2id hash (NOT the plaintext password)
    pub password_hash: String,

    pub verification_token: String,

    pub verification_token_expires: DateTime<Utc>,
}

/// Row of the admin user listing
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub is_verified: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub appointment_count: i64,
}

/// Filters for [`User::list_with_appointment_counts`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
    /// `Some(true)` for active accounts only, `Some(false)` for deactivated
    pub is_active: Option<bool>,

    /// Case-insensitive substring of username or email
    pub search: Option<String>,
}

const USER_COLUMNS: &str = "id, username, email, password_hash, role, is_verified, is_active, \
     verification_token, verification_token_expires, created_at, updated_at";

impl User {
    /// Creates a new unverified user
    ///
    /// # Errors
    ///
    /// Returns a unique-violation database error if the email is taken.
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash, verification_token, verification_token_expires)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(data.username)
        .bind(data.email.to_lowercase())
        .bind(data.password_hash)
        .bind(data.verification_token)
        .bind(data.verification_token_expires)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by email, ignoring case
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    /// Finds the user owning an unexpired verification token
    pub async fn find_by_verification_token(
        pool: &PgPool,
        token: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE verification_token = $1 AND verification_token_expires > NOW()
            "#
        ))
        .bind(token)
        .fetch_optional(pool)
        .await
    }

    /// Marks the account verified and clears the token
    pub async fn mark_verified(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_verified = TRUE, verification_token = NULL,
                verification_token_expires = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replaces the verification token (resend flow)
    pub async fn set_verification_token(
        pool: &PgPool,
        id: Uuid,
        token: &str,
        expires: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET verification_token = $2, verification_token_expires = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token)
        .bind(expires)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Activates or deactivates an account
    pub async fn set_active(pool: &PgPool, id: Uuid, is_active: bool) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE users SET is_active = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(is_active)
                .execute(pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Changes an account's role
    pub async fn set_role(pool: &PgPool, id: Uuid, role: UserRole) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(role)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists users with their appointment counts, newest first
    pub async fn list_with_appointment_counts(
        pool: &PgPool,
        filter: &UserFilter,
    ) -> Result<Vec<UserSummary>, sqlx::Error> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT u.id, u.username, u.email, u.role, u.is_verified, u.is_active, u.created_at,
                   COUNT(DISTINCT a.id) AS appointment_count
            FROM users u
            LEFT JOIN appointments a ON a.user_id = u.id
            WHERE 1=1
            "#,
        );

        if let Some(is_active) = filter.is_active {
            query.push(" AND u.is_active = ");
            query.push_bind(is_active);
        }

        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = format!("%{}%", search.trim().to_lowercase());
            query.push(" AND (LOWER(u.username) LIKE ");
            query.push_bind(pattern.clone());
            query.push(" OR LOWER(u.email) LIKE ");
            query.push_bind(pattern);
            query.push(")");
        }

        query.push(" GROUP BY u.id ORDER BY u.created_at DESC");

        query.build_query_as::<UserSummary>().fetch_all(pool).await
    }

    /// Number of accounts that are not deactivated
    pub async fn count_active(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_active = TRUE")
            .fetch_one(pool)
            .await
    }
}
