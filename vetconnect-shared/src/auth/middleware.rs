/// Blacklist-checked bearer authentication
///
/// Every protected route goes through [`authenticate`]:
///
/// 1. Pull the token out of `Authorization: Bearer <token>`
/// 2. Validate signature, issuer and expiry ([`crate::auth::jwt`])
/// 3. Reject the token if its SHA-256 hash is in `blacklisted_tokens`
///
/// On success the resulting [`AuthContext`] is inserted into request
/// extensions by the API's layer and handlers pull it back out with
/// `Extension<AuthContext>`.
///
/// Logout writes `hash_token(token)` into the blacklist with the token's own
/// expiry, so a stolen token stops working immediately and the row becomes
/// garbage once the token would have expired anyway.

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use super::jwt::{validate_token, Claims, JwtError};
use crate::models::blacklisted_token::BlacklistedToken;
use crate::models::user::UserRole;

/// Authenticated caller, as established from a valid, non-revoked JWT
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,

    pub email: String,

    pub role: UserRole,

    /// SHA-256 of the presented token, used as the blacklist key on logout
    pub token_hash: String,

    /// When the presented token expires
    pub expires_at: DateTime<Utc>,
}

impl AuthContext {
    pub fn from_claims(claims: &Claims, token_hash: String) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email.clone(),
            role: claims.role,
            token_hash,
            expires_at: claims.expires_at(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Authentication failures
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No `Authorization` header
    #[error("Access denied. No token provided.")]
    MissingCredentials,

    /// Header present but not `Bearer <token>`
    #[error("{0}")]
    InvalidFormat(String),

    /// Signature, issuer or expiry check failed
    #[error("{0}")]
    InvalidToken(String),

    /// Token was logged out
    #[error("Token has been revoked. Please log in again.")]
    Revoked,

    /// Blacklist lookup failed
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingCredentials | AuthError::InvalidToken(_) | AuthError::Revoked => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::InvalidFormat(_) => StatusCode::BAD_REQUEST,
            AuthError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials => "missing_credentials",
            AuthError::InvalidFormat(_) => "invalid_auth_format",
            AuthError::InvalidToken(_) => "invalid_token",
            AuthError::Revoked => "token_revoked",
            AuthError::DatabaseError(_) => "internal_error",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AuthError::DatabaseError(e) => {
                tracing::error!(error = %e, "Blacklist lookup failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(serde_json::json!({ "error": message, "code": self.code() })),
        )
            .into_response()
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
            JwtError::InvalidIssuer { .. } => AuthError::InvalidToken("Invalid issuer".to_string()),
            _ => AuthError::InvalidToken("Invalid token".to_string()),
        }
    }
}

/// Hex-encoded SHA-256 of a raw token
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Extracts the bearer token from request headers
///
/// # Errors
///
/// - `AuthError::MissingCredentials` when there is no `Authorization` header
/// - `AuthError::InvalidFormat` when it is not a non-empty `Bearer` token
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))?;

    if token.is_empty() {
        return Err(AuthError::InvalidFormat("Expected Bearer token".to_string()));
    }

    Ok(token)
}

/// Validates a token and checks it against the blacklist
///
/// # Arguments
///
/// * `pool` - Database pool used for the blacklist lookup
/// * `secret` - JWT signing secret
/// * `token` - Raw bearer token
///
/// # Errors
///
/// Returns `AuthError::InvalidToken` for bad or expired tokens,
/// `AuthError::Revoked` for logged-out tokens and `AuthError::DatabaseError`
/// if the blacklist cannot be queried.
pub async fn authenticate(pool: &PgPool, secret: &str, token: &str) -> Result<AuthContext, AuthError> {
    let claims = validate_token(token, secret)?;
    let token_hash = hash_token(token);

    let revoked = BlacklistedToken::is_blacklisted(pool, &token_hash)
        .await
        .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

    if revoked {
        tracing::debug!(user_id = %claims.sub, "Rejected blacklisted token");
        return Err(AuthError::Revoked);
    }

    Ok(AuthContext::from_claims(&claims, token_hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_hash_token_is_sha256_hex() {
        let hash = hash_token("abc");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_extract_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));

        assert_eq!(extract_bearer(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_extract_bearer_missing() {
        let headers = HeaderMap::new();
        assert!(matches!(extract_bearer(&headers), Err(AuthError::MissingCredentials)));
    }

    #[test]
    fn test_extract_bearer_wrong_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert!(matches!(extract_bearer(&headers), Err(AuthError::InvalidFormat(_))));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(matches!(extract_bearer(&headers), Err(AuthError::InvalidFormat(_))));
    }

    #[test]
    fn test_auth_context_from_claims() {
        let claims = Claims::new(Uuid::new_v4(), "vet@example.com".into(), UserRole::Admin);
        let context = AuthContext::from_claims(&claims, hash_token("t"));

        assert_eq!(context.user_id, claims.sub);
        assert_eq!(context.email, "vet@example.com");
        assert!(context.is_admin());
        assert_eq!(context.expires_at.timestamp(), claims.exp);
    }

    #[test]
    fn test_jwt_error_maps_to_unauthorized() {
        let err: AuthError = JwtError::Expired.into();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "Token expired");
    }

    #[test]
    fn test_auth_error_into_response() {
        assert_eq!(
            AuthError::MissingCredentials.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthError::Revoked.into_response().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::InvalidFormat("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::DatabaseError("x".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
