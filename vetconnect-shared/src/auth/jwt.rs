/// JWT token generation and validation
///
/// Session tokens are HS256-signed JWTs handed back from `POST /api/login`.
/// They carry enough identity (`sub`, `email`, `role`) for the API to
/// authorize a request without a database round trip; the only lookup on the
/// hot path is the logout blacklist (see [`crate::auth::middleware`]).
///
/// # Claims
///
/// - `sub`: user ID
/// - `email`: address the user logged in with
/// - `role`: `user` or `admin`
/// - `iss`: always `"vetconnect"`
/// - `iat` / `nbf` / `exp`: Unix timestamps
/// - `jti`: random token ID so two logins in the same second differ
///
/// # Example
///
/// ```
/// use vetconnect_shared::auth::jwt::{create_token, validate_token, Claims};
/// use vetconnect_shared::models::user::UserRole;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "a-secret-key-that-is-at-least-32-bytes";
/// let claims = Claims::new(Uuid::new_v4(), "owner@example.com".into(), UserRole::User);
///
/// let token = create_token(&claims, secret)?;
/// let decoded = validate_token(&token, secret)?;
/// assert_eq!(decoded.sub, claims.sub);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::UserRole;

/// Issuer written into and required from every token
pub const ISSUER: &str = "vetconnect";

/// Default lifetime of a session token
pub const DEFAULT_EXPIRATION_MINUTES: i64 = 60;

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Signature, algorithm or claim validation failed
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Token was issued by someone else
    #[error("Invalid issuer: expected {expected}")]
    InvalidIssuer { expected: String },
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: Uuid,

    /// Email address of the user
    pub email: String,

    /// Role at the time of login
    pub role: UserRole,

    /// Issuer (always "vetconnect")
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// Unique token ID
    pub jti: Uuid,
}

impl Claims {
    /// Creates claims with the default one hour lifetime
    pub fn new(user_id: Uuid, email: String, role: UserRole) -> Self {
        Self::with_expiration(
            user_id,
            email,
            role,
            Duration::minutes(DEFAULT_EXPIRATION_MINUTES),
        )
    }

    /// Creates claims with a custom lifetime
    pub fn with_expiration(user_id: Uuid, email: String, role: UserRole, expires_in: Duration) -> Self {
        let now = Utc::now();
        let expiration = now + expires_in;

        Self {
            sub: user_id,
            email,
            role,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            nbf: now.timestamp(),
            jti: Uuid::new_v4(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Expiration as a timestamp, used as the blacklist row's `expires_at`
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }
}

/// Signs claims into a compact JWT
///
/// # Errors
///
/// Returns `JwtError::CreateError` if encoding fails.
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Validates signature, issuer, `exp` and `nbf` and returns the claims
///
/// # Errors
///
/// - `JwtError::Expired` once `exp` has passed
/// - `JwtError::InvalidIssuer` for tokens not minted by this service
/// - `JwtError::ValidationError` for anything else (bad signature, garbage input)
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.leeway = 0;

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer {
            expected: ISSUER.to_string(),
        },
        _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
    })?;

    Ok(token_data.claims)
}
