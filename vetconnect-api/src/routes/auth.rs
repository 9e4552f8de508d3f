/// Account endpoints
///
/// # Endpoints
///
/// - `POST /api/register` - create an unverified account and mail the link
/// - `POST /api/login` - exchange credentials for a session token
/// - `POST /api/logout` - revoke the presented token
/// - `GET /api/verify/:token` - confirm an email address
/// - `POST /api/resend-verification` - issue a fresh verification link
/// - `GET /api/csrf-token` - hand out a CSRF token
/// - `GET /api/me` - profile of the caller
///
/// Failures answer `{"error": "..."}` with the message the web client shows.

use crate::{
    app::AppState,
    email::verification_link,
    error::{ApiError, ApiResult},
    extract::ApiJson,
    middleware::{
        csrf::{self, CSRF_COOKIE},
        request_log::ClientIp,
    },
};
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;
use vetconnect_shared::{
    audit::{self, AuditAction, AuditEntry},
    auth::{
        jwt::{create_token, Claims},
        middleware::AuthContext,
        password::{hash_password, verify_password},
    },
    models::{
        blacklisted_token::BlacklistedToken,
        user::{CreateUser, User},
    },
    validation::{is_valid_email, sanitize_text, validate_registration, MSG_INVALID_EMAIL},
};

pub const MSG_REGISTERED: &str =
    "Registration successful. Please check your email to verify your account.";
pub const MSG_EMAIL_TAKEN: &str = "Email already registered";
pub const MSG_CREDENTIALS_REQUIRED: &str = "Email and password required";
pub const MSG_INVALID_CREDENTIALS: &str = "Invalid credentials";
pub const MSG_NOT_VERIFIED: &str = "Please verify your email first";
pub const MSG_DEACTIVATED: &str = "Your account has been deactivated. Please contact the clinic.";
pub const MSG_LOGGED_OUT: &str = "Logged out successfully";
pub const MSG_VERIFIED: &str = "Email verified successfully! You can now log in.";
pub const MSG_INVALID_VERIFICATION: &str = "Verification link is invalid or has expired.";
pub const MSG_RESEND_SENT: &str =
    "If that email is registered, a new verification link has been sent.";
pub const MSG_ALREADY_VERIFIED: &str = "This email is already verified. Please log in.";

/// Length of a verification token in hex characters
const VERIFICATION_TOKEN_HEX_LEN: usize = 64;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub role: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResendRequest {
    #[serde(default)]
    #[validate(email(message = "Invalid email format."))]
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrfTokenResponse {
    pub csrf_token: String,
}

/// 32 random bytes, hex encoded
fn generate_verification_token() -> String {
    let mut bytes = [0u8; VERIFICATION_TOKEN_HEX_LEN / 2];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn looks_like_verification_token(token: &str) -> bool {
    token.len() == VERIFICATION_TOKEN_HEX_LEN && token.chars().all(|c| c.is_ascii_hexdigit())
}

/// Register a new, unverified account
///
/// # Endpoint
///
/// ```text
/// POST /api/register
///
/// { "username": "pet_owner", "email": "owner@example.com", "password": "Str0ng!Passw0rd" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: a field fails validation or the email is taken
/// - `409 Conflict`: the email was taken by a concurrent registration
pub async fn register(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let username = sanitize_text(&req.username);
    let email = sanitize_text(&req.email).to_lowercase();

    validate_registration(&username, &email, &req.password)
        .map_err(|msg| ApiError::BadRequest(msg.to_string()))?;

    if User::find_by_email(&state.db, &email).await?.is_some() {
        return Err(ApiError::BadRequest(MSG_EMAIL_TAKEN.to_string()));
    }

    let password_hash = hash_password(&req.password)?;
    let token = generate_verification_token();
    let expires = Utc::now() + Duration::minutes(state.config.email.verification_ttl_minutes);

    let user = User::create(
        &state.db,
        CreateUser {
            username,
            email,
            password_hash,
            verification_token: token.clone(),
            verification_token_expires: expires,
        },
    )
    .await?;

    let link = verification_link(&state.config.api.frontend_url, &token);
    if let Err(e) = state
        .mailer
        .send_verification(&user.email, &user.username, &link)
        .await
    {
        tracing::warn!(user_id = %user.id, error = %e, "Failed to send verification email");
    }

    audit::record(
        &state.db,
        AuditEntry::new(AuditAction::Register)
            .user(user.id, user.role)
            .entity("user", Some(user.id))
            .detail(json!({ "email": user.email, "username": user.username }))
            .ip(ip),
    )
    .await;

    tracing::info!(user_id = %user.id, "User registered");

    Ok((StatusCode::CREATED, MessageResponse::new(MSG_REGISTERED)))
}

/// Log in with email and password
///
/// # Response
///
/// ```json
/// { "token": "eyJ...", "role": "user" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: missing fields or malformed email
/// - `401 Unauthorized`: unknown email or wrong password
/// - `403 Forbidden`: email not verified or account deactivated
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let email = sanitize_text(&req.email).to_lowercase();

    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(MSG_CREDENTIALS_REQUIRED.to_string()));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::BadRequest(MSG_INVALID_EMAIL.to_string()));
    }

    let user = match User::find_by_email(&state.db, &email).await? {
        Some(user) if verify_password(&req.password, &user.password_hash)? => user,
        found => {
            let mut entry = AuditEntry::new(AuditAction::LoginFail)
                .detail(json!({ "email": email }))
                .ip(ip);
            if let Some(user) = &found {
                entry = entry.user(user.id, user.role);
            }
            audit::record(&state.db, entry).await;

            return Err(ApiError::Unauthorized(MSG_INVALID_CREDENTIALS.to_string()));
        }
    };

    if !user.is_verified {
        return Err(ApiError::Forbidden(MSG_NOT_VERIFIED.to_string()));
    }
    if !user.is_active {
        return Err(ApiError::Forbidden(MSG_DEACTIVATED.to_string()));
    }

    let claims = Claims::with_expiration(
        user.id,
        user.email.clone(),
        user.role,
        Duration::minutes(state.config.jwt.expires_minutes),
    );
    let token = create_token(&claims, state.jwt_secret())?;

    audit::record(
        &state.db,
        AuditEntry::new(AuditAction::LoginSuccess)
            .user(user.id, user.role)
            .entity("user", Some(user.id))
            .ip(ip),
    )
    .await;

    Ok(Json(LoginResponse {
        token,
        role: user.role.as_str().to_string(),
    }))
}

/// Revoke the caller's token until it expires
pub async fn logout(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<MessageResponse>> {
    BlacklistedToken::insert(&state.db, &auth.token_hash, auth.expires_at).await?;

    audit::record(
        &state.db,
        AuditEntry::new(AuditAction::Logout)
            .actor(&auth)
            .entity("user", Some(auth.user_id))
            .ip(ip),
    )
    .await;

    Ok(MessageResponse::new(MSG_LOGGED_OUT))
}

/// Confirm an email address from the emailed link
pub async fn verify_email(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Path(token): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    if !looks_like_verification_token(&token) {
        return Err(ApiError::BadRequest(MSG_INVALID_VERIFICATION.to_string()));
    }

    let user = User::find_by_verification_token(&state.db, &token)
        .await?
        .ok_or_else(|| ApiError::BadRequest(MSG_INVALID_VERIFICATION.to_string()))?;

    User::mark_verified(&state.db, user.id).await?;

    audit::record(
        &state.db,
        AuditEntry::new(AuditAction::EmailVerified)
            .user(user.id, user.role)
            .entity("user", Some(user.id))
            .ip(ip),
    )
    .await;

    Ok(MessageResponse::new(MSG_VERIFIED))
}

/// Rotate the verification token and mail a new link
///
/// Unknown addresses get the same answer as known ones.
pub async fn resend_verification(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ApiJson(mut req): ApiJson<ResendRequest>,
) -> ApiResult<Json<MessageResponse>> {
    req.email = sanitize_text(&req.email).to_lowercase();
    req.validate()?;

    let Some(user) = User::find_by_email(&state.db, &req.email).await? else {
        return Ok(MessageResponse::new(MSG_RESEND_SENT));
    };

    if user.is_verified {
        return Err(ApiError::BadRequest(MSG_ALREADY_VERIFIED.to_string()));
    }

    let token = generate_verification_token();
    let expires = Utc::now() + Duration::minutes(state.config.email.verification_ttl_minutes);
    User::set_verification_token(&state.db, user.id, &token, expires).await?;

    let link = verification_link(&state.config.api.frontend_url, &token);
    if let Err(e) = state
        .mailer
        .send_verification(&user.email, &user.username, &link)
        .await
    {
        tracing::warn!(user_id = %user.id, error = %e, "Failed to resend verification email");
    }

    audit::record(
        &state.db,
        AuditEntry::new(AuditAction::ResendVerification)
            .user(user.id, user.role)
            .entity("user", Some(user.id))
            .ip(ip),
    )
    .await;

    Ok(MessageResponse::new(MSG_RESEND_SENT))
}

/// Issue a CSRF token, setting the secret cookie on first use
pub async fn csrf_token(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Response> {
    let (secret, is_new) = match csrf::read_cookie(&headers, CSRF_COOKIE) {
        Some(secret) => (secret.to_string(), false),
        None => (csrf::generate_secret(), true),
    };

    let token = csrf::issue_token(&secret)
        .ok_or_else(|| ApiError::internal("failed to derive CSRF token"))?;

    let mut response = Json(CsrfTokenResponse { csrf_token: token }).into_response();
    if is_new {
        let cookie = csrf::secret_cookie(&secret, state.config.is_production());
        let value: HeaderValue = cookie.parse().map_err(ApiError::internal)?;
        response.headers_mut().insert(header::SET_COOKIE, value);
    }

    Ok(response)
}

/// Profile of the authenticated caller
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<User>> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_token_shape() {
        let token = generate_verification_token();
        assert_eq!(token.len(), 64);
        assert!(looks_like_verification_token(&token));
        assert_ne!(token, generate_verification_token());
    }

    #[test]
    fn test_rejects_malformed_verification_tokens() {
        assert!(!looks_like_verification_token("abc"));
        assert!(!looks_like_verification_token(&"z".repeat(64)));
        assert!(!looks_like_verification_token(&"a".repeat(65)));
    }

    #[test]
    fn test_resend_request_validation() {
        let ok = ResendRequest {
            email: "owner@example.com".into(),
        };
        assert!(ok.validate().is_ok());

        let bad = ResendRequest {
            email: "not-an-email".into(),
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_register_request_tolerates_missing_fields() {
        let req: RegisterRequest = serde_json::from_str(r#"{"email":"a@b.co"}"#).unwrap();
        assert!(req.username.is_empty());
        assert!(req.password.is_empty());
    }
}
