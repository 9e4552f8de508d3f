/// CSRF protection
///
/// The `_csrf` cookie (HttpOnly, SameSite=Strict) holds a random secret.
/// `GET /api/csrf-token` hands out tokens derived from it:
///
/// ```text
/// token = salt "." hex(HMAC-SHA256(secret, salt))
/// ```
///
/// Every state-changing request must echo a token in `X-CSRF-Token`
/// (`CSRF-Token` and `X-XSRF-Token` are accepted too) unless its path starts
/// with one of [`EXEMPT_PREFIXES`]. A cross-site page can trigger the request
/// but can neither read the cookie nor mint a matching token.

use crate::error::ApiError;
use axum::{
    extract::Request,
    http::{header, HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const CSRF_COOKIE: &str = "_csrf";

pub const CSRF_HEADERS: [&str; 3] = ["x-csrf-token", "csrf-token", "x-xsrf-token"];

/// Paths reachable before the client has a CSRF cookie
pub const EXEMPT_PREFIXES: [&str; 5] = [
    "/api/register",
    "/api/login",
    "/api/verify",
    "/api/resend-verification",
    "/api/chat",
];

pub const CSRF_FAILURE_MESSAGE: &str = "Form tampered with (CSRF detected)";

/// Fresh random cookie secret (32 bytes, hex)
pub fn generate_secret() -> String {
    random_hex(32)
}

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn signature(secret: &str, salt: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(salt.as_bytes());
    Some(mac)
}

/// Derives a token from the cookie secret with a fresh salt
pub fn issue_token(secret: &str) -> Option<String> {
    let salt = random_hex(16);
    let mac = signature(secret, &salt)?;
    Some(format!("{}.{}", salt, hex::encode(mac.finalize().into_bytes())))
}

/// Constant-time check that `token` was derived from `secret`
pub fn verify_token(secret: &str, token: &str) -> bool {
    let Some((salt, sig_hex)) = token.split_once('.') else {
        return false;
    };
    let Ok(sig) = hex::decode(sig_hex) else {
        return false;
    };

    signature(secret, salt)
        .map(|mac| mac.verify_slice(&sig).is_ok())
        .unwrap_or(false)
}

/// Reads a cookie value from request headers
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|c| c.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value for the CSRF secret
pub fn secret_cookie(secret: &str, secure: bool) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict{}",
        CSRF_COOKIE,
        secret,
        if secure { "; Secure" } else { "" }
    )
}

fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE)
}

pub fn is_exempt(path: &str) -> bool {
    EXEMPT_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

fn presented_token(headers: &HeaderMap) -> Option<&str> {
    CSRF_HEADERS
        .iter()
        .find_map(|name| headers.get(*name).and_then(|v| v.to_str().ok()))
}

/// Rejects unsafe requests without a valid token
pub async fn csrf_layer(request: Request, next: Next) -> Result<Response, ApiError> {
    if is_safe_method(request.method()) || is_exempt(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let headers = request.headers();
    let valid = match (read_cookie(headers, CSRF_COOKIE), presented_token(headers)) {
        (Some(secret), Some(token)) => verify_token(secret, token),
        _ => false,
    };

    if !valid {
        tracing::warn!(
            method = %request.method(),
            path = %request.uri().path(),
            "CSRF validation failed"
        );
        return Err(ApiError::Forbidden(CSRF_FAILURE_MESSAGE.to_string()));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_issue_and_verify() {
        let secret = generate_secret();
        assert_eq!(secret.len(), 64);

        let token = issue_token(&secret).unwrap();
        assert!(verify_token(&secret, &token));

        // tokens are salted
        assert_ne!(token, issue_token(&secret).unwrap());
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let secret = generate_secret();
        let token = issue_token(&secret).unwrap();

        assert!(!verify_token(&generate_secret(), &token));
        assert!(!verify_token(&secret, "no-dot"));
        assert!(!verify_token(&secret, "salt.not-hex"));

        let (salt, sig) = token.split_once('.').unwrap();
        assert!(!verify_token(&secret, &format!("{}x.{}", salt, sig)));
    }

    #[test]
    fn test_read_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; _csrf=abc123; other=1"),
        );

        assert_eq!(read_cookie(&headers, "_csrf"), Some("abc123"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_exempt_paths() {
        assert!(is_exempt("/api/login"));
        assert!(is_exempt("/api/verify/abcdef"));
        assert!(is_exempt("/api/chat/session/reset"));
        assert!(!is_exempt("/api/logout"));
        assert!(!is_exempt("/api/admin/users/1/status"));
    }

    #[test]
    fn test_secret_cookie_flags() {
        let cookie = secret_cookie("abc", true);
        assert!(cookie.starts_with("_csrf=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.ends_with("; Secure"));

        assert!(!secret_cookie("abc", false).contains("Secure"));
    }
}
