/// Middleware modules for the API server
///
/// - `security`: browser hardening headers
/// - `csrf`: HMAC-signed CSRF tokens for state-changing requests
/// - `rate_limit`: per-IP token buckets on the auth endpoints
/// - `request_log`: client IP extraction and tracked-path access log

pub mod csrf;
pub mod rate_limit;
pub mod request_log;
pub mod security;
