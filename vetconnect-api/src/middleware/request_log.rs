/// Client IP extraction and the audit-tracked access log
///
/// [`TraceLayer`](tower_http::trace::TraceLayer) already logs every request.
/// This layer adds one summary line for the security-sensitive paths (admin,
/// login, logout, register) with the client IP and the authenticated user,
/// so they can be grepped out of the logs next to the audit trail.

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Instant;
use uuid::Uuid;

/// Paths whose requests get a summary line
pub const TRACKED_PREFIXES: [&str; 4] = ["/api/admin", "/api/login", "/api/logout", "/api/register"];

/// Placed in response extensions by the auth layer so outer layers can see
/// who made the request
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub Uuid);

/// Best-effort client address
///
/// First hop of `X-Forwarded-For`, then `X-Real-IP`, then the socket address,
/// then `"unknown"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl ClientIp {
    pub fn from_parts(parts: &Parts) -> Self {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        let real_ip = || {
            parts
                .headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let ip = forwarded
            .or_else(real_ip)
            .map(str::to_string)
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            })
            .unwrap_or_else(|| "unknown".to_string());

        ClientIp(ip)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp::from_parts(parts))
    }
}

pub fn is_tracked(path: &str) -> bool {
    TRACKED_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

/// Logs `METHOD path -> status (ms)` with ip and user for tracked paths
pub async fn request_log_layer(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if !is_tracked(&path) {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let (parts, body) = request.into_parts();
    let ClientIp(ip) = ClientIp::from_parts(&parts);
    let request = Request::from_parts(parts, body);

    let start = Instant::now();
    let response = next.run(request).await;
    let elapsed_ms = start.elapsed().as_millis();

    let user = response
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|AuthenticatedUser(id)| id.to_string())
        .unwrap_or_else(|| "anon".to_string());

    tracing::info!(
        target: "http",
        ip = %ip,
        user = %user,
        "{} {} -> {} ({}ms)",
        method,
        path,
        response.status().as_u16(),
        elapsed_ms
    );

    response
}
