/// Router tests that need no database
///
/// Every request here is answered before a query would run: input
/// validation, CSRF, token parsing, headers and the chat assistant.

mod common;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Request, StatusCode};
use common::{body_json, csrf_pair, get, json_request, lazy_app, send};
use serde_json::json;
use std::net::SocketAddr;
use uuid::Uuid;
use vetconnect_api::chat::{booking::BOOKING_INTRO, knowledge::EMERGENCY_REPLY};
use vetconnect_shared::auth::jwt::{create_token, Claims};
use vetconnect_shared::models::user::UserRole;
use vetconnect_shared::validation::{MSG_ALL_FIELDS_REQUIRED, MSG_INVALID_USERNAME, MSG_WEAK_PASSWORD};

#[tokio::test]
async fn test_db_endpoint_answers_without_database() {
    let app = lazy_app(&[]);
    let response = send(&app, get("/test-db")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "message": "Backend is working!" }));
}

#[tokio::test]
async fn test_health_reports_degraded_without_database() {
    let app = lazy_app(&[]);
    let response = send(&app, get("/health")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["database"], "disconnected");
}

#[tokio::test]
async fn test_security_headers_present() {
    let app = lazy_app(&[]);
    let response = send(&app, get("/test-db")).await;
    let headers = response.headers();

    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert!(headers.get("content-security-policy").is_some());
    assert!(headers.get("strict-transport-security").is_none());
}

#[tokio::test]
async fn test_hsts_in_production() {
    let app = lazy_app(&[("APP_ENV", "production")]);
    let response = send(&app, get("/test-db")).await;

    assert!(response.headers().get("strict-transport-security").is_some());
}

#[tokio::test]
async fn test_cors_preflight_allows_frontend_origin() {
    let app = lazy_app(&[]);
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/login")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "x-csrf-token")
        .body(Body::empty())
        .unwrap();

    let response = send(&app, request).await;
    let headers = response.headers();

    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:3000");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
}

#[tokio::test]
async fn test_csrf_token_sets_cookie_once() {
    let app = lazy_app(&[]);
    let (cookie, token) = csrf_pair(&app).await;

    assert!(cookie.starts_with("_csrf="));
    assert!(token.contains('.'));

    // presenting the cookie reuses the secret
    let request = Request::builder()
        .uri("/api/csrf-token")
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_csrf_rejects_unsafe_request_without_token() {
    let app = lazy_app(&[]);
    let response = send(&app, json_request("POST", "/api/logout", json!({}))).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(response).await["error"],
        "Form tampered with (CSRF detected)"
    );
}

#[tokio::test]
async fn test_csrf_rejects_token_from_another_secret() {
    let app = lazy_app(&[]);
    let (cookie, _) = csrf_pair(&app).await;
    let (_, foreign_token) = csrf_pair(&app).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/logout")
        .header(header::COOKIE, &cookie)
        .header("x-csrf-token", foreign_token)
        .body(Body::empty())
        .unwrap();

    assert_eq!(send(&app, request).await.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_valid_csrf_reaches_auth_layer() {
    let app = lazy_app(&[]);
    let (cookie, token) = csrf_pair(&app).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/logout")
        .header(header::COOKIE, &cookie)
        .header("x-csrf-token", token)
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Access denied. No token provided.");
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let app = lazy_app(&[]);

    let response = send(&app, get("/api/me")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(&app, get("/api/admin/stats")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_authorization_header() {
    let app = lazy_app(&[]);
    let request = Request::builder()
        .uri("/api/appointments")
        .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
        .body(Body::empty())
        .unwrap();

    assert_eq!(send(&app, request).await.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_token_signed_with_other_secret_is_rejected() {
    let app = lazy_app(&[]);
    let claims = Claims::new(Uuid::new_v4(), "owner@example.com".into(), UserRole::Admin);
    let token = create_token(&claims, "some-other-secret-that-is-long-enough-too").unwrap();

    let request = Request::builder()
        .uri("/api/admin/users")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Invalid token");
}

#[tokio::test]
async fn test_register_validation_messages() {
    let app = lazy_app(&[]);

    let cases = [
        (json!({ "username": "", "email": "", "password": "" }), MSG_ALL_FIELDS_REQUIRED),
        (
            json!({ "username": "ab", "email": "a@b.co", "password": "Str0ng!Passw0rd" }),
            MSG_INVALID_USERNAME,
        ),
        (
            json!({ "username": "pet_owner", "email": "a@b.co", "password": "weakpassword" }),
            MSG_WEAK_PASSWORD,
        ),
    ];

    for (body, expected) in cases {
        let response = send(&app, json_request("POST", "/api/register", body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], expected);
    }
}

#[tokio::test]
async fn test_login_requires_both_fields() {
    let app = lazy_app(&[]);
    let response = send(
        &app,
        json_request("POST", "/api/login", json!({ "email": "owner@example.com" })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Email and password required");
}

#[tokio::test]
async fn test_malformed_body_gets_json_error() {
    let app = lazy_app(&[]);
    let request = Request::builder()
        .method("POST")
        .uri("/api/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    assert_eq!(body_json(response).await["error"], "Request body is not valid JSON");
}

#[tokio::test]
async fn test_mistyped_field_gets_json_error() {
    let app = lazy_app(&[]);
    let response = send(
        &app,
        json_request("POST", "/api/register", json!({ "username": 42, "email": "a@b.co", "password": "x" })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));
}

#[tokio::test]
async fn test_resend_without_email_is_validated() {
    let app = lazy_app(&[]);
    let response = send(&app, json_request("POST", "/api/resend-verification", json!({}))).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["details"][0]["field"], "email");
}

#[tokio::test]
async fn test_malformed_verification_token() {
    let app = lazy_app(&[]);
    let response = send(&app, get("/api/verify/not-a-token")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"],
        "Verification link is invalid or has expired."
    );
}

fn login_from(peer: [u8; 4], forwarded_for: &str) -> Request<Body> {
    let mut request = json_request("POST", "/api/login", json!({}));
    request
        .headers_mut()
        .insert("x-forwarded-for", forwarded_for.parse().unwrap());
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from((peer, 40000))));
    request
}

#[tokio::test]
async fn test_auth_endpoints_are_rate_limited() {
    let app = lazy_app(&[("AUTH_RATE_LIMIT_PER_MINUTE", "2")]);
    let peer = [198, 51, 100, 9];

    assert_eq!(send(&app, login_from(peer, "198.51.100.9")).await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(send(&app, login_from(peer, "198.51.100.9")).await.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, login_from(peer, "198.51.100.9")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().get(header::RETRY_AFTER).is_some());
}

#[tokio::test]
async fn test_rotating_forwarded_for_does_not_reset_limit() {
    let app = lazy_app(&[("AUTH_RATE_LIMIT_PER_MINUTE", "2")]);
    let peer = [192, 0, 2, 44];

    assert_eq!(send(&app, login_from(peer, "10.0.0.1")).await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(send(&app, login_from(peer, "10.0.0.2")).await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        send(&app, login_from(peer, "10.0.0.3")).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    // a different peer still has its own bucket
    assert_eq!(
        send(&app, login_from([192, 0, 2, 45], "10.0.0.3")).await.status(),
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn test_trusted_proxy_keys_on_forwarded_for() {
    let app = lazy_app(&[("AUTH_RATE_LIMIT_PER_MINUTE", "1"), ("TRUST_PROXY", "true")]);
    let proxy = [10, 0, 0, 1];

    assert_eq!(send(&app, login_from(proxy, "203.0.113.1")).await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(send(&app, login_from(proxy, "203.0.113.2")).await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        send(&app, login_from(proxy, "203.0.113.1")).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
}

#[tokio::test]
async fn test_chat_assigns_session_and_starts_booking() {
    let app = lazy_app(&[]);
    let response = send(
        &app,
        json_request("POST", "/api/chat", json!({ "message": "I want to book an appointment" })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["reply"], BOOKING_INTRO);
    assert!(!body["session_id"].as_str().unwrap().is_empty());
    assert!(body.get("booking_data").is_none());
}

#[tokio::test]
async fn test_chat_emergency_short_circuits() {
    let app = lazy_app(&[]);
    let response = send(
        &app,
        json_request("POST", "/api/chat", json!({ "message": "my dog is bleeding a lot" })),
    )
    .await;

    assert_eq!(body_json(response).await["reply"], EMERGENCY_REPLY);
}

#[tokio::test]
async fn test_chat_cooldown_per_session() {
    let app = lazy_app(&[("CHAT_COOLDOWN_SECS", "30")]);
    let first = body_json(
        send(&app, json_request("POST", "/api/chat", json!({ "message": "hello" }))).await,
    )
    .await;
    let session_id = first["session_id"].as_str().unwrap().to_string();

    let second = body_json(
        send(
            &app,
            json_request(
                "POST",
                "/api/chat",
                json!({ "message": "what are your hours?", "session_id": session_id }),
            ),
        )
        .await,
    )
    .await;

    assert!(second["reply"].as_str().unwrap().contains("Please wait"));
    assert_eq!(second["session_id"], session_id.as_str());
}

#[tokio::test]
async fn test_chat_rejects_oversized_message() {
    let app = lazy_app(&[]);
    let response = send(
        &app,
        json_request("POST", "/api/chat", json!({ "message": "a".repeat(5000) })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_session_reset_issues_new_id() {
    let app = lazy_app(&[]);
    let response = send(
        &app,
        json_request("POST", "/api/chat/session/reset", json!({ "session_id": "old-session" })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let new_id = body["session_id"].as_str().unwrap();
    assert_ne!(new_id, "old-session");
    assert!(Uuid::parse_str(new_id).is_ok());
}
