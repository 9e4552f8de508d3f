/// API route handlers
///
/// - `health`: liveness and database status
/// - `auth`: registration, login, logout, email verification, CSRF tokens
/// - `appointments`: the client dashboard
/// - `admin`: back office
/// - `chat`: booking assistant

pub mod admin;
pub mod appointments;
pub mod auth;
pub mod chat;
pub mod health;
