//! # VetConnect API Server Library
//!
//! Core of the VetConnect HTTP server, split out of the binary so router
//! tests can build the full application.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `chat`: Booking assistant
//! - `config`: Configuration management
//! - `email`: Verification mail delivery
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: JSON body extractor with API-shaped rejections
//! - `middleware`: Security headers, CSRF, rate limiting, access log
//! - `routes`: API route handlers

pub mod app;
pub mod chat;
pub mod config;
pub mod email;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
