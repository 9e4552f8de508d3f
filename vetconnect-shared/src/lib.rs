//! # VetConnect Shared Library
//!
//! This crate contains shared types, utilities, and business logic used across
//! the VetConnect API server and background worker.
//!
//! ## Module Organization
//!
//! - `models`: Database models and data structures
//! - `auth`: Password hashing, JWT, blacklist-checked authentication, roles
//! - `audit`: Append-only audit trail
//! - `validation`: Input rules shared by registration and login
//! - `db`: Connection pool and migrations

pub mod audit;
pub mod auth;
pub mod db;
pub mod models;
pub mod validation;

/// Current version of the VetConnect shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
