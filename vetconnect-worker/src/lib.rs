//! # VetConnect Worker Library
//!
//! Background maintenance for the VetConnect database, run as its own
//! process next to the API server.
//!
//! ## Modules
//!
//! - `config`: Worker configuration from the environment
//! - `sweeper`: Periodic removal of expired token revocations

pub mod config;
pub mod sweeper;
