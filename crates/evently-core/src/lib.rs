//! # Evently Core
//!
//! Core types, configuration, and secrets for Evently.
//!
//! This crate provides:
//! - Configuration loading and validation (JSON5 format)
//! - Token signing secrets that never reach logs
//! - Input validation for the request boundary
//! - Identifier newtypes

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod secrets;
pub mod types;
pub mod validation;

pub use config::{AuthConfig, AuthConfigBuilder, Config, ConfigError, GatewayConfig};
pub use secrets::{SecretError, SigningSecret, SigningSecrets};
pub use types::{EventId, UserId};
pub use validation::ValidationError;
