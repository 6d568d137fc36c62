//! CLI command implementations.

pub mod admin;
pub mod config;
pub mod secret;
pub mod serve;

pub use admin::run_admin;
pub use config::run_config;
pub use secret::run_secret;
pub use serve::run_serve;
