//! # Evently Gateway
//!
//! HTTP gateway with session authentication and role-based authorization.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Authentication and authorization.
pub mod auth;
/// Event records.
pub mod events;
mod middleware;
mod server;

pub use auth::{AuthContext, AuthError, AuthState, PublicUser, Role, User, UserStore};
pub use events::{Event, EventStore, EventUpdate, NewEvent};
pub use middleware::LoginRateLimiter;
pub use server::{Gateway, GatewayBuilder, GatewayConfig, GatewayState, router};

/// Start the gateway server.
///
/// # Errors
///
/// Returns error if server fails to start.
pub async fn start(config: GatewayConfig) -> Result<(), GatewayError> {
    let gateway = Gateway::new(config)?;
    gateway.run().await
}

/// Gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Server error.
    #[error("Server error: {0}")]
    Server(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
