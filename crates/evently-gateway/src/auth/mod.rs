//! Authentication and authorization for the gateway.
//!
//! This module provides:
//! - Salted password hashing (credential store)
//! - Access/refresh JWT issuance and verification
//! - Identity records with a closed role set
//! - Session authentication middleware for protected routes
//! - Role and ownership authorization

mod authorize;
mod jwt;
mod middleware;
/// Password hashing and verification.
pub mod password;
mod session;
mod users;

pub use authorize::{Decision, Requirement, authorize, check, require_role};
pub use jwt::{AccessClaims, JwtManager, RefreshClaims, TokenError, TokenPair};
pub(crate) use middleware::parse_cookie;
pub use middleware::{
    ACCESS_COOKIE_NAME, AuthContext, AuthState, REFRESH_COOKIE_NAME, extract_token, require_auth,
};
pub use session::{LoginRequest, RefreshRequest, RegisterRequest, Session};
pub use users::{PublicUser, Role, User, UserStore};

use evently_core::ValidationError;
use thiserror::Error;

/// Authentication errors.
///
/// Expected failures (bad password, expired token, insufficient role) are
/// ordinary variants; only the internal variants indicate something broke.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Request body could not be parsed.
    #[error("Malformed request body: {0}")]
    MalformedBody(String),

    /// An identity with this email already exists.
    #[error("Email already exists")]
    EmailTaken,

    /// Email/password pair did not match. Covers unknown emails too.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Token missing, expired or invalid.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Authenticated, but not allowed to perform the action.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Referenced entity does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Too many login attempts.
    #[error("Too many login attempts, try again later")]
    RateLimited,

    /// A handler expected an authenticated context that was never attached.
    #[error("Authentication context missing")]
    MissingContext,

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Hashing or signing failure.
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),
}

impl AuthError {
    /// Whether this error is an unexpected internal failure.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::MissingContext | Self::Storage(_) | Self::Crypto(_) | Self::Config(_)
        )
    }
}
