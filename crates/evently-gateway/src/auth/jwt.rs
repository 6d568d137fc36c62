//! JWT issuance and verification.
//!
//! Access and refresh tokens are signed with two distinct secrets. An access
//! token presented where a refresh token is expected (or the reverse) fails
//! signature verification and is reported as [`TokenError::Invalid`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use evently_core::{AuthConfig, SigningSecrets, UserId};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

use super::AuthError;
use super::users::Role;

/// Why a presented token was not accepted.
///
/// `Expired` may prompt a refresh; `Invalid` never should.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    /// No token was presented.
    #[error("Missing token")]
    Missing,
    /// Authentic token past its expiry.
    #[error("Token has expired")]
    Expired,
    /// Bad signature, malformed, or no longer bound to a live identity.
    #[error("Invalid token")]
    Invalid,
}

/// Access token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (identity ID).
    pub sub: String,
    /// Identity email.
    pub email: String,
    /// Identity role.
    pub role: Role,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
}

/// Refresh token claims. Deliberately minimal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Subject (identity ID).
    pub sub: String,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
    /// Unique token ID, so two refresh tokens minted in the same second differ.
    pub jti: String,
}

/// A pair of access and refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    /// Access token.
    pub access_token: String,
    /// Refresh token.
    pub refresh_token: String,
    /// Access token expiration.
    pub expires_at: DateTime<Utc>,
    /// Refresh token expiration.
    pub refresh_expires_at: DateTime<Utc>,
    /// Token type (always "Bearer").
    pub token_type: String,
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// JWT manager for creating and validating tokens.
pub struct JwtManager {
    access: KeyPair,
    refresh: KeyPair,
    access_expiry: Duration,
    refresh_expiry: Duration,
    validation: Validation,
}

impl JwtManager {
    /// Create a JWT manager from explicit secrets and lifetimes.
    #[must_use]
    pub fn new(secrets: &SigningSecrets, access_expiry: Duration, refresh_expiry: Duration) -> Self {
        Self {
            access: KeyPair::from_secret(secrets.access.expose()),
            refresh: KeyPair::from_secret(secrets.refresh.expose()),
            access_expiry,
            refresh_expiry,
            validation: strict_validation(),
        }
    }

    /// Create a JWT manager from auth configuration.
    ///
    /// # Errors
    ///
    /// Returns error if a configured secret is malformed or both are equal.
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let secrets =
            SigningSecrets::resolve(config).map_err(|e| AuthError::Config(e.to_string()))?;
        Ok(Self::new(
            &secrets,
            config.access_expiry(),
            config.refresh_expiry(),
        ))
    }

    /// Access token lifetime.
    #[must_use]
    pub const fn access_expiry(&self) -> Duration {
        self.access_expiry
    }

    /// Refresh token lifetime.
    #[must_use]
    pub const fn refresh_expiry(&self) -> Duration {
        self.refresh_expiry
    }

    /// Create an access token for an identity.
    ///
    /// # Errors
    ///
    /// Returns error if token encoding fails.
    pub fn issue_access(
        &self,
        user_id: &UserId,
        email: &str,
        role: Role,
    ) -> Result<(String, DateTime<Utc>), AuthError> {
        self.issue_access_at(user_id, email, role, Utc::now())
    }

    /// Create an access token as if issued at `now`.
    ///
    /// # Errors
    ///
    /// Returns error if the lifetime is out of range or encoding fails.
    pub fn issue_access_at(
        &self,
        user_id: &UserId,
        email: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>), AuthError> {
        let exp = expiry_after(now, self.access_expiry)?;

        let claims = AccessClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.access.encoding)
            .map_err(|e| AuthError::Crypto(format!("Encoding failed: {e}")))?;

        Ok((token, exp))
    }

    /// Create a refresh token for an identity.
    ///
    /// # Errors
    ///
    /// Returns error if token encoding fails.
    pub fn issue_refresh(&self, user_id: &UserId) -> Result<(String, DateTime<Utc>), AuthError> {
        self.issue_refresh_at(user_id, Utc::now())
    }

    /// Create a refresh token as if issued at `now`.
    ///
    /// # Errors
    ///
    /// Returns error if the lifetime is out of range or encoding fails.
    pub fn issue_refresh_at(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>), AuthError> {
        let exp = expiry_after(now, self.refresh_expiry)?;

        let claims = RefreshClaims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: uuid::Uuid::new_v4().simple().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.refresh.encoding)
            .map_err(|e| AuthError::Crypto(format!("Encoding failed: {e}")))?;

        Ok((token, exp))
    }

    /// Create a token pair (access + refresh) for an identity.
    ///
    /// Does not persist anything; see `AuthState::issue_session` for the
    /// variant that also records the refresh token on the identity.
    ///
    /// # Errors
    ///
    /// Returns error if token creation fails.
    pub fn create_token_pair(
        &self,
        user_id: &UserId,
        email: &str,
        role: Role,
    ) -> Result<TokenPair, AuthError> {
        let (access_token, expires_at) = self.issue_access(user_id, email, role)?;
        let (refresh_token, refresh_expires_at) = self.issue_refresh(user_id)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_at,
            refresh_expires_at,
            token_type: "Bearer".to_string(),
        })
    }

    /// Verify an access token.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Expired` or `TokenError::Invalid`.
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        verify_token(token, &self.access.decoding, &self.validation)
    }

    /// Verify a refresh token's signature and expiry.
    ///
    /// This alone does not make a refresh token usable; it must also match
    /// the value stored on the identity.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Expired` or `TokenError::Invalid`.
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        verify_token(token, &self.refresh.decoding, &self.validation)
    }

    /// Extract token from Authorization header.
    ///
    /// Expects format: "Bearer <token>"
    #[must_use]
    pub fn extract_from_header(header: &str) -> Option<&str> {
        header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager")
            .field("access_expiry", &self.access_expiry)
            .field("refresh_expiry", &self.refresh_expiry)
            .finish_non_exhaustive()
    }
}

/// HS256 only, zero leeway, `sub`/`exp`/`iat` required.
fn strict_validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "sub", "iat"]);
    validation
}

fn expiry_after(now: DateTime<Utc>, lifetime: Duration) -> Result<DateTime<Utc>, AuthError> {
    chrono::Duration::from_std(lifetime)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or_else(|| {
            AuthError::Config(format!(
                "Token lifetime of {}s is out of range",
                lifetime.as_secs()
            ))
        })
}

/// Verify a token against a key and recover its claims.
///
/// Pure function of the token, the key and the current time.
///
/// # Errors
///
/// Returns `TokenError::Expired` for an authentic but expired token and
/// `TokenError::Invalid` for everything else.
pub fn verify_token<C: DeserializeOwned>(
    token: &str,
    key: &DecodingKey,
    validation: &Validation,
) -> Result<C, TokenError> {
    decode::<C>(token, key, validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        })
}
