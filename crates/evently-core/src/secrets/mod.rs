//! Token signing secrets.
//!
//! - `SigningSecret`: secret bytes that never show up in logs or debug output
//! - `SigningSecrets`: the access/refresh pair, guaranteed to be distinct

use rand::RngCore;
use secrecy::{ExposeSecret, SecretBox};
use thiserror::Error;

use crate::config::AuthConfig;

/// Minimum secret length in bytes (HS256 key size).
pub const MIN_SECRET_BYTES: usize = 32;

/// Errors from secret handling.
#[derive(Error, Debug)]
pub enum SecretError {
    /// The configured value is not valid hex.
    #[error("Invalid hex secret: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// The configured secret is too short.
    #[error("Secret too short ({actual} bytes, need at least {min})")]
    TooShort {
        /// Minimum required length.
        min: usize,
        /// Actual length.
        actual: usize,
    },

    /// Access and refresh secrets are identical.
    #[error("Access and refresh token secrets must differ")]
    NotDistinct,
}

/// A signing secret.
///
/// The bytes are held in a `secrecy::SecretBox` and zeroized on drop.
pub struct SigningSecret(SecretBox<[u8]>);

impl SigningSecret {
    /// Wrap raw secret bytes.
    ///
    /// # Errors
    ///
    /// Returns `SecretError::TooShort` if fewer than [`MIN_SECRET_BYTES`] are given.
    pub fn new(bytes: Vec<u8>) -> Result<Self, SecretError> {
        if bytes.len() < MIN_SECRET_BYTES {
            return Err(SecretError::TooShort {
                min: MIN_SECRET_BYTES,
                actual: bytes.len(),
            });
        }
        Ok(Self(SecretBox::new(bytes.into_boxed_slice())))
    }

    /// Decode a hex-encoded secret.
    ///
    /// # Errors
    ///
    /// Returns error if decoding fails or the secret is too short.
    pub fn from_hex(hex_secret: &str) -> Result<Self, SecretError> {
        Self::new(hex::decode(hex_secret.trim())?)
    }

    /// Generate a random 256-bit secret.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; MIN_SECRET_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(SecretBox::new(bytes.into_boxed_slice()))
    }

    /// Expose the secret bytes for key construction.
    #[must_use]
    pub fn expose(&self) -> &[u8] {
        self.0.expose_secret()
    }

    /// Hex-encode the secret. Only for printing freshly generated secrets.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.expose())
    }
}

impl std::fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningSecret([REDACTED])")
    }
}

impl std::fmt::Display for SigningSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

/// The access/refresh secret pair.
#[derive(Debug)]
pub struct SigningSecrets {
    /// Signs access tokens.
    pub access: SigningSecret,
    /// Signs refresh tokens. Never used on ordinary requests.
    pub refresh: SigningSecret,
}

impl SigningSecrets {
    /// Pair two secrets.
    ///
    /// # Errors
    ///
    /// Returns `SecretError::NotDistinct` if both secrets are byte-identical.
    pub fn new(access: SigningSecret, refresh: SigningSecret) -> Result<Self, SecretError> {
        if access.expose() == refresh.expose() {
            return Err(SecretError::NotDistinct);
        }
        Ok(Self { access, refresh })
    }

    /// Generate a fresh random pair.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            access: SigningSecret::generate(),
            refresh: SigningSecret::generate(),
        }
    }

    /// Resolve the pair from configuration.
    ///
    /// Missing secrets are generated for this process only, which invalidates
    /// all outstanding tokens on restart.
    ///
    /// # Errors
    ///
    /// Returns error if a configured secret is malformed or both are equal.
    pub fn resolve(config: &AuthConfig) -> Result<Self, SecretError> {
        let access = resolve_one(config.access_token_secret.as_deref(), "access")?;
        let refresh = resolve_one(config.refresh_token_secret.as_deref(), "refresh")?;
        Self::new(access, refresh)
    }
}

fn resolve_one(configured: Option<&str>, kind: &str) -> Result<SigningSecret, SecretError> {
    match configured {
        Some(hex_secret) => SigningSecret::from_hex(hex_secret),
        None => {
            tracing::warn!(kind, "No {kind} token secret configured, generated an ephemeral one");
            Ok(SigningSecret::generate())
        }
    }
}
