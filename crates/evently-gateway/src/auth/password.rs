//! Credential store: salted one-way password hashing.
//!
//! Argon2id with fixed, module-wide cost parameters. The PHC output string
//! embeds the algorithm, parameters and a random salt, so two hashes of the
//! same password differ while both verify.
//!
//! Both operations are CPU-heavy. Async callers must run them on the
//! blocking pool (see [`hash_password_blocking`] and [`verify_password_blocking`]).

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use zeroize::Zeroizing;

use super::AuthError;

/// Memory cost in KiB.
pub const ARGON2_M_COST: u32 = 19 * 1024;
/// Iterations.
pub const ARGON2_T_COST: u32 = 2;
/// Lanes.
pub const ARGON2_P_COST: u32 = 1;

fn hasher() -> Result<Argon2<'static>, AuthError> {
    let params = Params::new(ARGON2_M_COST, ARGON2_T_COST, ARGON2_P_COST, None)
        .map_err(|e| AuthError::Crypto(format!("Invalid Argon2 parameters: {e}")))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::Crypto` if the hash primitive fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);

    hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Crypto(format!("Password hashing failed: {e}")))
}

/// Verify a password against a stored hash.
///
/// A mismatch returns `false`. A malformed stored hash is logged and also
/// returns `false`; it is never a panic.
#[must_use]
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is malformed");
            return false;
        }
    };

    // Parameters come from the PHC string, not from the hasher instance
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Hash on the blocking pool so request tasks are not stalled.
///
/// # Errors
///
/// Returns `AuthError::Crypto` if hashing fails or the blocking task panics.
pub async fn hash_password_blocking(password: Zeroizing<String>) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AuthError::Crypto(format!("Hashing task failed: {e}")))?
}

/// Verify on the blocking pool so request tasks are not stalled.
///
/// # Errors
///
/// Returns `AuthError::Crypto` only if the blocking task panics.
pub async fn verify_password_blocking(
    password: Zeroizing<String>,
    hash: String,
) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AuthError::Crypto(format!("Verification task failed: {e}")))
}
