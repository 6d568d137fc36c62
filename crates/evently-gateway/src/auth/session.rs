//! Registration, login and the refresh-token lifecycle.

use axum::http::HeaderValue;
use evently_core::UserId;
use evently_core::validation::{
    normalize_email, require_field, require_password, validate_phone_number,
};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::AuthError;
use super::jwt::{TokenError, TokenPair};
use super::middleware::{ACCESS_COOKIE_NAME, AuthState, REFRESH_COOKIE_NAME};
use super::password::{hash_password_blocking, verify_password_blocking};
use super::users::{PublicUser, Role, User};

/// Registration payload. Cleared from memory on drop.
#[derive(Debug, Default, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Plaintext password.
    #[serde(default)]
    pub password: Option<String>,
    /// Ten-digit phone number.
    #[serde(default, alias = "phoneNo")]
    pub phone_number: Option<String>,
    /// Role code ("0", "1" or "2").
    #[serde(default)]
    pub role: Option<String>,
}

/// Login payload. Cleared from memory on drop.
#[derive(Debug, Default, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct LoginRequest {
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Plaintext password.
    #[serde(default)]
    pub password: Option<String>,
}

/// Refresh payload, for clients that do not send cookies.
#[derive(Debug, Default, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    /// Refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// An issued session: token pair plus the sanitized identity.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Issued tokens.
    #[serde(flatten)]
    pub tokens: TokenPair,
    /// The identity the tokens belong to.
    pub user: PublicUser,
}

impl AuthState {
    /// Register a new identity.
    ///
    /// # Errors
    ///
    /// Returns a validation error for missing or malformed fields,
    /// `AuthError::EmailTaken` if the email is registered, or an internal error.
    pub async fn register(&self, request: &RegisterRequest) -> Result<PublicUser, AuthError> {
        let email = normalize_email(require_field("email", request.email.as_deref())?)?;
        let password = require_password(request.password.as_deref())?;
        let phone_number =
            validate_phone_number(require_field("phoneNumber", request.phone_number.as_deref())?)?;
        let role: Role = require_field("role", request.role.as_deref())?.parse()?;

        // Pre-check only; create() enforces uniqueness
        if self.users.get_by_email(&email)?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = hash_password_blocking(Zeroizing::new(password.to_string())).await?;
        let user = User::with_hash(email, password_hash, phone_number, role);
        self.users.create(&user)?;

        tracing::info!(user_id = %user.id, role = %user.role, "Registered identity");
        Ok(user.to_public())
    }

    /// Authenticate with email and password and open a session.
    ///
    /// Unknown email and wrong password are indistinguishable to the caller.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials`, `AuthError::RateLimited`,
    /// a validation error, or an internal error.
    pub async fn login(&self, request: &LoginRequest) -> Result<Session, AuthError> {
        let raw_email = require_field("email", request.email.as_deref())?;
        let password = require_password(request.password.as_deref())?;

        // A malformed email cannot belong to anyone
        let email = normalize_email(raw_email).ok();

        // Every spelling of one address draws on the same quota
        if !self.limiter.check(email.as_deref().unwrap_or(raw_email)) {
            tracing::warn!("Login rate limit exceeded");
            return Err(AuthError::RateLimited);
        }

        let user = match email {
            Some(email) => self.users.get_by_email(&email)?,
            None => None,
        };

        let password = Zeroizing::new(password.to_string());
        let Some(user) = user else {
            // Match the timing of the known-email path
            let _ = verify_password_blocking(password, self.dummy_hash.clone()).await?;
            tracing::debug!("Login failed");
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password_blocking(password, user.password_hash().to_string()).await? {
            tracing::debug!(user_id = %user.id, "Login failed");
            return Err(AuthError::InvalidCredentials);
        }

        let session = self.issue_session(&user)?;
        tracing::info!(user_id = %user.id, "Login succeeded");
        Ok(session)
    }

    /// Mint a token pair and record the refresh token on the identity,
    /// replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns error if signing or storage fails.
    pub fn issue_session(&self, user: &User) -> Result<Session, AuthError> {
        let tokens = self
            .jwt
            .create_token_pair(&user.id, &user.email, user.role)?;
        self.users
            .set_refresh_token(&user.id, Some(tokens.refresh_token.clone()))?;

        let user = self
            .users
            .get_public(&user.id)?
            .ok_or_else(|| AuthError::NotFound("User".to_string()))?;

        Ok(Session { tokens, user })
    }

    /// Exchange a refresh token for a new pair. The presented token must be
    /// the one currently stored on the identity; the pair is rotated.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Expired` or `TokenError::Invalid`, or an internal error.
    pub fn refresh(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let claims = self.jwt.verify_refresh(refresh_token)?;

        let Some(user) = self.users.get(&UserId::new(claims.sub))? else {
            return Err(TokenError::Invalid.into());
        };

        let matches = user
            .refresh_token()
            .is_some_and(|stored| bool::from(stored.as_bytes().ct_eq(refresh_token.as_bytes())));
        if !matches {
            tracing::warn!(user_id = %user.id, "Refresh token does not match stored token");
            return Err(TokenError::Invalid.into());
        }

        let session = self.issue_session(&user)?;
        tracing::debug!(user_id = %user.id, "Rotated refresh token");
        Ok(session)
    }

    /// End the identity's session by clearing its stored refresh token.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn logout(&self, user_id: &UserId) -> Result<(), AuthError> {
        self.users.set_refresh_token(user_id, None)?;
        tracing::info!(user_id = %user_id, "Logged out");
        Ok(())
    }

    /// Load the sanitized identity for an authenticated request.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotFound` if the identity was deleted.
    pub fn current_user(&self, user_id: &UserId) -> Result<PublicUser, AuthError> {
        self.users
            .get_public(user_id)?
            .ok_or_else(|| AuthError::NotFound("User".to_string()))
    }

    /// `Set-Cookie` values carrying a session's tokens.
    ///
    /// # Errors
    ///
    /// Returns error if a token is not a valid header value.
    pub fn session_cookies(&self, tokens: &TokenPair) -> Result<[HeaderValue; 2], AuthError> {
        Ok([
            self.cookie(
                ACCESS_COOKIE_NAME,
                &tokens.access_token,
                self.jwt.access_expiry().as_secs(),
            )?,
            self.cookie(
                REFRESH_COOKIE_NAME,
                &tokens.refresh_token,
                self.jwt.refresh_expiry().as_secs(),
            )?,
        ])
    }

    /// `Set-Cookie` values expiring both session cookies.
    ///
    /// # Errors
    ///
    /// Returns error if a cookie is not a valid header value.
    pub fn clear_cookies(&self) -> Result<[HeaderValue; 2], AuthError> {
        Ok([
            self.cookie(ACCESS_COOKIE_NAME, "", 0)?,
            self.cookie(REFRESH_COOKIE_NAME, "", 0)?,
        ])
    }

    fn cookie(&self, name: &str, value: &str, max_age: u64) -> Result<HeaderValue, AuthError> {
        let secure = if self.config.secure_cookies { "; Secure" } else { "" };
        HeaderValue::from_str(&format!(
            "{name}={value}; HttpOnly{secure}; SameSite=Strict; Path=/; Max-Age={max_age}"
        ))
        .map_err(|e| AuthError::Crypto(format!("Invalid cookie value: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{JwtManager, UserStore};
    use evently_core::{AuthConfig, SigningSecrets, ValidationError};
    use std::time::Duration;
    use tempfile::TempDir;

    fn state(dir: &TempDir) -> AuthState {
        let jwt = JwtManager::new(
            &SigningSecrets::generate(),
            Duration::from_secs(900),
            Duration::from_secs(86400),
        );
        let users = UserStore::open(dir.path()).unwrap();
        AuthState::new(AuthConfig::default(), jwt, users).unwrap()
    }

    fn register_request(email: &str, role: &str) -> RegisterRequest {
        RegisterRequest {
            email: Some(email.to_string()),
            password: Some("secret123".to_string()),
            phone_number: Some("1234567890".to_string()),
            role: Some(role.to_string()),
        }
    }

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        }
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);

        let user = state
            .register(&register_request("A@B.com", "1"))
            .await
            .unwrap();
        assert_eq!(user.email, "a@b.com");
        assert_eq!(user.role, Role::Organizer);

        let session = state
            .login(&login_request("a@b.com", "secret123"))
            .await
            .unwrap();
        assert_eq!(session.user.id, user.id);
        assert_ne!(session.tokens.access_token, session.tokens.refresh_token);

        let stored = state.users.get(&user.id).unwrap().unwrap();
        assert_eq!(stored.refresh_token(), Some(session.tokens.refresh_token.as_str()));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);

        let mut missing = register_request("a@b.com", "1");
        missing.password = None;
        assert!(matches!(
            state.register(&missing).await,
            Err(AuthError::Validation(ValidationError::MissingField(_)))
        ));

        let mut bad_phone = register_request("a@b.com", "1");
        bad_phone.phone_number = Some("12345".to_string());
        assert!(matches!(
            state.register(&bad_phone).await,
            Err(AuthError::Validation(ValidationError::InvalidPhoneNumber))
        ));

        assert!(matches!(
            state.register(&register_request("a@b.com", "7")).await,
            Err(AuthError::Validation(ValidationError::InvalidRole(_)))
        ));

        assert!(matches!(
            state.register(&register_request("not-an-email", "1")).await,
            Err(AuthError::Validation(ValidationError::InvalidEmail))
        ));

        assert!(state.users.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_registration() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);

        state
            .register(&register_request("a@b.com", "1"))
            .await
            .unwrap();
        assert!(matches!(
            state.register(&register_request("a@b.com", "2")).await,
            Err(AuthError::EmailTaken)
        ));
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);
        state
            .register(&register_request("a@b.com", "2"))
            .await
            .unwrap();

        let wrong_password = state
            .login(&login_request("a@b.com", "wrong"))
            .await
            .unwrap_err();
        let unknown_email = state
            .login(&login_request("nobody@b.com", "secret123"))
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, AuthError::InvalidCredentials));
        assert!(matches!(unknown_email, AuthError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn test_login_rate_limited() {
        let dir = TempDir::new().unwrap();
        let jwt = JwtManager::new(
            &SigningSecrets::generate(),
            Duration::from_secs(900),
            Duration::from_secs(86400),
        );
        let config = AuthConfig::builder().login_attempts_per_minute(2).build();
        let state = AuthState::new(config, jwt, UserStore::open(dir.path()).unwrap()).unwrap();

        for _ in 0..2 {
            let _ = state.login(&login_request("a@b.com", "x")).await;
        }
        assert!(matches!(
            state.login(&login_request("a@b.com", "x")).await,
            Err(AuthError::RateLimited)
        ));
    }

    #[tokio::test]
    async fn test_rate_limit_covers_equivalent_spellings() {
        let dir = TempDir::new().unwrap();
        let jwt = JwtManager::new(
            &SigningSecrets::generate(),
            Duration::from_secs(900),
            Duration::from_secs(86400),
        );
        let config = AuthConfig::builder().login_attempts_per_minute(2).build();
        let state = AuthState::new(config, jwt, UserStore::open(dir.path()).unwrap()).unwrap();
        state
            .register(&register_request("a@b.com", "2"))
            .await
            .unwrap();

        for _ in 0..2 {
            let _ = state.login(&login_request("a@b.com", "wrong")).await;
        }

        // Full-width forms normalize to the same address and share its quota
        for email in [
            "\u{ff41}@b.com",
            "a@\u{ff42}.com",
            "a\u{ff20}b.com",
            "\u{ff41}@\u{ff42}.com",
            "A@B.COM",
        ] {
            assert!(
                matches!(
                    state.login(&login_request(email, "secret123")).await,
                    Err(AuthError::RateLimited)
                ),
                "{email} bypassed the limit"
            );
        }
    }

    #[tokio::test]
    async fn test_password_whitespace_is_significant() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);

        let mut request = register_request("a@b.com", "2");
        request.password = Some("  secret123  ".to_string());
        state.register(&request).await.unwrap();

        assert!(matches!(
            state.login(&login_request("a@b.com", "secret123")).await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(
            state
                .login(&login_request("a@b.com", "  secret123  "))
                .await
                .is_ok()
        );

        // Identities created outside HTTP hash the exact same string
        let user = User::new("c@d.com", " pw ", "1234567890", Role::Standard).unwrap();
        state.users.create(&user).unwrap();
        assert!(state.login(&login_request("c@d.com", " pw ")).await.is_ok());
        assert!(matches!(
            state.login(&login_request("c@d.com", "pw")).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_blank_password_is_missing() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);

        let mut request = register_request("a@b.com", "2");
        request.password = Some("   ".to_string());
        assert!(matches!(
            state.register(&request).await,
            Err(AuthError::Validation(ValidationError::MissingField(f))) if f == "password"
        ));
    }

    #[tokio::test]
    async fn test_refresh_rotates() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);
        state
            .register(&register_request("a@b.com", "2"))
            .await
            .unwrap();
        let first = state
            .login(&login_request("a@b.com", "secret123"))
            .await
            .unwrap();

        let second = state.refresh(&first.tokens.refresh_token).unwrap();
        assert_ne!(second.tokens.refresh_token, first.tokens.refresh_token);

        // The superseded token no longer works
        assert!(matches!(
            state.refresh(&first.tokens.refresh_token),
            Err(AuthError::Token(TokenError::Invalid))
        ));
        assert!(state.refresh(&second.tokens.refresh_token).is_ok());
    }

    #[tokio::test]
    async fn test_access_token_is_not_a_refresh_token() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);
        state
            .register(&register_request("a@b.com", "2"))
            .await
            .unwrap();
        let session = state
            .login(&login_request("a@b.com", "secret123"))
            .await
            .unwrap();

        assert!(matches!(
            state.refresh(&session.tokens.access_token),
            Err(AuthError::Token(TokenError::Invalid))
        ));
    }

    #[tokio::test]
    async fn test_logout_revokes_refresh() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);
        let user = state
            .register(&register_request("a@b.com", "2"))
            .await
            .unwrap();
        let session = state
            .login(&login_request("a@b.com", "secret123"))
            .await
            .unwrap();

        state.logout(&user.id).unwrap();
        assert!(matches!(
            state.refresh(&session.tokens.refresh_token),
            Err(AuthError::Token(TokenError::Invalid))
        ));
    }

    #[test]
    fn test_cookie_flags() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);
        let user = User::with_hash("a@b.com", "hash".to_string(), "1234567890", Role::Standard);
        state.users.create(&user).unwrap();
        let session = state.issue_session(&user).unwrap();

        let [access, refresh] = state.session_cookies(&session.tokens).unwrap();
        let access = access.to_str().unwrap();
        assert!(access.starts_with("accessToken="));
        assert!(access.contains("HttpOnly"));
        assert!(access.contains("Secure"));
        assert!(access.contains("Max-Age=900"));
        assert!(refresh.to_str().unwrap().starts_with("refreshToken="));

        let [cleared, _] = state.clear_cookies().unwrap();
        assert!(cleared.to_str().unwrap().contains("Max-Age=0"));
    }
}
