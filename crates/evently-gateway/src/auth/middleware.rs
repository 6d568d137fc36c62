//! Session authentication for axum.

use std::path::Path;
use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{
        HeaderMap, StatusCode,
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use evently_core::{AuthConfig, UserId};
use rand::{Rng, distributions::Alphanumeric};
use serde::Serialize;

use super::AuthError;
use super::jwt::{JwtManager, TokenError};
use super::password::hash_password;
use super::users::{PublicUser, UserStore};
use crate::middleware::LoginRateLimiter;

/// Cookie carrying the access token.
pub const ACCESS_COOKIE_NAME: &str = "accessToken";
/// Cookie carrying the refresh token.
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Shared authentication state.
pub struct AuthState {
    /// Auth configuration.
    pub config: AuthConfig,
    /// JWT manager.
    pub jwt: JwtManager,
    /// User store.
    pub users: UserStore,
    /// Login attempt limiter.
    pub limiter: LoginRateLimiter,
    /// Hash verified against when the login email is unknown.
    pub(super) dummy_hash: String,
}

impl AuthState {
    /// Create a new auth state.
    ///
    /// # Errors
    ///
    /// Returns error if the placeholder hash cannot be computed.
    pub fn new(config: AuthConfig, jwt: JwtManager, users: UserStore) -> Result<Self, AuthError> {
        let placeholder: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let dummy_hash = hash_password(&placeholder)?;
        let limiter = LoginRateLimiter::new(config.login_attempts_per_minute);

        Ok(Self {
            config,
            jwt,
            users,
            limiter,
            dummy_hash,
        })
    }

    /// Initialize auth state from configuration, opening the store in `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the store cannot be opened.
    pub fn initialize(config: AuthConfig, data_dir: &Path) -> Result<Self, AuthError> {
        config
            .validate()
            .map_err(|e| AuthError::Config(e.to_string()))?;

        let users = UserStore::open(data_dir)?;
        let jwt = JwtManager::from_config(&config)?;

        tracing::info!(
            users = users.count(),
            access_expiry_secs = jwt.access_expiry().as_secs(),
            refresh_expiry_secs = jwt.refresh_expiry().as_secs(),
            "Auth initialized"
        );

        Self::new(config, jwt, users)
    }

    /// Authenticate a request from its headers.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Missing`, `Expired` or `Invalid`. A token whose
    /// identity no longer exists is `Invalid`.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<AuthContext, AuthError> {
        let token = extract_token(headers).ok_or(TokenError::Missing)?;
        let claims = self.jwt.verify_access(&token)?;

        let user = self
            .users
            .get_public(&UserId::new(claims.sub))?
            .ok_or_else(|| {
                tracing::debug!("Token subject no longer exists");
                TokenError::Invalid
            })?;

        Ok(AuthContext::new(user))
    }
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("config", &self.config)
            .field("user_count", &self.users.count())
            .finish_non_exhaustive()
    }
}

/// Read a named cookie from all `Cookie` headers.
pub(crate) fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for value in headers.get_all(COOKIE) {
        let Ok(s) = value.to_str() else { continue };
        for part in s.split(';') {
            match part.trim().split_once('=') {
                Some((k, v)) if k == name && !v.is_empty() => return Some(v.to_string()),
                _ => {}
            }
        }
    }
    None
}

/// Extract the candidate access token. The cookie takes precedence over the
/// `Authorization: Bearer` header.
#[must_use]
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = parse_cookie(headers, ACCESS_COOKIE_NAME) {
        return Some(token);
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(JwtManager::extract_from_header)
        .map(ToString::to_string)
}

/// Middleware for protected routes: authenticates and attaches [`AuthContext`].
///
/// # Errors
///
/// Rejects with 401 if authentication fails.
pub async fn require_auth(
    State(auth): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let ctx = auth.authenticate(request.headers())?;
    tracing::debug!(user_id = %ctx.user_id, "Authenticated request");

    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}

/// The authenticated identity for the current request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Identity ID.
    pub user_id: UserId,
    /// Sanitized identity, loaded fresh for this request.
    pub user: PublicUser,
}

impl AuthContext {
    /// Wrap a loaded identity.
    #[must_use]
    pub fn new(user: PublicUser) -> Self {
        Self {
            user_id: user.id.clone(),
            user,
        }
    }
}

impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().cloned().ok_or_else(|| {
            tracing::error!(path = %parts.uri.path(), "Handler requires auth but require_auth is not mounted");
            AuthError::MissingContext
        })
    }
}

/// Error response for auth failures.
#[derive(Debug, Serialize)]
struct AuthErrorResponse {
    success: bool,
    error: String,
    code: &'static str,
}

impl AuthError {
    /// HTTP status and stable machine-readable code.
    #[must_use]
    pub const fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            Self::MalformedBody(_) => (StatusCode::BAD_REQUEST, "malformed_body"),
            Self::EmailTaken => (StatusCode::BAD_REQUEST, "email_taken"),
            Self::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
            Self::Token(TokenError::Missing) => (StatusCode::UNAUTHORIZED, "missing_token"),
            Self::Token(TokenError::Expired) => (StatusCode::UNAUTHORIZED, "token_expired"),
            Self::Token(TokenError::Invalid) => (StatusCode::UNAUTHORIZED, "invalid_token"),
            Self::PermissionDenied(_) => (StatusCode::FORBIDDEN, "permission_denied"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Self::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
            Self::MissingContext | Self::Storage(_) | Self::Crypto(_) | Self::Config(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let error = if self.is_internal() {
            tracing::error!(error = %self, "Internal error while handling request");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = AuthErrorResponse {
            success: false,
            error,
            code,
        };

        (status, Json(body)).into_response()
    }
}
