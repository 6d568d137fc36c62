//! Gateway server.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{FromRef, Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    middleware,
    response::{AppendHeaders, IntoResponse},
    routing::{get, post, put},
};
use evently_core::{AuthConfig, EventId, UserId};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::GatewayError;
use crate::auth::{
    AuthContext, AuthError, AuthState, LoginRequest, REFRESH_COOKIE_NAME, RefreshRequest,
    RegisterRequest, Requirement, Role, TokenError, authorize, require_auth,
};
use crate::events::{Event, EventStore, EventUpdate, NewEvent};

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Port to listen on.
    pub port: u16,
    /// Bind address.
    pub bind_address: String,
    /// Enable CORS.
    pub cors: bool,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Data directory for persistent storage.
    pub data_dir: PathBuf,
    /// Authentication configuration.
    pub auth: AuthConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            bind_address: "127.0.0.1".to_string(),
            cors: true,
            timeout_secs: 30,
            data_dir: evently_core::Config::data_dir(),
            auth: AuthConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Derive the server configuration from the file configuration.
    #[must_use]
    pub fn from_config(config: &evently_core::Config) -> Self {
        Self {
            port: config.gateway.port,
            bind_address: config.gateway.bind_address(),
            cors: config.gateway.cors,
            timeout_secs: config.gateway.timeout_secs,
            data_dir: evently_core::Config::data_dir(),
            auth: config.auth.clone(),
        }
    }
}

/// Gateway server state shared across handlers.
#[derive(Debug, Clone)]
pub struct GatewayState {
    /// Authentication state.
    pub auth: Arc<AuthState>,
    /// Event records.
    pub events: Arc<EventStore>,
}

impl FromRef<GatewayState> for Arc<AuthState> {
    fn from_ref(state: &GatewayState) -> Self {
        state.auth.clone()
    }
}

/// Gateway server.
#[derive(Debug)]
pub struct Gateway {
    config: GatewayConfig,
    state: GatewayState,
}

/// Builder for constructing a Gateway with its dependencies.
#[derive(Debug, Default)]
pub struct GatewayBuilder {
    config: GatewayConfig,
    auth_state: Option<Arc<AuthState>>,
    event_store: Option<Arc<EventStore>>,
}

impl GatewayBuilder {
    /// Create a new builder with default config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set gateway configuration.
    #[must_use]
    pub fn with_config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the auth state.
    #[must_use]
    pub fn with_auth_state(mut self, auth: Arc<AuthState>) -> Self {
        self.auth_state = Some(auth);
        self
    }

    /// Set the event store.
    #[must_use]
    pub fn with_event_store(mut self, store: Arc<EventStore>) -> Self {
        self.event_store = Some(store);
        self
    }

    /// Build the gateway. The auth configuration is used as given; environment
    /// overrides belong to the caller.
    ///
    /// # Errors
    ///
    /// Returns error if auth initialization fails or the stores cannot be opened.
    pub fn build(self) -> Result<Gateway, GatewayError> {
        let auth = match self.auth_state {
            Some(auth) => auth,
            None => {
                std::fs::create_dir_all(&self.config.data_dir).map_err(|e| {
                    GatewayError::Config(format!("Failed to create data dir: {e}"))
                })?;

                Arc::new(
                    AuthState::initialize(self.config.auth.clone(), &self.config.data_dir)
                        .map_err(|e| GatewayError::Config(format!("Auth init failed: {e}")))?,
                )
            }
        };

        let events = match self.event_store {
            Some(store) => store,
            None => Arc::new(
                EventStore::with_db(auth.users.db())
                    .map_err(|e| GatewayError::Server(format!("Failed to open event store: {e}")))?,
            ),
        };

        Ok(Gateway {
            config: self.config,
            state: GatewayState { auth, events },
        })
    }
}

impl Gateway {
    /// Create a new gateway from configuration alone.
    ///
    /// # Errors
    ///
    /// Returns error if initialization fails.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        GatewayBuilder::new().with_config(config).build()
    }

    /// Shared handler state.
    #[must_use]
    pub const fn state(&self) -> &GatewayState {
        &self.state
    }

    /// Build the HTTP router.
    #[must_use]
    pub fn router(&self) -> Router {
        router(
            self.state.clone(),
            self.config.cors,
            Duration::from_secs(self.config.timeout_secs),
        )
    }

    /// Run the gateway server until interrupted.
    ///
    /// # Errors
    ///
    /// Returns error if the address is invalid or the listener fails.
    pub async fn run(&self) -> Result<(), GatewayError> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| GatewayError::Config(format!("Invalid address: {e}")))?;

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Gateway API listening on http://{}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| GatewayError::Server(e.to_string()))?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Build the API router over the given state.
pub fn router(state: GatewayState, cors: bool, timeout: Duration) -> Router {
    let public = Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/users/register", post(register_handler))
        .route("/api/v1/users/login", post(login_handler))
        .route("/api/v1/users/refresh", post(refresh_handler))
        .route("/api/v1/events/all", get(list_events_handler))
        .route("/api/v1/events/user/{user_id}", get(list_user_events_handler));

    let protected = Router::new()
        .route("/api/v1/users/me", get(me_handler))
        .route("/api/v1/users/logout", post(logout_handler))
        .route("/api/v1/events", post(create_event_handler))
        .route(
            "/api/v1/events/{id}",
            put(update_event_handler).delete(delete_event_handler),
        )
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            require_auth,
        ));

    let app = public
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(timeout)),
        )
        .with_state(state);

    if cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Success envelope.
#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(message: &'static str, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message,
            data: Some(data),
        })
    }
}

fn message(message: &'static str) -> Json<ApiResponse<()>> {
    Json(ApiResponse {
        success: true,
        message,
        data: None,
    })
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AuthError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AuthError::MalformedBody(rejection.body_text()))
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn register_handler(
    State(state): State<GatewayState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AuthError> {
    let request = json_body(body)?;
    let user = state.auth.register(&request).await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok("User registered successfully", user),
    ))
}

async fn login_handler(
    State(state): State<GatewayState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AuthError> {
    let request = json_body(body)?;
    let session = state.auth.login(&request).await?;
    let [access, refresh] = state.auth.session_cookies(&session.tokens)?;

    Ok((
        AppendHeaders([(SET_COOKIE, access), (SET_COOKIE, refresh)]),
        ApiResponse::ok("User logged in successfully", session),
    ))
}

async fn refresh_handler(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AuthError> {
    let from_body = if body.is_empty() {
        RefreshRequest::default()
    } else {
        serde_json::from_slice::<RefreshRequest>(&body)
            .map_err(|e| AuthError::MalformedBody(e.to_string()))?
    };

    let token = crate::auth::parse_cookie(&headers, REFRESH_COOKIE_NAME)
        .or_else(|| from_body.refresh_token.clone())
        .ok_or(TokenError::Missing)?;

    let session = state.auth.refresh(&token)?;
    let [access, refresh] = state.auth.session_cookies(&session.tokens)?;

    Ok((
        AppendHeaders([(SET_COOKIE, access), (SET_COOKIE, refresh)]),
        ApiResponse::ok("Access token refreshed", session),
    ))
}

async fn logout_handler(
    State(state): State<GatewayState>,
    ctx: AuthContext,
) -> Result<impl IntoResponse, AuthError> {
    state.auth.logout(&ctx.user_id)?;
    let [access, refresh] = state.auth.clear_cookies()?;

    Ok((
        AppendHeaders([(SET_COOKIE, access), (SET_COOKIE, refresh)]),
        message("User logged out"),
    ))
}

async fn me_handler(
    State(state): State<GatewayState>,
    ctx: AuthContext,
) -> Result<impl IntoResponse, AuthError> {
    let user = state.auth.current_user(&ctx.user_id)?;
    Ok(ApiResponse::ok("User data fetched successfully", user))
}

async fn create_event_handler(
    State(state): State<GatewayState>,
    ctx: AuthContext,
    body: Result<Json<NewEvent>, JsonRejection>,
) -> Result<impl IntoResponse, AuthError> {
    authorize(Some(&ctx), &Requirement::Role(Role::Organizer))?;

    let input = json_body(body)?;
    let event = Event::new(&input, ctx.user_id)?;
    state.events.create(&event)?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok("Event created successfully", event),
    ))
}

/// Role first, then existence, then ownership.
fn load_owned_event(
    state: &GatewayState,
    ctx: &AuthContext,
    id: &EventId,
) -> Result<Event, AuthError> {
    authorize(Some(ctx), &Requirement::Role(Role::Organizer))?;

    let event = state
        .events
        .get(id)?
        .ok_or_else(|| AuthError::NotFound("Event".to_string()))?;

    authorize(
        Some(ctx),
        &Requirement::Owner {
            role: Role::Organizer,
            owner_id: event.owner_id.clone(),
        },
    )?;

    Ok(event)
}

async fn update_event_handler(
    State(state): State<GatewayState>,
    ctx: AuthContext,
    Path(id): Path<String>,
    body: Result<Json<EventUpdate>, JsonRejection>,
) -> Result<impl IntoResponse, AuthError> {
    let mut event = load_owned_event(&state, &ctx, &EventId::new(id))?;

    let update = json_body(body)?;
    event.apply(&update)?;
    state.events.update(&event)?;

    Ok(ApiResponse::ok("Event updated successfully", event))
}

async fn delete_event_handler(
    State(state): State<GatewayState>,
    ctx: AuthContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AuthError> {
    let event = load_owned_event(&state, &ctx, &EventId::new(id))?;
    state.events.delete(&event.id)?;
    tracing::info!(event_id = %event.id, user_id = %ctx.user_id, "Deleted event");

    Ok(message("Event deleted successfully"))
}

async fn list_events_handler(
    State(state): State<GatewayState>,
) -> Result<impl IntoResponse, AuthError> {
    let events = state.events.list()?;
    Ok(ApiResponse::ok("All events fetched successfully", events))
}

async fn list_user_events_handler(
    State(state): State<GatewayState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AuthError> {
    let events = state.events.list_by_owner(&UserId::new(user_id))?;
    Ok(ApiResponse::ok("Events fetched successfully", events))
}
