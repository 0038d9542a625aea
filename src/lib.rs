pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod services;

// Make test_utils available for both unit tests and integration tests
pub mod test_utils;

use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, patch, post},
    Router,
};
use config::{AppConfig, HandoffBackend};
use repositories::{
    SqliteBookingRepository, SqliteSessionRepository, SqliteSocialAccountRepository,
    SqliteUserRepository,
};
use services::{
    AuthService, BookingService, CredentialService, HttpIdentityProvider, IdentityProviderRegistry,
    InMemoryRoleHandoffStore, OAuthCompletion, ProviderConfig, RoleHandoffStore, SessionService,
    SqliteRoleHandoffStore, UserService,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub user_service: Arc<UserService>,
    pub auth_service: Arc<AuthService>,
    pub credential_service: Arc<CredentialService>,
    pub session_service: Arc<SessionService>,
    pub booking_service: Arc<BookingService>,
    pub role_handoff: Arc<dyn RoleHandoffStore>,
    pub oauth_completion: Arc<OAuthCompletion>,
    pub identity_providers: IdentityProviderRegistry,
    pub pool: SqlitePool,
}

impl AppState {
    /// Wires the SQLite-backed services around `pool`.
    pub fn new(
        pool: SqlitePool,
        config: AppConfig,
        role_handoff: Arc<dyn RoleHandoffStore>,
        identity_providers: IdentityProviderRegistry,
    ) -> Self {
        let user_repository = Arc::new(SqliteUserRepository::new(pool.clone()));
        let social_repository = Arc::new(SqliteSocialAccountRepository::new(pool.clone()));
        let session_repository = Arc::new(SqliteSessionRepository::new(pool.clone()));
        let booking_repository = Arc::new(SqliteBookingRepository::new(pool.clone()));

        let credential_service = Arc::new(CredentialService::new(
            pool.clone(),
            config.access_token_ttl,
            config.refresh_token_ttl,
        ));
        let session_service = Arc::new(SessionService::new(
            session_repository.clone(),
            user_repository.clone(),
        ));
        let booking_service = Arc::new(BookingService::new(
            booking_repository,
            session_repository,
            user_repository.clone(),
            session_service.clone(),
        ));
        let oauth_completion = Arc::new(OAuthCompletion::new(
            role_handoff.clone(),
            user_repository.clone(),
            credential_service.clone(),
            config.frontend_login_url.clone(),
        ));

        Self {
            user_service: Arc::new(UserService::new(user_repository.clone(), social_repository)),
            auth_service: Arc::new(AuthService::new(user_repository)),
            credential_service,
            session_service,
            booking_service,
            role_handoff,
            oauth_completion,
            identity_providers,
            config: Arc::new(config),
            pool,
        }
    }
}

/// Picks the handoff backend named in the configuration.
pub fn role_handoff_store(pool: &SqlitePool, config: &AppConfig) -> Arc<dyn RoleHandoffStore> {
    match config.handoff_backend {
        HandoffBackend::Database => {
            Arc::new(SqliteRoleHandoffStore::new(pool.clone(), config.handoff_ttl))
        }
        HandoffBackend::Memory => Arc::new(InMemoryRoleHandoffStore::new(config.handoff_ttl)),
    }
}

/// Registers every provider that has client credentials configured.
pub fn identity_providers(
    config: &AppConfig,
) -> Result<IdentityProviderRegistry, services::IdentityProviderError> {
    let mut registry = IdentityProviderRegistry::new();

    if let Some(google) = &config.google {
        let provider = HttpIdentityProvider::new(ProviderConfig::google(
            google.client_id.clone(),
            google.client_secret.clone(),
            config.oauth_redirect_uri("google"),
        ))?;
        registry.register(Arc::new(provider));
    }

    if let Some(github) = &config.github {
        let provider = HttpIdentityProvider::new(ProviderConfig::github(
            github.client_id.clone(),
            github.client_secret.clone(),
            config.oauth_redirect_uri("github"),
        ))?;
        registry.register(Arc::new(provider));
    }

    Ok(registry)
}

pub fn build_router(state: AppState) -> Router {
    // Routes that need a bearer access token
    let protected_routes = Router::new()
        .route(
            "/api/users/me/",
            get(handlers::get_profile).patch(handlers::update_profile),
        )
        .route("/api/sessions/create/", post(handlers::create_session))
        .route(
            "/api/sessions/{id}/update/",
            patch(handlers::update_session).put(handlers::update_session),
        )
        .route(
            "/api/sessions/{id}/delete/",
            delete(handlers::delete_session),
        )
        .route("/api/bookings/create/", post(handlers::create_booking))
        .route(
            "/api/bookings/{id}/delete/",
            delete(handlers::delete_booking),
        )
        .route("/api/bookings/my/", get(handlers::my_bookings))
        // Unmatched paths fall through to 404 instead of the auth check
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/auth/set-role/", post(handlers::set_role))
        .route("/api/auth/registration/", post(handlers::register))
        .route("/api/token/", post(handlers::obtain_token))
        .route("/api/token/refresh/", post(handlers::refresh_token))
        .route("/api/token/verify/", post(handlers::verify_token))
        .route(
            "/accounts/{provider}/login/",
            get(handlers::provider_login),
        )
        .route(
            "/accounts/{provider}/login/callback/",
            get(handlers::provider_callback),
        )
        .route("/api/sessions/", get(handlers::list_sessions))
        .route("/api/sessions/{id}/", get(handlers::get_session))
        .route(
            "/api/sessions/{id}/bookings/",
            get(handlers::list_session_bookings),
        );

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service("/media", ServeDir::new(&state.config.media_root))
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            add_security_headers,
        ))
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Authorization header must be listed explicitly (not covered by wildcard)
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .max_age(std::time::Duration::from_secs(3600))
}

async fn add_security_headers(
    axum::extract::State(config): axum::extract::State<Arc<AppConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    if config.is_production() {
        headers.insert(
            "Strict-Transport-Security",
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }

    response
}
