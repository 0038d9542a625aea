use sessionmart::{
    build_router,
    config::{validate_production_config, AppConfig},
    db, identity_providers, role_handoff_store, AppState,
};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const PURGE_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "sessionmart=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    validate_production_config(&config)?;

    // Database connection
    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    let role_handoff = role_handoff_store(&pool, &config);
    let providers = identity_providers(&config)?;
    if providers.names().is_empty() {
        tracing::warn!("No identity provider configured; social login is disabled");
    } else {
        tracing::info!("Identity providers: {}", providers.names().join(", "));
    }

    let addr = config.bind_address();
    let state = AppState::new(pool, config, role_handoff, providers);

    spawn_purge_task(state.clone());

    let app = build_router(state);

    tracing::info!("Server running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically drops abandoned role handoffs and expired credentials.
fn spawn_purge_task(state: AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;

            match state.role_handoff.purge_expired().await {
                Ok(0) => {}
                Ok(n) => tracing::debug!("Purged {} expired role handoffs", n),
                Err(e) => tracing::warn!("Role handoff purge failed: {}", e),
            }

            match state.credential_service.cleanup_expired_tokens().await {
                Ok(0) => {}
                Ok(n) => tracing::debug!("Removed {} expired tokens", n),
                Err(e) => tracing::warn!("Token cleanup failed: {:#}", e),
            }
        }
    });
}
