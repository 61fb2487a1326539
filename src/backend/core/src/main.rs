//! TeachTrack Server - Main entry point

use std::sync::Arc;

use teachtrack_core::{
    api::{self, AppState},
    auth::{Argon2Hasher, AuthTokenService},
    cache::ReadThroughCache,
    config::Config,
    services::Services,
    store::PgStore,
    telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = match std::env::var("TEACHTRACK_CONFIG") {
        Ok(path) => Config::from_file(&path)?,
        Err(_) => Config::load()?,
    };

    let metrics = telemetry::init_telemetry(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting TeachTrack server"
    );

    // Store
    let store = Arc::new(PgStore::connect(&config.database).await?);
    if config.database.run_migrations {
        store.migrate().await?;
        tracing::info!("Database migrations applied");
    }
    tracing::info!("Connected to database");

    // Cache
    let cache = ReadThroughCache::connect(&config.cache, &config.redis).await?;
    tracing::info!(backend = cache.backend_name(), "Cache ready");

    // Services
    let tokens = Arc::new(AuthTokenService::from_settings(&config.auth)?);
    let services = Services::new(
        store.clone(),
        store,
        cache.clone(),
        tokens.clone(),
        Arc::new(Argon2Hasher::new()),
        config.pagination.clone(),
    );
    if let Some(bootstrap) = &config.bootstrap {
        services.bootstrap(bootstrap).await?;
    }

    let state = AppState::new(
        services,
        tokens,
        cache,
        metrics,
        config.tenant.base_domain_labels,
    );
    let app = api::build_router(state, &config.cors);

    let addr = config.bind_address();
    tracing::info!(address = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Wait for ctrl-c or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
