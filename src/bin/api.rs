use dotenvy::dotenv;
use std::error::Error;
use std::sync::Arc;
use tracing::{info, warn};

use eduflow_erp::{
    api::{AppState, router},
    auth::TokenKeys,
    config::{AppConfig, BackendConfig},
    db::connect_pool,
    logging::init_tracing,
    services::{Backend, memory::InMemoryBackend, postgres::PgBackend},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    let backend: Arc<dyn Backend> = match &config.backend {
        BackendConfig::Postgres(db) => {
            let pool = connect_pool(db)?;
            info!(max_connections = db.max_connections, "using postgres backend");
            Arc::new(PgBackend::new(pool))
        }
        BackendConfig::Memory => {
            warn!("using in-memory backend with sample data; changes are not persisted");
            Arc::new(InMemoryBackend::new_with_sample()?)
        }
    };

    let keys = TokenKeys::new(&config.jwt_secret, config.jwt_ttl);
    let state = AppState::new(backend, keys, config.rejection_mode);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(rejection_mode = ?config.rejection_mode, "API listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install Ctrl+C handler");
        }
    }
    info!("shutdown signal received");
}
