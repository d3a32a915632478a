use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use transit_network::config::{EnvironmentConfig, StorageBackend};
use transit_network::database::DatabaseConnection;
use transit_network::middleware::cors_layer;
use transit_network::repositories::{MemoryNetworkStore, NetworkStore, PgNetworkStore};
use transit_network::routes::create_router;
use transit_network::spatial::{MemoryGateway, PostgisGateway, SpatialQueryGateway};
use transit_network::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    // Configurar logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")))
        .init();

    let config = EnvironmentConfig::from_env()?;
    info!(environment = %config.environment, storage = ?config.storage, "starting transit network service");

    let (store, gateway): (Arc<dyn NetworkStore>, Arc<dyn SpatialQueryGateway>) = match config.storage {
        StorageBackend::Postgres => {
            let connection = match DatabaseConnection::new(&config.database()?).await {
                Ok(connection) => connection,
                Err(e) => {
                    error!("database connection failed: {:#}", e);
                    return Err(e);
                }
            };
            let pool = connection.pool().clone();
            (
                Arc::new(PgNetworkStore::new(pool.clone())),
                Arc::new(PostgisGateway::new(pool)),
            )
        }
        StorageBackend::Memory => {
            warn!("using the in-memory store over the sample road network, data is lost on shutdown");
            (Arc::new(MemoryNetworkStore::new()), Arc::new(MemoryGateway::sample_network()))
        }
    };

    let state = AppState::new(config.network.clone(), store, gateway);
    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_origins));

    let addr: SocketAddr = config.server_url().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl+C received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
    }
}
