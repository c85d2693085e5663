//! `filemesh-node`: boots storage, the coordinator, the session layer, and
//! the control API from one process.
//!
//! Usage: `filemesh-node [config.toml]`.

use filemesh::api::create_api_server;
use filemesh::config::Config;
use filemesh::coordinator::TransferCoordinator;
use filemesh::model::NodeId;
use filemesh::session::SessionManager;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;
    config.validate().map_err(anyhow::Error::msg)?;

    let node_id = NodeId::new(config.network.node_id.clone());
    tracing::info!(%node_id, data_dir = %config.storage.data_dir.display(), "starting filemesh node");

    if config.metrics.enabled {
        match config.metrics.listen_addr.parse() {
            Ok(addr) => {
                filemesh::metrics::start_metrics_server(filemesh::metrics::MetricsConfig {
                    listen_addr: addr,
                    ..Default::default()
                })?;
                tracing::info!(%addr, "metrics exporter listening");
            }
            Err(e) => tracing::warn!(addr = %config.metrics.listen_addr, error = %e, "invalid metrics listen_addr, skipping"),
        }
    }

    let store = Arc::new(
        filemesh::store::ChunkStore::open(&config.storage.data_dir, config.storage.enable_compression).await?,
    );
    let coordinator = Arc::new(TransferCoordinator::restore(store).await?);
    tracing::info!(active_transfers = coordinator.list_active().len(), "restored transfer state from disk");

    let sessions = Arc::new(SessionManager::new(node_id, coordinator.clone()));
    let bind_addr: SocketAddr = format!("{}:{}", config.network.host, config.network.port).parse()?;
    let bound = sessions.listen(bind_addr).await?;
    tracing::info!(%bound, "session layer listening");

    for seed in &config.network.seed_nodes {
        match seed.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = sessions.connect(addr).await {
                    tracing::warn!(%addr, error = %e, "failed to connect to seed node");
                }
            }
            Err(e) => tracing::warn!(seed = %seed, error = %e, "invalid seed node address, skipping"),
        }
    }

    let api = create_api_server(coordinator, sessions);
    let api_addr: SocketAddr = format!("{}:{}", config.network.host, config.network.api_port).parse()?;
    let listener = tokio::net::TcpListener::bind(api_addr).await?;
    tracing::info!(%api_addr, "control API listening");

    axum::serve(listener, api).await?;
    Ok(())
}
