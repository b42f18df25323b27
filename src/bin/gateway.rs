//! 网关入口：WebSocket 服务器（feature = "gateway"）

use std::sync::Arc;

use weaver::checkpoint::{CheckpointStore, MemoryCheckpointStore, SqliteCheckpointStore};
use weaver::config::{load_config, AppConfig};
use weaver::gateway::{router, GatewayState};
use weaver::runtime::create_llm_from_config;
use weaver::tools::{DatabaseBackend, SqliteDatabase};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    weaver::observability::init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    let llm = create_llm_from_config(&cfg);
    let checkpoints: Arc<dyn CheckpointStore> = match &cfg.checkpoint.db_path {
        Some(path) => Arc::new(SqliteCheckpointStore::new(path)?),
        None => Arc::new(MemoryCheckpointStore::new()),
    };
    let db: Arc<dyn DatabaseBackend> = match &cfg.database.path {
        Some(path) => Arc::new(SqliteDatabase::open(path).map_err(anyhow::Error::msg)?),
        None => Arc::new(SqliteDatabase::open_in_memory().map_err(anyhow::Error::msg)?),
    };

    let bind = cfg.gateway.bind.clone();
    let state = Arc::new(GatewayState {
        cfg,
        llm,
        db,
        checkpoints,
    });

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!("gateway listening on {}", bind);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
