//! CLI 入口：逐行读任务，驱动编排器并打印进度与回答

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use weaver::checkpoint::{CheckpointStore, MemoryCheckpointStore, SqliteCheckpointStore};
use weaver::config::{load_config, AppConfig};
use weaver::core::OrchestratorEvent;
use weaver::runtime::{build_local_orchestrator, create_llm_from_config};
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

    let orchestrator = build_local_orchestrator(&cfg, llm, db, checkpoints);
    let thread_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(thread_id, "weaver ready, type a task (exit to quit)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let task = line.trim();
        if task.is_empty() {
            continue;
        }
        if task == "exit" || task == "quit" {
            break;
        }

        let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel();
        let printer = tokio::spawn(async move {
            while let Some(ev) = event_rx.recv().await {
                match ev {
                    OrchestratorEvent::PlanStep { id, tool, input, .. } => {
                        println!("  [plan] {id} = {tool}[{input}]");
                    }
                    OrchestratorEvent::Tool { id, tool, result } => {
                        println!("  [{tool}] {id} -> {result}");
                    }
                    OrchestratorEvent::Error { text } => eprintln!("  [error] {text}"),
                    _ => {}
                }
            }
        });

        match orchestrator
            .run_task(&thread_id, task, Some(&event_tx), CancellationToken::new())
            .await
        {
            Ok(outcome) => println!("{}", outcome.result),
            Err(e) => eprintln!("task failed: {e}"),
        }
        drop(event_tx);
        let _ = printer.await;
    }

    Ok(())
}
