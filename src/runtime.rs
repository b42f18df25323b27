//! 运行时装配：无头编排器的创建（供 CLI / 网关调用）
//!
//! 本地模式：工具在进程内直接执行（ToolNode）；网关模式：工具经宿主回调远端执行
//! （WorkerNode + 强制工具选择），回调由连接方提供（可能是人工回传的消息往返）。

use std::sync::Arc;

use crate::agents::{
    create_view_node, insights_node, recover_data_node, NodeRegistry, SolveNode, ToolNode,
    WorkerNode,
};
use crate::checkpoint::CheckpointStore;
use crate::config::AppConfig;
use crate::core::Orchestrator;
use crate::llm::{LlmClient, MockLlmClient, OpenAiClient, ToolChoice};
use crate::planner::Planner;
use crate::tools::{
    CalculateTool, DatabaseBackend, EchoTool, ToolCallback, ToolExecutor, ToolRegistry,
};

/// 根据配置与环境变量选择 LLM 后端（OpenAI 兼容 / Mock）
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    if std::env::var("OPENAI_API_KEY").is_ok() {
        tracing::info!("Using OpenAI-compatible LLM ({})", cfg.llm.model);
        Arc::new(OpenAiClient::new(
            cfg.llm.base_url.as_deref(),
            &cfg.llm.model,
            std::env::var("OPENAI_API_KEY").ok().as_deref(),
        ))
    } else {
        tracing::warn!("No API key set, using Mock LLM");
        Arc::new(MockLlmClient::new())
    }
}

fn base_registry() -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    tools.register(CalculateTool);
    tools.register(EchoTool);
    tools
}

/// 工具目录 + 三个子工作流智能体的目录条目（进入规划 Prompt）
fn full_catalog(tools: &ToolRegistry) -> String {
    let mut catalog = tools.catalog_text();
    catalog.push_str(
        "\nrecover_data: Recovers data by constructing and validating a database query. \
         Input: a description of the data to retrieve.\n\
         create_view: Creates a database view for a described purpose.\n\
         insights: Explores the database and reports notable insights.",
    );
    catalog
}

/// 本地编排器：工具进程内执行
pub fn build_local_orchestrator(
    cfg: &AppConfig,
    llm: Arc<dyn LlmClient>,
    db: Arc<dyn DatabaseBackend>,
    checkpoints: Arc<dyn CheckpointStore>,
) -> Orchestrator {
    let tools = base_registry();
    let catalog = full_catalog(&tools);
    let executor = Arc::new(ToolExecutor::new(tools, cfg.orchestrator.tool_timeout_secs));

    let mut registry = NodeRegistry::new();
    registry.register(ToolNode::new("calculate", executor.clone()));
    registry.register(ToolNode::new("echo", executor));
    registry.register(recover_data_node(llm.clone(), db.clone()));
    registry.register(create_view_node(llm.clone(), db.clone()));
    registry.register(insights_node(llm.clone(), db));

    Orchestrator::new(
        Planner::new(llm.clone()),
        SolveNode::new(llm),
        registry,
        checkpoints,
        catalog,
    )
    .with_max_history(cfg.orchestrator.max_history_turns)
}

/// 网关编排器：每个工具名一个 WorkerNode，模型抽取的调用经 callback 远端执行
pub fn build_gateway_orchestrator(
    cfg: &AppConfig,
    llm: Arc<dyn LlmClient>,
    db: Arc<dyn DatabaseBackend>,
    checkpoints: Arc<dyn CheckpointStore>,
    callback: Arc<dyn ToolCallback>,
) -> Orchestrator {
    let tools = base_registry();
    let catalog = full_catalog(&tools);
    let specs = tools.to_tool_specs();

    let mut registry = NodeRegistry::new();
    for spec in &specs {
        registry.register(WorkerNode::new(
            spec.name.clone(),
            llm.clone(),
            specs.clone(),
            ToolChoice::Forced(spec.name.clone()),
            callback.clone(),
        ));
    }
    registry.register(recover_data_node(llm.clone(), db.clone()));
    registry.register(create_view_node(llm.clone(), db.clone()));
    registry.register(insights_node(llm.clone(), db));

    Orchestrator::new(
        Planner::new(llm.clone()),
        SolveNode::new(llm),
        registry,
        checkpoints,
        catalog,
    )
    .with_max_history(cfg.orchestrator.max_history_turns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::MemoryCheckpointStore;
    use crate::tools::SqliteDatabase;

    #[test]
    fn test_local_orchestrator_registers_all_nodes() {
        let cfg = AppConfig::default();
        let llm = Arc::new(MockLlmClient::new());
        let db = Arc::new(SqliteDatabase::open_in_memory().unwrap());
        let orchestrator =
            build_local_orchestrator(&cfg, llm, db, Arc::new(MemoryCheckpointStore::new()));
        let mut names = orchestrator.node_names();
        names.sort();
        assert_eq!(
            names,
            vec!["calculate", "create_view", "echo", "insights", "recover_data"]
        );
    }
}
