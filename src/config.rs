//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `WEAVER__*` 覆盖（双下划线表示嵌套，
//! 如 `WEAVER__LLM__MODEL=gpt-4o-mini`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::AgentError;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSection,
    pub orchestrator: OrchestratorSection,
    pub checkpoint: CheckpointSection,
    pub database: DatabaseSection,
    pub gateway: GatewaySection,
}

/// [llm] 段：OpenAI 兼容端点与模型名
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: None,
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

/// [orchestrator] 段：历史轮数与工具超时
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorSection {
    /// 喂给模型的对话历史保留轮数
    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            max_history_turns: default_max_history_turns(),
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

fn default_max_history_turns() -> usize {
    20
}

fn default_tool_timeout_secs() -> u64 {
    30
}

/// [checkpoint] 段：持久化路径（未设置时用内存存储）
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CheckpointSection {
    pub db_path: Option<PathBuf>,
}

/// [database] 段：子工作流目标库路径（未设置时用内存库）
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DatabaseSection {
    pub path: Option<PathBuf>,
}

/// [gateway] 段：监听地址与人工工具回传超时
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySection {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// 人工回传工具结果的等待上限（秒）；原设计无限挂起，此处显式加界
    #[serde(default = "default_tool_response_timeout_secs")]
    pub tool_response_timeout_secs: u64,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            tool_response_timeout_secs: default_tool_response_timeout_secs(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8787".to_string()
}

fn default_tool_response_timeout_secs() -> u64 {
    300
}

/// 加载配置；文件可缺省（全部取默认值），环境变量始终生效
pub fn load_config(path: Option<PathBuf>) -> Result<AppConfig, AgentError> {
    let mut builder = config::Config::builder();
    builder = match path {
        Some(p) => builder.add_source(config::File::from(p)),
        None => builder.add_source(config::File::with_name("config/default").required(false)),
    };
    builder = builder.add_source(config::Environment::with_prefix("WEAVER").separator("__"));
    builder
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| AgentError::ConfigError(e.to_string()))
}
