//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / execute），由 ToolRegistry 按名注册与查找；
//! ToolExecutor 在调用时加超时并统一转 AgentError。ToolRegistry 同时实现 ToolCallback，
//! 可直接作为宿主回调供工作节点派发工具调用。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::ToolSpec;

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（计划中的 toolName，大小写敏感）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能，进入规划 Prompt 的工具目录）
    fn description(&self) -> &str;

    /// 参数 JSON Schema（供 LLM 生成正确的参数格式）
    /// 默认返回空对象，表示无参数或参数格式不限
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 执行工具
    async fn execute(&self, args: Value) -> Result<String, String>;
}

/// 宿主提供的工具调用回调：result 可序列化为字符串即可
/// （宿主可将其实现为人工回传的消息往返，见 gateway::pending）
#[async_trait]
pub trait ToolCallback: Send + Sync {
    async fn invoke(&self, tool_name: &str, args: Value) -> Result<String, String>;
}

/// 工具注册表：按名称存储 Arc<dyn Tool>，支持 register / get / execute / tool_names
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub async fn execute(&self, name: &str, args: Value) -> Result<String, String> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| format!("Unknown tool: {name}"))?;
        tool.execute(args).await
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// 规划 Prompt 中的工具目录段落：`name: description` 每行一个
    pub fn catalog_text(&self) -> String {
        let mut lines: Vec<String> = self
            .tools
            .iter()
            .map(|(name, tool)| format!("{}: {}", name, tool.description()))
            .collect();
        lines.sort();
        lines.join("\n")
    }

    /// 转为可提交给 LLM 的工具声明列表
    pub fn to_tool_specs(&self) -> Vec<ToolSpec> {
        self.tools
            .iter()
            .map(|(name, tool)| ToolSpec {
                name: name.clone(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }
}

#[async_trait]
impl ToolCallback for ToolRegistry {
    async fn invoke(&self, tool_name: &str, args: Value) -> Result<String, String> {
        self.execute(tool_name, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::EchoTool;

    #[tokio::test]
    async fn test_register_and_execute() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        let out = registry
            .execute("echo", serde_json::json!({"input": "hi"}))
            .await
            .unwrap();
        assert_eq!(out, "hi");
        assert!(registry.execute("missing", Value::Null).await.is_err());
    }

    #[test]
    fn test_catalog_text_lists_tools() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        assert!(registry.catalog_text().starts_with("echo:"));
    }
}
