//! 执行节点：直接工具调用 与 绑定工具的模型调用
//!
//! ToolNode 把解析后的输入直接交给注册表中的同名工具；WorkerNode 先让绑定了工具目录
//! 的模型产出工具调用记录，再逐条经宿主回调执行。两者的可恢复失败都转为
//! `Error: ...` 占位证据，让计划继续走到 solve 并在最终回答中说明失败。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::agents::AgentNode;
use crate::core::{AgentError, OrchestrationState, Step};
use crate::llm::{LlmClient, ToolChoice, ToolSpec};
use crate::memory::Turn;
use crate::tools::{ToolCallback, ToolExecutor};

/// 直接工具节点：以注册表工具名为节点名
pub struct ToolNode {
    tool_name: String,
    executor: Arc<ToolExecutor>,
}

impl ToolNode {
    pub fn new(tool_name: impl Into<String>, executor: Arc<ToolExecutor>) -> Self {
        Self {
            tool_name: tool_name.into(),
            executor,
        }
    }
}

#[async_trait]
impl AgentNode for ToolNode {
    fn name(&self) -> &str {
        &self.tool_name
    }

    async fn run(
        &self,
        _state: &OrchestrationState,
        _step: &Step,
        resolved_input: &str,
    ) -> Result<String, AgentError> {
        let args = json!({ "input": resolved_input });
        match self.executor.execute(&self.tool_name, args).await {
            Ok(result) => Ok(result),
            Err(e) if e.is_fatal() => Err(e),
            // 单步失败不终止任务：转为占位证据，solve 时向用户说明
            Err(e) => Ok(format!("Error: {e}")),
        }
    }
}

/// 工作节点：绑定固定工具目录的模型调用
///
/// 模型响应中的每条工具调用记录经宿主回调执行，结果串接为该步证据。
/// 响应中没有任何工具调用、或调用了目录外的工具名，均为致命错误。
pub struct WorkerNode {
    name: String,
    llm: Arc<dyn LlmClient>,
    tools: Vec<ToolSpec>,
    choice: ToolChoice,
    callback: Arc<dyn ToolCallback>,
    prompt_template: String,
}

/// 默认的工作节点 Prompt：把任务与本步输入交给模型
const WORKER_PROMPT: &str = "You are working on one step of a larger task.\n\
Overall task: {task}\n\
Current step: {input}\n\
Use the available tools to carry out this step.";

impl WorkerNode {
    pub fn new(
        name: impl Into<String>,
        llm: Arc<dyn LlmClient>,
        tools: Vec<ToolSpec>,
        choice: ToolChoice,
        callback: Arc<dyn ToolCallback>,
    ) -> Self {
        Self {
            name: name.into(),
            llm,
            tools,
            choice,
            callback,
            prompt_template: WORKER_PROMPT.to_string(),
        }
    }

    pub fn with_prompt(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = template.into();
        self
    }

    fn knows_tool(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name == name)
    }
}

#[async_trait]
impl AgentNode for WorkerNode {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(
        &self,
        state: &OrchestrationState,
        _step: &Step,
        resolved_input: &str,
    ) -> Result<String, AgentError> {
        let prompt = self
            .prompt_template
            .replace("{task}", &state.task)
            .replace("{input}", resolved_input);
        let messages = vec![Turn::user(prompt)];

        let records = match self
            .llm
            .complete_with_tools(&messages, &self.tools, self.choice.clone())
            .await
        {
            Ok(records) => records,
            // 模型调用失败是可恢复错误：占位证据
            Err(e) => return Ok(format!("Error: {e}")),
        };
        if records.is_empty() {
            return Err(AgentError::NoToolCall);
        }

        let mut results = Vec::with_capacity(records.len());
        for record in records {
            if !self.knows_tool(&record.name) {
                return Err(AgentError::UnknownTool(record.name));
            }
            match self.callback.invoke(&record.name, record.arguments).await {
                Ok(result) => results.push(result),
                Err(e) => results.push(format!("Error: {e}")),
            }
        }
        Ok(results.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StepId;
    use crate::llm::{MockLlmClient, ToolCallRecord};
    use crate::tools::{CalculateTool, ToolRegistry};

    fn step() -> Step {
        Step {
            description: "calc".into(),
            id: StepId::new(1),
            tool_name: "calculate".into(),
            raw_input: "multiply 3 6".into(),
        }
    }

    fn calc_specs() -> Vec<ToolSpec> {
        let mut registry = ToolRegistry::new();
        registry.register(CalculateTool);
        registry.to_tool_specs()
    }

    fn calc_callback() -> Arc<dyn ToolCallback> {
        let mut registry = ToolRegistry::new();
        registry.register(CalculateTool);
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_tool_node_failure_becomes_placeholder() {
        let mut registry = ToolRegistry::new();
        registry.register(CalculateTool);
        let node = ToolNode::new("calculate", Arc::new(ToolExecutor::new(registry, 5)));
        let state = OrchestrationState::default();
        let out = node.run(&state, &step(), "divide 1 0").await.unwrap();
        assert!(out.starts_with("Error:"));
    }

    #[tokio::test]
    async fn test_worker_node_invokes_extracted_calls() {
        let llm = Arc::new(MockLlmClient::new().with_tool_calls([vec![ToolCallRecord {
            name: "calculate".into(),
            arguments: serde_json::json!({"input": "multiply 3 6"}),
        }]]));
        let node = WorkerNode::new(
            "worker",
            llm,
            calc_specs(),
            ToolChoice::Auto,
            calc_callback(),
        );
        let state = OrchestrationState::new("task", vec![]);
        let out = node.run(&state, &step(), "multiply 3 6").await.unwrap();
        assert_eq!(out, "18");
    }

    #[tokio::test]
    async fn test_worker_node_no_tool_call_is_fatal() {
        let llm = Arc::new(MockLlmClient::new().with_tool_calls([vec![]]));
        let node = WorkerNode::new(
            "worker",
            llm,
            calc_specs(),
            ToolChoice::Auto,
            calc_callback(),
        );
        let state = OrchestrationState::new("task", vec![]);
        let err = node.run(&state, &step(), "x").await.unwrap_err();
        assert!(matches!(err, AgentError::NoToolCall));
    }

    #[tokio::test]
    async fn test_worker_node_unknown_tool_is_fatal() {
        let llm = Arc::new(MockLlmClient::new().with_tool_calls([vec![ToolCallRecord {
            name: "made_up".into(),
            arguments: serde_json::json!({}),
        }]]));
        let node = WorkerNode::new(
            "worker",
            llm,
            calc_specs(),
            ToolChoice::Auto,
            calc_callback(),
        );
        let state = OrchestrationState::new("task", vec![]);
        let err = node.run(&state, &step(), "x").await.unwrap_err();
        assert!(matches!(err, AgentError::UnknownTool(ref n) if n == "made_up"));
    }
}
