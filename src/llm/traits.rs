//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 LlmClient：complete（非流式）、complete_stream
//! （流式 Token）、complete_structured（按给定 JSON Schema 返回结构化对象）、
//! complete_with_tools（绑定工具目录，返回工具调用记录）。

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::memory::Turn;

/// 提供给模型的工具声明（名称、描述、参数 JSON Schema）
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// 模型返回的单条工具调用记录
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub name: String,
    pub arguments: Value,
}

/// 工具选择策略：自动 或 强制调用指定工具
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolChoice {
    Auto,
    Forced(String),
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, messages: &[Turn]) -> Result<String, String>;

    /// 流式完成，返回 Token 流
    async fn complete_stream(
        &self,
        messages: &[Turn],
    ) -> Result<Pin<Box<dyn Stream<Item = Result<String, String>> + Send>>, String>;

    /// 结构化完成：返回符合 schema 的 JSON 对象
    async fn complete_structured(
        &self,
        messages: &[Turn],
        schema: &Value,
    ) -> Result<Value, String>;

    /// 绑定工具目录完成：返回模型给出的工具调用记录（可能为空）
    async fn complete_with_tools(
        &self,
        messages: &[Turn],
        tools: &[ToolSpec],
        choice: ToolChoice,
    ) -> Result<Vec<ToolCallRecord>, String>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
