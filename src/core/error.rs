//! Agent 错误类型
//!
//! 错误分两类：可恢复错误（规划失败、单步工具失败、子工作流生成/评估失败）在状态机内
//! 转为数据（直接回复 / 占位证据 / 反馈字符串）继续流转；结构性致命错误（未注册工具、
//! 越过计划末尾、工具响应缺少调用、证据未解析）作为 Err 抛给调用方，不自动重试。

use thiserror::Error;

/// 编排过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    /// 规划阶段模型调用失败或输出不可用（转为用户可见的直接回复）
    #[error("Planning failed: {0}")]
    PlanningFailed(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    /// 致命：计划引用了未注册的工具/智能体节点
    #[error("Tool not recognized: {0}")]
    UnknownTool(String),

    /// 致命：具备工具能力的模型响应中没有任何工具调用
    #[error("No tool call found in response")]
    NoToolCall,

    /// 致命：计划已无剩余步骤却仍被路由到执行节点
    #[error("No more steps in plan")]
    NoMoreSteps,

    /// 致命：步骤输入引用了尚未产生的证据（计划顺序错误）
    #[error("Unresolved evidence reference: {0}")]
    UnresolvedEvidence(String),

    /// 非法的步骤标识（应为 #E<n>）
    #[error("Invalid step id: {0}")]
    InvalidStepId(String),

    #[error("Checkpoint error: {0}")]
    CheckpointError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    /// 人工回传工具结果超时（硬化行为：原设计无限挂起）
    #[error("Tool response timeout: {0}")]
    ResponseTimeout(String),

    #[error("Cancelled")]
    Cancelled,
}

impl AgentError {
    /// 是否为结构性致命错误：此类错误直接抛给调用方，不转为占位证据
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AgentError::UnknownTool(_)
                | AgentError::NoToolCall
                | AgentError::NoMoreSteps
                | AgentError::UnresolvedEvidence(_)
        )
    }
}
