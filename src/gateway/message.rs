//! 网关消息协议定义
//!
//! 入站：query（发起任务）、toolResponse（回传一次工具执行结果）；
//! 出站：plan / planStep / tool / result / directResponse / error，外加
//! toolRequest（要求连接方执行一次工具调用，人工在环的往返起点）。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::OrchestratorEvent;

/// 客户端 -> 网关
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// 发起一个任务
    #[serde(rename = "query")]
    Query {
        task: String,
        #[serde(rename = "threadId")]
        thread_id: String,
    },
    /// 回传一次 toolRequest 的执行结果
    #[serde(rename = "toolResponse")]
    ToolResponse { response: ToolResponsePayload },
}

/// 工具回传体：以函数名关联在途请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponsePayload {
    pub name: String,
    pub content: String,
}

/// 网关 -> 客户端
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    Plan {
        text: String,
    },
    PlanStep {
        id: String,
        tool: String,
        input: String,
        description: String,
    },
    /// 要求连接方执行工具并以 toolResponse 回传
    ToolRequest {
        tool: String,
        args: Value,
    },
    Tool {
        id: String,
        tool: String,
        result: String,
    },
    Result {
        text: String,
    },
    DirectResponse {
        text: String,
    },
    Error {
        text: String,
    },
}

impl From<OrchestratorEvent> for ServerMessage {
    fn from(ev: OrchestratorEvent) -> Self {
        match ev {
            OrchestratorEvent::Plan { text } => ServerMessage::Plan { text },
            OrchestratorEvent::PlanStep {
                id,
                tool,
                input,
                description,
            } => ServerMessage::PlanStep {
                id,
                tool,
                input,
                description,
            },
            OrchestratorEvent::Tool { id, tool, result } => {
                ServerMessage::Tool { id, tool, result }
            }
            OrchestratorEvent::Result { text } => ServerMessage::Result { text },
            OrchestratorEvent::DirectResponse { text } => ServerMessage::DirectResponse { text },
            OrchestratorEvent::Error { text } => ServerMessage::Error { text },
        }
    }
}
