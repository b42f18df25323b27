//! 人工在环的工具回传：每任务一个挂起表，显式超时
//!
//! invoke 时登记函数名对应的 oneshot，向连接方下发 toolRequest，挂起等待回传；
//! 步骤要求的全部函数名都回传后节点才会继续。挂起表是任务上下文对象，不是进程级
//! 单例；等待带超时（原设计无限挂起，此处为显式硬化，超时化为该步的占位错误文本）。

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

use crate::gateway::message::ServerMessage;
use crate::tools::ToolCallback;

/// 挂起的工具回传表 + 出站通道
pub struct PendingResponses {
    waiting: Mutex<HashMap<String, oneshot::Sender<String>>>,
    outbound: mpsc::UnboundedSender<ServerMessage>,
    timeout: Duration,
}

impl PendingResponses {
    pub fn new(outbound: mpsc::UnboundedSender<ServerMessage>, timeout_secs: u64) -> Self {
        Self {
            waiting: Mutex::new(HashMap::new()),
            outbound,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// 回传一次结果；没有对应在途请求时返回 false
    pub fn resolve(&self, name: &str, content: String) -> bool {
        let sender = self.waiting.lock().unwrap().remove(name);
        match sender {
            Some(tx) => tx.send(content).is_ok(),
            None => {
                tracing::warn!(name, "tool response with no outstanding request");
                false
            }
        }
    }

    /// 在途请求的函数名集合
    pub fn outstanding(&self) -> Vec<String> {
        self.waiting.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl ToolCallback for PendingResponses {
    async fn invoke(&self, tool_name: &str, args: Value) -> Result<String, String> {
        let (tx, rx) = oneshot::channel();
        self.waiting
            .lock()
            .unwrap()
            .insert(tool_name.to_string(), tx);

        if self
            .outbound
            .send(ServerMessage::ToolRequest {
                tool: tool_name.to_string(),
                args,
            })
            .is_err()
        {
            self.waiting.lock().unwrap().remove(tool_name);
            return Err("client disconnected".to_string());
        }

        match timeout(self.timeout, rx).await {
            Ok(Ok(content)) => Ok(content),
            Ok(Err(_)) => Err("tool response channel closed".to_string()),
            Err(_) => {
                self.waiting.lock().unwrap().remove(tool_name);
                Err(format!("tool response timeout: {tool_name}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invoke_resolves_on_response() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pending = std::sync::Arc::new(PendingResponses::new(tx, 5));

        let invoker = pending.clone();
        let handle = tokio::spawn(async move {
            invoker
                .invoke("calculate", serde_json::json!({"input": "multiply 3 6"}))
                .await
        });

        // 连接方收到 toolRequest 后回传
        let request = rx.recv().await.unwrap();
        assert!(matches!(request, ServerMessage::ToolRequest { ref tool, .. } if tool == "calculate"));
        // 等 invoke 完成登记
        while pending.outstanding().is_empty() {
            tokio::task::yield_now().await;
        }
        assert!(pending.resolve("calculate", "18".to_string()));

        assert_eq!(handle.await.unwrap().unwrap(), "18");
        assert!(pending.outstanding().is_empty());
    }

    #[tokio::test]
    async fn test_invoke_times_out() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let pending = PendingResponses::new(tx, 0);
        let err = pending
            .invoke("calculate", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(err.contains("timeout"));
        assert!(pending.outstanding().is_empty());
    }

    #[tokio::test]
    async fn test_unmatched_response_is_ignored() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let pending = PendingResponses::new(tx, 1);
        assert!(!pending.resolve("nobody", "x".to_string()));
    }
}
