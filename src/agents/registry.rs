//! 智能体节点注册表
//!
//! 路由产出的节点名在这里解析为可执行节点：register(name, node) / resolve(name)。
//! 节点在启动期动态注册（能力集合），解析失败即「工具未识别」致命错误，由派发方抛出。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{AgentError, OrchestrationState, Step};

/// 可执行节点：执行一个步骤并返回其证据字符串
///
/// resolved_input 已完成证据替换；节点内的可恢复失败应转为占位结果字符串返回 Ok，
/// 只有结构性错误（工具未识别、响应缺少调用）允许返回 Err。
#[async_trait]
pub trait AgentNode: Send + Sync {
    fn name(&self) -> &str;

    async fn run(
        &self,
        state: &OrchestrationState,
        step: &Step,
        resolved_input: &str,
    ) -> Result<String, AgentError>;
}

/// 节点注册表
#[derive(Default)]
pub struct NodeRegistry {
    nodes: HashMap<String, Arc<dyn AgentNode>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, node: impl AgentNode + 'static) {
        let name = node.name().to_string();
        self.nodes.insert(name, Arc::new(node));
    }

    pub fn register_arc(&mut self, node: Arc<dyn AgentNode>) {
        self.nodes.insert(node.name().to_string(), node);
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn AgentNode>> {
        self.nodes.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }
}
