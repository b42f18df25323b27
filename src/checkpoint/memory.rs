//! 内存检查点存储
//!
//! 线程 id -> 追加序检查点列表；id 单调递增，因此列表末尾即最新。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::checkpoint::{
    Checkpoint, CheckpointIdGen, CheckpointMetadata, CheckpointStore,
};
use crate::core::{AgentError, OrchestrationState};

/// 内存实现：测试与单进程部署用
#[derive(Default)]
pub struct MemoryCheckpointStore {
    threads: RwLock<HashMap<String, Vec<Checkpoint>>>,
    ids: CheckpointIdGen,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn put(
        &self,
        thread_id: &str,
        state: &OrchestrationState,
        metadata: CheckpointMetadata,
    ) -> Result<String, AgentError> {
        let checkpoint_id = self.ids.next();
        let mut threads = self.threads.write().await;
        let chain = threads.entry(thread_id.to_string()).or_default();
        let parent_checkpoint_id = chain.last().map(|c| c.checkpoint_id.clone());
        chain.push(Checkpoint {
            thread_id: thread_id.to_string(),
            checkpoint_id: checkpoint_id.clone(),
            parent_checkpoint_id,
            state: state.clone(),
            metadata,
        });
        Ok(checkpoint_id)
    }

    async fn get(
        &self,
        thread_id: &str,
        checkpoint_id: Option<&str>,
    ) -> Result<Option<Checkpoint>, AgentError> {
        let threads = self.threads.read().await;
        let Some(chain) = threads.get(thread_id) else {
            return Ok(None);
        };
        let found = match checkpoint_id {
            Some(id) => chain.iter().find(|c| c.checkpoint_id == id),
            None => chain.last(),
        };
        Ok(found.cloned())
    }

    async fn list(
        &self,
        thread_id: &str,
        limit: Option<usize>,
        before: Option<&str>,
    ) -> Result<Vec<Checkpoint>, AgentError> {
        let threads = self.threads.read().await;
        let Some(chain) = threads.get(thread_id) else {
            return Ok(Vec::new());
        };
        let out = chain
            .iter()
            .rev()
            .filter(|c| before.map_or(true, |b| c.checkpoint_id.as_str() < b))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(out)
    }
}
