//! 检查点存储：线程级编排状态的版本化快照
//!
//! 每次状态机转移后写入一个检查点；只追加、写后不可变、核心不删除（保留策略归宿主）。
//! 同一线程的检查点经 parent_checkpoint_id 构成单链历史；checkpoint_id 取
//! 「零填充毫秒时间戳-序号」定宽格式，字典序即创建序，max 即最新。

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{AgentError, OrchestrationState};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryCheckpointStore;
pub use sqlite::SqliteCheckpointStore;

/// 检查点写入来源
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointSource {
    /// 规划完成后的首个快照
    Input,
    /// 每步执行后的循环快照
    Loop,
    /// 终端节点后的收尾快照
    Update,
}

/// 检查点元数据
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub source: CheckpointSource,
    /// 写入时的步序号（Input 为 -1）
    pub step: i64,
    pub writes: Option<serde_json::Value>,
}

impl CheckpointMetadata {
    pub fn new(source: CheckpointSource, step: i64) -> Self {
        Self {
            source,
            step,
            writes: None,
        }
    }

    pub fn with_writes(mut self, writes: serde_json::Value) -> Self {
        self.writes = Some(writes);
        self
    }
}

/// 单个检查点记录
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: String,
    pub checkpoint_id: String,
    pub parent_checkpoint_id: Option<String>,
    /// 编排状态快照
    pub state: OrchestrationState,
    pub metadata: CheckpointMetadata,
}

/// 检查点存储接口
///
/// put 只追加：新检查点的 parent 是该线程此前的最新 id，绝不覆盖已有历史。
/// get 省略 id 时返回该线程 id 最大的检查点；线程不存在返回 None 而非报错。
/// list 按 id 降序、有限、每次调用可重新开始。
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn put(
        &self,
        thread_id: &str,
        state: &OrchestrationState,
        metadata: CheckpointMetadata,
    ) -> Result<String, AgentError>;

    async fn get(
        &self,
        thread_id: &str,
        checkpoint_id: Option<&str>,
    ) -> Result<Option<Checkpoint>, AgentError>;

    async fn list(
        &self,
        thread_id: &str,
        limit: Option<usize>,
        before: Option<&str>,
    ) -> Result<Vec<Checkpoint>, AgentError>;
}

/// 检查点 id 生成器：时间戳相同时序号仍保证单调
#[derive(Debug, Default)]
pub(crate) struct CheckpointIdGen {
    seq: AtomicU64,
}

impl CheckpointIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> String {
        let millis = chrono::Utc::now().timestamp_millis().max(0);
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        format!("{:013}-{:06}", millis, seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_gen_monotonic_lexicographic() {
        let ids = CheckpointIdGen::new();
        let a = ids.next();
        let b = ids.next();
        let c = ids.next();
        assert!(a < b && b < c);
        assert_eq!(a.len(), b.len());
    }
}
