//! SQLite 检查点存储
//!
//! 单表 checkpoints，(thread_id, checkpoint_id) 主键；状态与元数据整体序列化为 JSON。
//! 打开时建表，可安全复用既有文件。

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::checkpoint::{
    Checkpoint, CheckpointIdGen, CheckpointMetadata, CheckpointStore,
};
use crate::core::{AgentError, OrchestrationState};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS checkpoints (
    thread_id            TEXT NOT NULL,
    checkpoint_id        TEXT NOT NULL,
    parent_checkpoint_id TEXT,
    state                TEXT NOT NULL,
    metadata             TEXT NOT NULL,
    PRIMARY KEY (thread_id, checkpoint_id)
)";

/// 持久化实现
pub struct SqliteCheckpointStore {
    conn: Mutex<Connection>,
    ids: CheckpointIdGen,
}

impl SqliteCheckpointStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, AgentError> {
        let conn = Connection::open(path)
            .map_err(|e| AgentError::CheckpointError(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| AgentError::CheckpointError(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
            ids: CheckpointIdGen::new(),
        })
    }

    fn row_to_checkpoint(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, Option<String>, String, String)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
        ))
    }

    fn decode(
        (thread_id, checkpoint_id, parent_checkpoint_id, state, metadata): (
            String,
            String,
            Option<String>,
            String,
            String,
        ),
    ) -> Result<Checkpoint, AgentError> {
        let state: OrchestrationState = serde_json::from_str(&state)
            .map_err(|e| AgentError::CheckpointError(e.to_string()))?;
        let metadata: CheckpointMetadata = serde_json::from_str(&metadata)
            .map_err(|e| AgentError::CheckpointError(e.to_string()))?;
        Ok(Checkpoint {
            thread_id,
            checkpoint_id,
            parent_checkpoint_id,
            state,
            metadata,
        })
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn put(
        &self,
        thread_id: &str,
        state: &OrchestrationState,
        metadata: CheckpointMetadata,
    ) -> Result<String, AgentError> {
        let checkpoint_id = self.ids.next();
        let state_json = serde_json::to_string(state)
            .map_err(|e| AgentError::CheckpointError(e.to_string()))?;
        let metadata_json = serde_json::to_string(&metadata)
            .map_err(|e| AgentError::CheckpointError(e.to_string()))?;

        let conn = self.conn.lock().unwrap();
        let parent: Option<String> = conn
            .query_row(
                "SELECT checkpoint_id FROM checkpoints WHERE thread_id = ?1 \
                 ORDER BY checkpoint_id DESC LIMIT 1",
                params![thread_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| AgentError::CheckpointError(e.to_string()))?;
        conn.execute(
            "INSERT INTO checkpoints \
             (thread_id, checkpoint_id, parent_checkpoint_id, state, metadata) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![thread_id, checkpoint_id, parent, state_json, metadata_json],
        )
        .map_err(|e| AgentError::CheckpointError(e.to_string()))?;
        Ok(checkpoint_id)
    }

    async fn get(
        &self,
        thread_id: &str,
        checkpoint_id: Option<&str>,
    ) -> Result<Option<Checkpoint>, AgentError> {
        let conn = self.conn.lock().unwrap();
        let row = match checkpoint_id {
            Some(id) => conn
                .query_row(
                    "SELECT thread_id, checkpoint_id, parent_checkpoint_id, state, metadata \
                     FROM checkpoints WHERE thread_id = ?1 AND checkpoint_id = ?2",
                    params![thread_id, id],
                    Self::row_to_checkpoint,
                )
                .optional(),
            None => conn
                .query_row(
                    "SELECT thread_id, checkpoint_id, parent_checkpoint_id, state, metadata \
                     FROM checkpoints WHERE thread_id = ?1 \
                     ORDER BY checkpoint_id DESC LIMIT 1",
                    params![thread_id],
                    Self::row_to_checkpoint,
                )
                .optional(),
        }
        .map_err(|e| AgentError::CheckpointError(e.to_string()))?;

        row.map(Self::decode).transpose()
    }

    async fn list(
        &self,
        thread_id: &str,
        limit: Option<usize>,
        before: Option<&str>,
    ) -> Result<Vec<Checkpoint>, AgentError> {
        let conn = self.conn.lock().unwrap();
        // SQLite 的 LIMIT -1 表示不限
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let before = before.unwrap_or("\u{10FFFF}");
        let mut stmt = conn
            .prepare(
                "SELECT thread_id, checkpoint_id, parent_checkpoint_id, state, metadata \
                 FROM checkpoints WHERE thread_id = ?1 AND checkpoint_id < ?2 \
                 ORDER BY checkpoint_id DESC LIMIT ?3",
            )
            .map_err(|e| AgentError::CheckpointError(e.to_string()))?;
        let rows = stmt
            .query_map(params![thread_id, before, limit], Self::row_to_checkpoint)
            .map_err(|e| AgentError::CheckpointError(e.to_string()))?;

        let mut out = Vec::new();
        for row in rows {
            let row = row.map_err(|e| AgentError::CheckpointError(e.to_string()))?;
            out.push(Self::decode(row)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::CheckpointSource;

    fn meta(step: i64) -> CheckpointMetadata {
        CheckpointMetadata::new(CheckpointSource::Loop, step)
    }

    #[tokio::test]
    async fn test_roundtrip_and_latest() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteCheckpointStore::new(dir.path().join("cp.db")).unwrap();

        let mut state = OrchestrationState::new("3*6/2", vec![]);
        state.plan_text = "Plan: multiply #E1 = calculate[multiply 3 6]".into();
        store.put("thread-1", &state, meta(0)).await.unwrap();
        state.record_evidence(crate::core::StepId::new(1), "18");
        let latest_id = store.put("thread-1", &state, meta(1)).await.unwrap();

        let latest = store.get("thread-1", None).await.unwrap().unwrap();
        assert_eq!(latest.checkpoint_id, latest_id);
        assert_eq!(
            latest.state.evidence.get(&crate::core::StepId::new(1)).unwrap(),
            "18"
        );
        assert!(store.get("other", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reopen_preserves_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cp.db");
        let first_id;
        {
            let store = SqliteCheckpointStore::new(&path).unwrap();
            let state = OrchestrationState::new("t", vec![]);
            first_id = store.put("thread-1", &state, meta(0)).await.unwrap();
        }
        let store = SqliteCheckpointStore::new(&path).unwrap();
        let state = OrchestrationState::new("t2", vec![]);
        let second_id = store.put("thread-1", &state, meta(1)).await.unwrap();

        let latest = store.get("thread-1", None).await.unwrap().unwrap();
        assert_eq!(latest.checkpoint_id, second_id);
        assert_eq!(latest.parent_checkpoint_id.as_deref(), Some(first_id.as_str()));
    }

    #[tokio::test]
    async fn test_list_descending_limit_before() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteCheckpointStore::new(dir.path().join("cp.db")).unwrap();
        let state = OrchestrationState::new("t", vec![]);
        let mut ids = Vec::new();
        for i in 0..4 {
            ids.push(store.put("thread-1", &state, meta(i)).await.unwrap());
        }

        let page = store.list("thread-1", Some(2), None).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].checkpoint_id, ids[3]);

        let next = store
            .list("thread-1", Some(2), Some(&page[1].checkpoint_id))
            .await
            .unwrap();
        assert_eq!(next.len(), 2);
        assert_eq!(next[0].checkpoint_id, ids[1]);
    }
}
