//! 对话历史：跨任务的线程级记忆
//!
//! 每完成一次 计划/求解 周期追加一对 (user, assistant) 轮次；只追加、不回改。
//! 供规划 Prompt 携带既往上下文，超出 max_turns 时在喂给模型前剪枝（检查点中的快照不剪）。

use serde::{Deserialize, Serialize};

/// 轮次角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条历史轮次
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 对话历史：最近 N 轮（每轮含 user + assistant，故保留约 max_turns*2 条）
#[derive(Clone, Debug)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
    max_turns: usize,
}

impl ConversationHistory {
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: Vec::new(),
            max_turns,
        }
    }

    /// 从检查点恢复的轮次重建历史
    pub fn from_turns(turns: Vec<Turn>, max_turns: usize) -> Self {
        Self { turns, max_turns }
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// 喂给模型前的视图：超出 max_turns*2 时只取最近部分，原始轮次不动
    pub fn pruned(&self) -> &[Turn] {
        let keep = self.max_turns * 2;
        if self.turns.len() > keep {
            &self.turns[self.turns.len() - keep..]
        } else {
            &self.turns
        }
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pruned_keeps_recent() {
        let mut history = ConversationHistory::new(2);
        for i in 0..6 {
            history.push(Turn::user(format!("q{}", i)));
            history.push(Turn::assistant(format!("a{}", i)));
        }
        assert_eq!(history.len(), 12);
        let pruned = history.pruned();
        assert_eq!(pruned.len(), 4);
        assert_eq!(pruned[0].content, "q4");
    }

    #[test]
    fn test_push_is_append_only() {
        let mut history = ConversationHistory::new(10);
        history.push(Turn::user("hello"));
        history.push(Turn::assistant("hi"));
        assert_eq!(history.turns()[0].content, "hello");
        assert_eq!(history.turns()[1].role, Role::Assistant);
    }
}
