//! 编排状态：一次任务的完整状态快照
//!
//! OrchestrationState 由单个在途任务独占，随每次节点执行追加证据；
//! 检查点存储将其整体序列化，线程恢复时取最新快照的 history 续接上下文。

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::AgentError;
use crate::memory::Turn;

/// 步骤标识：形如 `#E<n>` 的唯一记号，后续步骤输入中出现即引用该步结果
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(String);

impl StepId {
    pub fn new(n: u32) -> Self {
        Self(format!("#E{}", n))
    }

    /// 解析 `#E<n>` 记号；不匹配时返回 InvalidStepId
    pub fn parse(s: &str) -> Result<Self, AgentError> {
        let digits = s
            .strip_prefix("#E")
            .filter(|d| !d.is_empty() && d.chars().all(|c| c.is_ascii_digit()))
            .ok_or_else(|| AgentError::InvalidStepId(s.to_string()))?;
        digits
            .parse::<u32>()
            .map_err(|_| AgentError::InvalidStepId(s.to_string()))?;
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 单个计划步骤：描述、标识、工具名与原始输入（可引用先前步骤的 #E<n>）
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Step {
    pub description: String,
    pub id: StepId,
    pub tool_name: String,
    pub raw_input: String,
}

/// 一次在途任务的编排状态
///
/// 不变式：规划结束后 selected_agent 非空与 direct_response 非 None 至多一个成立；
/// result 仅由终端节点（solve / direct）写入。
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OrchestrationState {
    /// 用户任务原文
    pub task: String,
    /// 模型产出的完整计划文本
    pub plan_text: String,
    /// 按计划顺序排列的步骤；执行顺序即此顺序，不重排、不并行
    pub steps: Vec<Step>,
    /// 步骤标识 -> 结果字符串
    pub evidence: BTreeMap<StepId, String>,
    /// 当前被路由选中的节点名（空表示无）
    pub selected_agent: String,
    /// 终端节点产出的最终回答（空表示尚未产出）
    pub result: String,
    /// 零步骤计划时模型的直接回复
    pub direct_response: Option<String>,
    /// 线程级对话历史（只追加）
    pub history: Vec<Turn>,
}

impl OrchestrationState {
    pub fn new(task: impl Into<String>, history: Vec<Turn>) -> Self {
        Self {
            task: task.into(),
            history,
            ..Default::default()
        }
    }

    /// 下一个未执行的步骤：证据数即已完成步数
    pub fn next_step(&self) -> Option<&Step> {
        self.steps.get(self.evidence.len())
    }

    /// 每个步骤都有对应证据时计划完成
    pub fn is_complete(&self) -> bool {
        self.evidence.len() >= self.steps.len()
    }

    pub fn record_evidence(&mut self, id: StepId, result: impl Into<String>) {
        self.evidence.insert(id, result.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_id_parse() {
        assert!(StepId::parse("#E1").is_ok());
        assert!(StepId::parse("#E42").is_ok());
        assert!(StepId::parse("#E").is_err());
        assert!(StepId::parse("E1").is_err());
        assert!(StepId::parse("#E1x").is_err());
        assert_eq!(StepId::new(7).as_str(), "#E7");
    }

    #[test]
    fn test_next_step_follows_evidence_count() {
        let mut state = OrchestrationState::new("task", vec![]);
        state.steps = vec![
            Step {
                description: "first".into(),
                id: StepId::new(1),
                tool_name: "calculate".into(),
                raw_input: "multiply 3 6".into(),
            },
            Step {
                description: "second".into(),
                id: StepId::new(2),
                tool_name: "calculate".into(),
                raw_input: "divide #E1 2".into(),
            },
        ];
        assert_eq!(state.next_step().unwrap().id.as_str(), "#E1");
        state.record_evidence(StepId::new(1), "18");
        assert_eq!(state.next_step().unwrap().id.as_str(), "#E2");
        assert!(!state.is_complete());
        state.record_evidence(StepId::new(2), "9");
        assert!(state.is_complete());
        assert!(state.next_step().is_none());
    }
}
