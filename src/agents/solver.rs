//! 求解节点：汇总全部计划与证据，合成最终回答
//!
//! 求解前对计划文本再做一次证据替换，使 Prompt 中每一步都带上实际结果。

use std::sync::Arc;

use crate::core::{AgentError, OrchestrationState};
use crate::llm::LlmClient;
use crate::memory::Turn;
use crate::planner::resolve_plan_text;

const SOLVE_PROMPT: &str = "Solve the following task. To solve the problem, we have made a \
step-by-step plan and retrieved corresponding evidence for each step. Use them with caution \
since long evidence might contain irrelevant information.\n\n{plan}\n\nNow solve the task \
according to the evidence above. Respond with the answer directly, with no extra words.\n\n\
Task: {task}\nResponse:";

/// 求解节点
pub struct SolveNode {
    llm: Arc<dyn LlmClient>,
    prompt_template: String,
}

impl SolveNode {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            prompt_template: SOLVE_PROMPT.to_string(),
        }
    }

    pub fn with_prompt(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = template.into();
        self
    }

    /// 合成最终回答；模型失败转为 LlmError 由编排器决定呈现方式
    pub async fn solve(&self, state: &OrchestrationState) -> Result<String, AgentError> {
        let plan_with_evidence = resolve_plan_text(&state.plan_text, &state.evidence);
        let prompt = self
            .prompt_template
            .replace("{plan}", &plan_with_evidence)
            .replace("{task}", &state.task);

        let mut messages: Vec<Turn> = state.history.clone();
        messages.push(Turn::user(prompt));
        self.llm
            .complete(&messages)
            .await
            .map_err(AgentError::LlmError)
    }
}
