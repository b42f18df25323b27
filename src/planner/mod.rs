//! 规划层：计划生成、计划解析、证据替换
//!
//! Planner 持有 LLM 与规划 Prompt 模板，流式消费模型输出：PlanStream 增量报告
//! 已完成的语法单元（进度通知），全文累积后做权威解析。零步骤输出即直接回复。

pub mod evidence;
pub mod parser;

pub use evidence::{resolve_input, resolve_plan_text};
pub use parser::{parse_plan, ParsedPlan, PlanStream};

use std::sync::Arc;

use futures_util::StreamExt;

use crate::core::{AgentError, Step};
use crate::llm::LlmClient;
use crate::memory::Turn;

/// 默认规划 Prompt：任务 + 工具目录，要求逐步产出 Plan/#E 语法单元
const PLAN_PROMPT: &str = "For the following task, make plans that can solve the problem \
step by step. For each plan, indicate which external tool together with tool input to \
retrieve evidence. You can store the evidence into a variable #E<n> that can be referenced \
by later tools, e.g. #E1, #E2.\n\n\
Each step must have the exact form:\n\
Plan: <description> #E<n> = <tool>[<input>]\n\n\
Tools can be one of the following:\n{tools}\n\n\
If the task needs no tool at all, reply directly in plain text without any Plan line.\n\n\
Task: {task}";

/// 规划结果：步骤计划 或 直接回复
#[derive(Clone, Debug)]
pub enum PlanOutcome {
    Steps(ParsedPlan),
    Direct(String),
}

/// Planner：持有 LLM 与规划 Prompt 模板
pub struct Planner {
    llm: Arc<dyn LlmClient>,
    prompt_template: String,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            prompt_template: PLAN_PROMPT.to_string(),
        }
    }

    pub fn with_prompt(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = template.into();
        self
    }

    /// 获取 LLM 累计 token 使用统计
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    /// 流式规划：on_step 在每个语法单元完成时回调（仅进度用途）；
    /// 返回值一律基于全文的权威解析。模型失败返回 PlanningFailed。
    pub async fn plan(
        &self,
        task: &str,
        history: &[Turn],
        catalog: &str,
        mut on_step: impl FnMut(&Step) + Send,
    ) -> Result<PlanOutcome, AgentError> {
        let prompt = self
            .prompt_template
            .replace("{tools}", catalog)
            .replace("{task}", task);
        let mut messages: Vec<Turn> = history.to_vec();
        messages.push(Turn::user(prompt));

        let mut stream = self
            .llm
            .complete_stream(&messages)
            .await
            .map_err(AgentError::PlanningFailed)?;

        let mut plan_stream = PlanStream::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(AgentError::PlanningFailed)?;
            for step in plan_stream.push_chunk(&chunk) {
                on_step(&step);
            }
        }

        let parsed = plan_stream.finalize();
        if parsed.is_direct() {
            Ok(PlanOutcome::Direct(parsed.plan_text.trim().to_string()))
        } else {
            Ok(PlanOutcome::Steps(parsed))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[tokio::test]
    async fn test_plan_streams_progress_and_parses_full_text() {
        let llm = Arc::new(MockLlmClient::new().with_responses([
            "Plan: Multiply. #E1 = calculate[multiply 3 6]\nPlan: Divide. #E2 = calculate[divide #E1 2]\n",
        ]));
        let planner = Planner::new(llm);
        let mut seen = Vec::new();
        let outcome = planner
            .plan("what's 3*6 divided by 2", &[], "calculate: math", |s| {
                seen.push(s.id.as_str().to_string())
            })
            .await
            .unwrap();
        assert_eq!(seen, vec!["#E1", "#E2"]);
        match outcome {
            PlanOutcome::Steps(plan) => assert_eq!(plan.steps.len(), 2),
            PlanOutcome::Direct(_) => panic!("expected steps"),
        }
    }

    #[tokio::test]
    async fn test_plan_without_steps_is_direct() {
        let llm = Arc::new(MockLlmClient::new().with_responses(["Hi Pepe, nice to meet you!"]));
        let planner = Planner::new(llm);
        let outcome = planner
            .plan("Hey! I am Pepe", &[], "calculate: math", |_| {})
            .await
            .unwrap();
        match outcome {
            PlanOutcome::Direct(text) => assert_eq!(text, "Hi Pepe, nice to meet you!"),
            PlanOutcome::Steps(_) => panic!("expected direct"),
        }
    }

    #[tokio::test]
    async fn test_plan_llm_failure() {
        let llm = Arc::new(MockLlmClient::new());
        llm.fail_next();
        let planner = Planner::new(llm);
        let err = planner
            .plan("task", &[], "tools", |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::PlanningFailed(_)));
    }
}
