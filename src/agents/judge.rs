//! 结果裁定：让模型把一次工件执行的结果分类为 correct / incorrect / maybe
//!
//! 三个工件流程共用。采样结果以有界前缀进入 Prompt，避免长结果撑爆上下文。

use std::sync::Arc;

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use crate::agents::subflow::{Evaluation, SubflowStatus};
use crate::llm::LlmClient;
use crate::memory::Turn;

/// 采样进入裁定 Prompt 的最大字符数
const SAMPLE_PREVIEW_CHARS: usize = 2000;

const JUDGE_PROMPT: &str = "You are checking whether an artifact produced for a task is correct.\n\
Task: {task}\n\
Artifact:\n{artifact}\n\
Execution sample (bounded prefix):\n{sample}\n\
{context_block}\
Classify the outcome as \"correct\", \"incorrect\" or \"maybe\" (maybe = not enough \
information to decide). If incorrect, give short feedback on what to change.";

/// 模型返回的裁定对象
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct VerdictJudgement {
    /// correct / incorrect / maybe
    pub verdict: String,
    pub feedback: Option<String>,
}

/// 裁定器：持有 LLM，classify 返回 Evaluation
pub struct Judge {
    llm: Arc<dyn LlmClient>,
}

impl Judge {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn classify(
        &self,
        task: &str,
        artifact: &str,
        sample: &str,
        context: &str,
    ) -> Result<Evaluation, String> {
        let sample_preview: String = sample.chars().take(SAMPLE_PREVIEW_CHARS).collect();
        let context_block = if context.is_empty() {
            String::new()
        } else {
            format!("Additional context gathered so far:\n{context}\n")
        };
        let prompt = JUDGE_PROMPT
            .replace("{task}", task)
            .replace("{artifact}", artifact)
            .replace("{sample}", &sample_preview)
            .replace("{context_block}", &context_block);

        let schema = serde_json::to_value(schema_for!(VerdictJudgement))
            .map_err(|e| e.to_string())?;
        let value = self
            .llm
            .complete_structured(&[Turn::user(prompt)], &schema)
            .await?;
        let judgement: VerdictJudgement =
            serde_json::from_value(value).map_err(|e| format!("verdict parse: {e}"))?;

        let status = match judgement.verdict.to_lowercase().as_str() {
            "correct" => SubflowStatus::Correct,
            "maybe" => SubflowStatus::Maybe,
            _ => SubflowStatus::Incorrect,
        };
        Ok(Evaluation {
            status,
            feedback: judgement.feedback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[tokio::test]
    async fn test_classify_parses_verdict() {
        let llm = Arc::new(MockLlmClient::new().with_structured([serde_json::json!({
            "verdict": "incorrect",
            "feedback": "wrong table"
        })]));
        let judge = Judge::new(llm);
        let eval = judge.classify("task", "SELECT 1", "[]", "").await.unwrap();
        assert_eq!(eval.status, SubflowStatus::Incorrect);
        assert_eq!(eval.feedback.as_deref(), Some("wrong table"));
    }

    #[tokio::test]
    async fn test_unknown_verdict_defaults_to_incorrect() {
        let llm = Arc::new(MockLlmClient::new().with_structured([serde_json::json!({
            "verdict": "garbled",
            "feedback": null
        })]));
        let judge = Judge::new(llm);
        let eval = judge.classify("task", "a", "s", "").await.unwrap();
        assert_eq!(eval.status, SubflowStatus::Incorrect);
    }
}
