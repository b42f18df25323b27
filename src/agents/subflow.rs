//! 子工作流引擎：生成 -> 评估 -> 带反馈重试 -> 补偿回滚
//!
//! 用于一次成形不可信的结构化工件构造（查询 / 视图 / 洞察）。状态机：
//! generate -> evaluate -> {接受: 终止, 重试: 带反馈回到 generate, 耗尽: 补偿撤销后终止}。
//! 生成/评估自身的错误归类为 Incorrect 并附合成反馈，进入重试而非立刻失败。
//! 不变式：尝试次数单调递增且不超过上限；所有终端路径都产出非空 final_result；
//! 有副作用的工件在耗尽路径上恰好触发一次 undo。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 生成尝试上限
pub const MAX_ATTEMPTS: u32 = 3;
/// 「信息不足」（maybe）可被宣告的次数上限，与尝试计数相互独立
pub const MAX_INSUFFICIENT: u32 = 3;

/// 评估结论
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubflowStatus {
    Pending,
    Correct,
    Incorrect,
    Maybe,
}

/// 单次评估结果：结论 + 可选反馈（Incorrect 时进入下一轮生成 Prompt）
#[derive(Clone, Debug)]
pub struct Evaluation {
    pub status: SubflowStatus,
    pub feedback: Option<String>,
}

impl Evaluation {
    pub fn correct() -> Self {
        Self {
            status: SubflowStatus::Correct,
            feedback: None,
        }
    }

    pub fn incorrect(feedback: impl Into<String>) -> Self {
        Self {
            status: SubflowStatus::Incorrect,
            feedback: Some(feedback.into()),
        }
    }

    pub fn maybe() -> Self {
        Self {
            status: SubflowStatus::Maybe,
            feedback: None,
        }
    }
}

/// 工件构造流程：引擎对工件类型无感知，生成/评估/探索/撤销全部交给实现
#[async_trait]
pub trait ArtifactFlow: Send + Sync {
    type Artifact: Send + Sync;

    /// 生成工件；重试时携带上一工件与评估反馈
    async fn generate(
        &self,
        task: &str,
        attempt: u32,
        prior: Option<(&Self::Artifact, &str)>,
    ) -> Result<Self::Artifact, String>;

    /// 评估工件；context 为 maybe 探索积累的补充上下文（首轮为空）
    async fn evaluate(
        &self,
        task: &str,
        artifact: &Self::Artifact,
        context: &str,
    ) -> Result<Evaluation, String>;

    /// maybe 时收集补充上下文（探索性子查询）；默认无补充
    async fn explore(&self, _task: &str, _artifact: &Self::Artifact) -> Result<String, String> {
        Ok(String::new())
    }

    /// 工件是否有外部副作用（决定耗尽路径是否需要补偿撤销）
    fn has_side_effects(&self) -> bool {
        false
    }

    /// 补偿撤销：显式的手工回滚，不是事务回退
    async fn undo(&self, _artifact: &Self::Artifact) -> Result<(), String> {
        Ok(())
    }

    /// 被接受的工件呈现给调用方的最终文本（含自然语言解释）
    fn render(&self, artifact: &Self::Artifact) -> String;
}

/// 子工作流终态
#[derive(Clone, Debug)]
pub struct SubflowOutcome {
    pub status: SubflowStatus,
    /// 所有终端路径均非空
    pub final_result: String,
    pub attempts: u32,
    /// 耗尽路径是否执行了补偿撤销
    pub undo_performed: bool,
}

/// 子工作流引擎配置
#[derive(Clone, Copy, Debug)]
pub struct SubflowConfig {
    pub max_attempts: u32,
    pub max_insufficient: u32,
}

impl Default for SubflowConfig {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            max_insufficient: MAX_INSUFFICIENT,
        }
    }
}

/// 子工作流引擎
pub struct SubflowEngine<F: ArtifactFlow> {
    flow: F,
    config: SubflowConfig,
}

impl<F: ArtifactFlow> SubflowEngine<F> {
    pub fn new(flow: F) -> Self {
        Self {
            flow,
            config: SubflowConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SubflowConfig) -> Self {
        self.config = config;
        self
    }

    pub fn flow(&self) -> &F {
        &self.flow
    }

    /// 执行完整的 生成/评估/重试/回滚 循环
    pub async fn run(&self, task: &str) -> SubflowOutcome {
        let mut attempt: u32 = 0;
        let mut insufficient: u32 = 0;
        let mut feedback: Option<String> = None;
        // 上一轮被否决的工件：既供下一轮生成参考，也是耗尽路径的撤销对象
        let mut prior: Option<F::Artifact> = None;

        while attempt < self.config.max_attempts {
            attempt += 1;
            tracing::debug!(attempt, "subflow generate");

            let prior_ref = match (&prior, &feedback) {
                (Some(a), Some(f)) => Some((a, f.as_str())),
                _ => None,
            };
            let artifact = match self.flow.generate(task, attempt, prior_ref).await {
                Ok(a) => a,
                Err(e) => {
                    // 生成错误按 Incorrect 处理：合成反馈，消耗一次尝试
                    feedback = Some(format!("generation failed: {e}"));
                    continue;
                }
            };

            // 评估；maybe 时探索补充上下文后重评，受独立计数约束
            let mut gathered = String::new();
            let evaluation = loop {
                let eval = match self.flow.evaluate(task, &artifact, &gathered).await {
                    Ok(eval) => eval,
                    Err(e) => break Evaluation::incorrect(format!("evaluation failed: {e}")),
                };
                if eval.status != SubflowStatus::Maybe {
                    break eval;
                }
                insufficient += 1;
                if insufficient >= self.config.max_insufficient {
                    // 信息不足宣告次数耗尽：带着已收集的上下文强制接受
                    tracing::debug!(insufficient, "subflow forcing acceptance");
                    break Evaluation::correct();
                }
                match self.flow.explore(task, &artifact).await {
                    Ok(extra) => {
                        if !extra.is_empty() {
                            gathered.push_str(&extra);
                            gathered.push('\n');
                        }
                    }
                    Err(e) => break Evaluation::incorrect(format!("exploration failed: {e}")),
                }
            };

            if evaluation.status == SubflowStatus::Correct {
                return SubflowOutcome {
                    status: SubflowStatus::Correct,
                    final_result: self.flow.render(&artifact),
                    attempts: attempt,
                    undo_performed: false,
                };
            }

            feedback = Some(
                evaluation
                    .feedback
                    .unwrap_or_else(|| "result did not match the task".to_string()),
            );
            prior = Some(artifact);
        }

        // 尝试耗尽：失败终态 + 必要时补偿撤销（恰好一次）
        let mut undo_performed = false;
        if self.flow.has_side_effects() {
            if let Some(artifact) = &prior {
                if let Err(e) = self.flow.undo(artifact).await {
                    tracing::warn!(error = %e, "subflow undo failed");
                }
                undo_performed = true;
            }
        }

        let reason = feedback.unwrap_or_else(|| "no attempt produced a usable artifact".to_string());
        SubflowOutcome {
            status: SubflowStatus::Incorrect,
            final_result: format!(
                "Failed after {} attempts: {}",
                self.config.max_attempts, reason
            ),
            attempts: attempt,
            undo_performed,
        }
    }
}

/// 把子工作流引擎包装成可注册的智能体节点：步骤的解析输入即子任务描述，
/// 子工作流的失败也是数据（final_result 占位文本），不向编排器抛错
pub struct SubflowNode<F: ArtifactFlow> {
    name: String,
    engine: SubflowEngine<F>,
}

impl<F: ArtifactFlow> SubflowNode<F> {
    pub fn new(name: impl Into<String>, engine: SubflowEngine<F>) -> Self {
        Self {
            name: name.into(),
            engine,
        }
    }
}

#[async_trait]
impl<F: ArtifactFlow + 'static> crate::agents::AgentNode for SubflowNode<F> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(
        &self,
        _state: &crate::core::OrchestrationState,
        _step: &crate::core::Step,
        resolved_input: &str,
    ) -> Result<String, crate::core::AgentError> {
        let outcome = self.engine.run(resolved_input).await;
        tracing::info!(
            node = %self.name,
            status = ?outcome.status,
            attempts = outcome.attempts,
            undo = outcome.undo_performed,
            "subflow finished"
        );
        Ok(outcome.final_result)
    }
}
