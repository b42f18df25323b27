//! 编排器：主控循环
//!
//! 外部输入 -> 规划（流式，逐步进度通知）-> 路由 -> {智能体节点 | 直接回复} 循环
//! -> 求解 -> 输出；每次状态机转移后写检查点，线程恢复时取最新检查点的历史续接上下文。
//! 同一线程同一时刻只允许一个在途任务（调用方纪律，核心不排队）。

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::agents::{NodeRegistry, SolveNode};
use crate::checkpoint::{CheckpointMetadata, CheckpointSource, CheckpointStore};
use crate::core::{next_node, AgentError, OrchestrationState, OrchestratorEvent, Route};
use crate::memory::{ConversationHistory, Turn};
use crate::planner::{resolve_input, PlanOutcome, Planner};

/// 事件中工具结果预览的最大字符数
const RESULT_PREVIEW_CHARS: usize = 200;

/// 规划失败时的用户可见回复
const PLANNING_FAILURE_TEXT: &str =
    "There was a problem creating a response. Please try again.";

/// 任务终态
#[derive(Clone, Debug)]
pub struct TaskOutcome {
    /// 最终回答（result 或 direct_response 文本）
    pub result: String,
    /// 是否经由直接回复终止
    pub direct: bool,
    /// 终态完整状态快照
    pub state: OrchestrationState,
}

/// 编排器：持有规划器、求解节点、节点注册表与检查点存储
pub struct Orchestrator {
    planner: Planner,
    solver: SolveNode,
    registry: NodeRegistry,
    checkpoints: Arc<dyn CheckpointStore>,
    /// 规划 Prompt 中的工具目录文本
    catalog: String,
    /// 喂给模型的历史轮数上限
    max_history_turns: usize,
}

fn send_event(tx: &Option<&mpsc::UnboundedSender<OrchestratorEvent>>, ev: OrchestratorEvent) {
    if let Some(t) = tx {
        let _ = t.send(ev);
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() > RESULT_PREVIEW_CHARS {
        let cut: String = text.chars().take(RESULT_PREVIEW_CHARS).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

impl Orchestrator {
    pub fn new(
        planner: Planner,
        solver: SolveNode,
        registry: NodeRegistry,
        checkpoints: Arc<dyn CheckpointStore>,
        catalog: impl Into<String>,
    ) -> Self {
        Self {
            planner,
            solver,
            registry,
            checkpoints,
            catalog: catalog.into(),
            max_history_turns: 20,
        }
    }

    pub fn with_max_history(mut self, max_turns: usize) -> Self {
        self.max_history_turns = max_turns;
        self
    }

    pub fn node_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// 执行一个任务直至终态
    ///
    /// event_tx 可选：规划步骤、工具结果、最终回答的进度事件。
    /// 致命路由错误（未注册工具等）以 Err 返回；其余失败都化为用户可见文本。
    pub async fn run_task(
        &self,
        thread_id: &str,
        task: &str,
        event_tx: Option<&mpsc::UnboundedSender<OrchestratorEvent>>,
        cancel_token: CancellationToken,
    ) -> Result<TaskOutcome, AgentError> {
        // 取线程最新检查点恢复历史
        let prior_history = match self.checkpoints.get(thread_id, None).await? {
            Some(cp) => cp.state.history,
            None => Vec::new(),
        };
        let history = ConversationHistory::from_turns(prior_history, self.max_history_turns);

        let mut state = OrchestrationState::new(task, history.turns().to_vec());

        // 规划：流式消费，语法单元完成即发进度事件；权威解析基于全文
        let plan = self
            .planner
            .plan(task, history.pruned(), &self.catalog, |step| {
                send_event(
                    &event_tx,
                    OrchestratorEvent::PlanStep {
                        id: step.id.to_string(),
                        tool: step.tool_name.clone(),
                        input: step.raw_input.clone(),
                        description: step.description.clone(),
                    },
                );
            })
            .await;
        match plan {
            Ok(PlanOutcome::Steps(parsed)) => {
                state.plan_text = parsed.plan_text.clone();
                state.steps = parsed.steps;
                send_event(
                    &event_tx,
                    OrchestratorEvent::Plan {
                        text: parsed.plan_text,
                    },
                );
            }
            Ok(PlanOutcome::Direct(text)) => {
                state.plan_text = text.clone();
                state.direct_response = Some(text);
            }
            Err(e) => {
                // 规划错误：优雅终止为用户可见的直接回复，不保留部分证据
                tracing::warn!(error = %e, "planning failed");
                state.direct_response = Some(PLANNING_FAILURE_TEXT.to_string());
            }
        }

        self.checkpoints
            .put(
                thread_id,
                &state,
                CheckpointMetadata::new(CheckpointSource::Input, -1),
            )
            .await?;

        // 路由循环：每步执行后写 Loop 检查点
        let mut step_index: i64 = 0;
        let result = loop {
            if cancel_token.is_cancelled() {
                send_event(
                    &event_tx,
                    OrchestratorEvent::Error {
                        text: "Cancelled by user".to_string(),
                    },
                );
                return Err(AgentError::Cancelled);
            }

            match next_node(&state)? {
                Route::Direct => {
                    let text = state
                        .direct_response
                        .clone()
                        .unwrap_or_else(|| PLANNING_FAILURE_TEXT.to_string());
                    state.result = text.clone();
                    send_event(
                        &event_tx,
                        OrchestratorEvent::DirectResponse { text: text.clone() },
                    );
                    break text;
                }
                Route::Solve => {
                    let answer = match self.solver.solve(&state).await {
                        Ok(answer) => answer,
                        Err(e) => {
                            // 求解失败同样以终端消息收场，任务不悬置
                            tracing::warn!(error = %e, "solve failed");
                            PLANNING_FAILURE_TEXT.to_string()
                        }
                    };
                    state.result = answer.clone();
                    send_event(
                        &event_tx,
                        OrchestratorEvent::Result {
                            text: answer.clone(),
                        },
                    );
                    break answer;
                }
                Route::Agent(name) => {
                    let node = self
                        .registry
                        .resolve(&name)
                        .ok_or_else(|| AgentError::UnknownTool(name.clone()))?;
                    let step = state.next_step().ok_or(AgentError::NoMoreSteps)?.clone();
                    state.selected_agent = name.clone();

                    let resolved = resolve_input(&step.raw_input, &state.evidence)?;
                    let result = node.run(&state, &step, &resolved).await?;
                    send_event(
                        &event_tx,
                        OrchestratorEvent::Tool {
                            id: step.id.to_string(),
                            tool: name,
                            result: preview(&result),
                        },
                    );
                    state.record_evidence(step.id.clone(), result);

                    self.checkpoints
                        .put(
                            thread_id,
                            &state,
                            CheckpointMetadata::new(CheckpointSource::Loop, step_index)
                                .with_writes(serde_json::json!({
                                    "evidence": step.id.as_str(),
                                })),
                        )
                        .await?;
                    step_index += 1;
                }
            }
        };

        // 终态：追加本周期的对话轮次并写收尾检查点
        let direct = state.direct_response.is_some();
        state.history.push(Turn::user(task));
        state.history.push(Turn::assistant(result.clone()));
        self.checkpoints
            .put(
                thread_id,
                &state,
                CheckpointMetadata::new(CheckpointSource::Update, step_index),
            )
            .await?;

        Ok(TaskOutcome {
            result,
            direct,
            state,
        })
    }
}
