//! 路由：状态机转移决策
//!
//! 每个节点执行完毕后基于当前编排状态计算下一节点：直接回复 / 求解 / 下一步骤对应
//! 的智能体节点。纯函数，不触碰注册表；节点是否注册由派发方校验（未注册即致命错误）。

use crate::core::{AgentError, OrchestrationState};

/// 路由结果：direct 与 solve 均为终端节点
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    /// 零步骤计划：模型已直接给出回复
    Direct,
    /// 所有步骤均有证据：进入最终求解
    Solve,
    /// 执行下一个未完成步骤对应的节点（按工具名）
    Agent(String),
}

/// 计算下一节点
///
/// direct_response 先于完成度检查：直接回复的计划没有步骤，若先判
/// 「证据数 == 步骤数」会把 0 == 0 误判为 solve（决策记录见 DESIGN.md）。
pub fn next_node(state: &OrchestrationState) -> Result<Route, AgentError> {
    if state.direct_response.is_some() {
        return Ok(Route::Direct);
    }
    if state.is_complete() {
        if state.steps.is_empty() {
            // 既无步骤也无直接回复：规划阶段的约定被破坏
            return Err(AgentError::NoMoreSteps);
        }
        return Ok(Route::Solve);
    }
    let step = state.next_step().ok_or(AgentError::NoMoreSteps)?;
    Ok(Route::Agent(step.tool_name.clone()))
}
