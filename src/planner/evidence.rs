//! 证据替换
//!
//! 将步骤输入中每个已知 #E<n> 记号替换为对应步骤的结果字符串。替换按完整记号匹配：
//! `#E\d+` 贪婪吞掉全部数字，因此 #E1 的规则不会命中 #E10（原实现的纯子串替换会，
//! 该歧义按重设计建议修复，见 DESIGN.md）。替换后仍残留的记号即引用了未执行步骤，
//! 属于致命的计划顺序错误。

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::core::{AgentError, StepId};

fn step_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#E\d+").expect("step id pattern"))
}

/// 解析步骤输入：替换全部已知证据引用；无引用时原样返回
pub fn resolve_input(
    raw_input: &str,
    evidence: &BTreeMap<StepId, String>,
) -> Result<String, AgentError> {
    let mut resolved = String::with_capacity(raw_input.len());
    let mut last_end = 0;
    for m in step_id_regex().find_iter(raw_input) {
        resolved.push_str(&raw_input[last_end..m.start()]);
        let id = StepId::parse(m.as_str())?;
        match evidence.get(&id) {
            Some(result) => resolved.push_str(result),
            None => return Err(AgentError::UnresolvedEvidence(m.as_str().to_string())),
        }
        last_end = m.end();
    }
    resolved.push_str(&raw_input[last_end..]);
    Ok(resolved)
}

/// 求解前对整段计划文本做同样替换，但容忍缺失证据（原文保留），
/// 供最终回答的 Prompt 引用每一步的实际结果。
pub fn resolve_plan_text(plan_text: &str, evidence: &BTreeMap<StepId, String>) -> String {
    let mut resolved = String::with_capacity(plan_text.len());
    let mut last_end = 0;
    for m in step_id_regex().find_iter(plan_text) {
        resolved.push_str(&plan_text[last_end..m.start()]);
        let replacement = StepId::parse(m.as_str())
            .ok()
            .and_then(|id| evidence.get(&id).cloned());
        match replacement {
            Some(result) => resolved.push_str(&result),
            None => resolved.push_str(m.as_str()),
        }
        last_end = m.end();
    }
    resolved.push_str(&plan_text[last_end..]);
    resolved
}
