//! 计划解析
//!
//! 识别模型输出中重复出现的语法单元 `Plan: <描述> #E<n> = <工具名>[<输入>]`，
//! 按文本顺序产出 Step；零匹配时整段文本视为直接回复。工具名是否注册推迟到执行期校验。

use std::sync::OnceLock;

use regex::Regex;

use crate::core::{Step, StepId};

/// 计划语法单元；description 取 `Plan:` 与步骤标识之间的文本
const PLAN_UNIT: &str = r"Plan:\s*([^#]+)(#E\d+)\s*=\s*(\w+)\[([^\]]*)\]";

fn plan_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PLAN_UNIT).expect("plan unit pattern"))
}

/// 解析结果：步骤列表与完整计划文本
#[derive(Clone, Debug)]
pub struct ParsedPlan {
    pub steps: Vec<Step>,
    pub plan_text: String,
}

impl ParsedPlan {
    /// 零步骤即直接回复
    pub fn is_direct(&self) -> bool {
        self.steps.is_empty()
    }
}

/// 对完整累积文本做权威解析；流式中间态不得作为最终结果
pub fn parse_plan(raw: &str) -> ParsedPlan {
    let steps = scan_steps(raw);
    ParsedPlan {
        steps,
        plan_text: raw.to_string(),
    }
}

fn scan_steps(text: &str) -> Vec<Step> {
    plan_regex()
        .captures_iter(text)
        .filter_map(|cap| {
            let id = StepId::parse(cap.get(2)?.as_str()).ok()?;
            Some(Step {
                description: cap.get(1)?.as_str().trim().to_string(),
                id,
                tool_name: cap.get(3)?.as_str().to_string(),
                raw_input: cap.get(4)?.as_str().trim().to_string(),
            })
        })
        .collect()
}

/// 流式计划扫描器：逐块累积文本并报告新完成的语法单元，仅用于进度通知
///
/// 与权威解析是同一 token 流的两个独立消费者：这里只产生副作用（进度事件），
/// 控制流决策一律基于 finalize 的全文解析。
#[derive(Debug, Default)]
pub struct PlanStream {
    buffer: String,
    reported: usize,
}

impl PlanStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一块流式文本，返回本块之后新完成的步骤（可能为空）
    pub fn push_chunk(&mut self, chunk: &str) -> Vec<Step> {
        self.buffer.push_str(chunk);
        let steps = scan_steps(&self.buffer);
        if steps.len() > self.reported {
            let fresh = steps[self.reported..].to_vec();
            self.reported = steps.len();
            fresh
        } else {
            Vec::new()
        }
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// 对全部累积文本做权威解析
    pub fn finalize(self) -> ParsedPlan {
        parse_plan(&self.buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_STEP_PLAN: &str = "\
Plan: Multiply the two numbers first. #E1 = calculate[multiply 3 6]\n\
Plan: Divide the product by two. #E2 = calculate[divide #E1 2]\n";

    #[test]
    fn test_parse_two_steps_in_order() {
        let plan = parse_plan(TWO_STEP_PLAN);
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].id.as_str(), "#E1");
        assert_eq!(plan.steps[0].tool_name, "calculate");
        assert_eq!(plan.steps[0].raw_input, "multiply 3 6");
        assert_eq!(plan.steps[1].id.as_str(), "#E2");
        assert_eq!(plan.steps[1].raw_input, "divide #E1 2");
        assert!(plan.steps[0].description.contains("Multiply"));
    }

    #[test]
    fn test_zero_steps_is_direct() {
        let plan = parse_plan("Hey! Nice to meet you, Pepe.");
        assert!(plan.is_direct());
        assert_eq!(plan.plan_text, "Hey! Nice to meet you, Pepe.");
    }

    #[test]
    fn test_unknown_tool_kept_for_execution_time() {
        let plan = parse_plan("Plan: Do it. #E1 = nosuchtool[whatever]");
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].tool_name, "nosuchtool");
    }

    #[test]
    fn test_input_without_reference_is_valid() {
        let plan = parse_plan("Plan: Look up the capital. #E1 = search[capital of France]");
        assert_eq!(plan.steps[0].raw_input, "capital of France");
    }

    #[test]
    fn test_stream_reports_steps_incrementally() {
        let mut stream = PlanStream::new();
        assert!(stream.push_chunk("Plan: Multiply. #E1 = calc").is_empty());
        let first = stream.push_chunk("ulate[multiply 3 6]\nPlan: Div");
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id.as_str(), "#E1");
        let second = stream.push_chunk("ide. #E2 = calculate[divide #E1 2]\n");
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id.as_str(), "#E2");

        // 权威解析仍基于全文
        let plan = stream.finalize();
        assert_eq!(plan.steps.len(), 2);
    }

    #[test]
    fn test_stream_partial_never_final() {
        let mut stream = PlanStream::new();
        stream.push_chunk("Plan: Multiply. #E1 = calculate[multiply 3 6]");
        // 中途 finalize 只包含已完整的单元
        let plan = stream.finalize();
        assert_eq!(plan.steps.len(), 1);
    }
}
