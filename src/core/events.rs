//! 编排过程事件：供 CLI / 网关推送进度与结果
//!
//! serde tag 与线上协议一致：plan / planStep / tool / result / directResponse / error。

use serde::Serialize;

/// 单次任务的过程事件（可序列化为 JSON 直接下发）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OrchestratorEvent {
    /// 权威计划文本（规划完成后一次性下发）
    Plan { text: String },
    /// 流式规划期间每完成一个语法单元下发一次（仅进度展示，非权威）
    PlanStep {
        id: String,
        tool: String,
        input: String,
        description: String,
    },
    /// 单步执行完成
    Tool {
        id: String,
        tool: String,
        result: String,
    },
    /// 最终回答
    Result { text: String },
    /// 直接回复（零步骤计划）
    DirectResponse { text: String },
    /// 错误
    Error { text: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_tags() {
        let ev = OrchestratorEvent::DirectResponse { text: "hi".into() };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "directResponse");

        let ev = OrchestratorEvent::PlanStep {
            id: "#E1".into(),
            tool: "calculate".into(),
            input: "multiply 3 6".into(),
            description: "multiply".into(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "planStep");
    }
}
