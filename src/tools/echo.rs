//! Echo 工具：原样返回输入，联调与测试用

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::Tool;

#[derive(Debug, Default)]
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Returns its input unchanged."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "input": { "type": "string" }
            },
            "required": ["input"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let input = args
            .get("input")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "missing 'input' argument".to_string())?;
        Ok(input.to_string())
    }
}
