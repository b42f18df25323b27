//! 计算工具
//!
//! 接受「<运算词> <数> <数>」形式的文本（multiply / divide / add / subtract），
//! 也接受 `3 * 6` 这类中缀写法；整数结果不带小数点输出。

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::Tool;

/// 四则运算工具
#[derive(Debug, Default)]
pub struct CalculateTool;

#[async_trait]
impl Tool for CalculateTool {
    fn name(&self) -> &str {
        "calculate"
    }

    fn description(&self) -> &str {
        "Performs arithmetic. Input: '<op> <a> <b>' where op is multiply/divide/add/subtract, or an infix expression like '3 * 6'."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "input": { "type": "string", "description": "arithmetic expression" }
            },
            "required": ["input"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let input = args
            .get("input")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "missing 'input' argument".to_string())?;
        evaluate(input)
    }
}

fn evaluate(input: &str) -> Result<String, String> {
    let tokens: Vec<&str> = input.split_whitespace().collect();
    let (op, a, b) = match tokens.as_slice() {
        [op, a, b] if parse_op(op).is_some() => (parse_op(op).unwrap(), *a, *b),
        // 中缀：3 * 6
        [a, op, b] if parse_op(op).is_some() => (parse_op(op).unwrap(), *a, *b),
        _ => return Err(format!("cannot parse expression: {input}")),
    };
    let a: f64 = a.parse().map_err(|_| format!("not a number: {a}"))?;
    let b: f64 = b.parse().map_err(|_| format!("not a number: {b}"))?;
    let result = match op {
        Op::Add => a + b,
        Op::Sub => a - b,
        Op::Mul => a * b,
        Op::Div => {
            if b == 0.0 {
                return Err("division by zero".to_string());
            }
            a / b
        }
    };
    Ok(format_number(result))
}

#[derive(Clone, Copy)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
}

fn parse_op(word: &str) -> Option<Op> {
    match word {
        "add" | "plus" | "+" => Some(Op::Add),
        "subtract" | "minus" | "-" => Some(Op::Sub),
        "multiply" | "times" | "*" | "x" => Some(Op::Mul),
        "divide" | "/" => Some(Op::Div),
        _ => None,
    }
}

/// 整数结果去掉小数位（18 而非 18.0）
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_word_forms() {
        let tool = CalculateTool;
        let run = |expr: &str| {
            let args = serde_json::json!({ "input": expr });
            let tool = &tool;
            async move { tool.execute(args).await }
        };
        assert_eq!(run("multiply 3 6").await.unwrap(), "18");
        assert_eq!(run("divide 18 2").await.unwrap(), "9");
        assert_eq!(run("add 1 2").await.unwrap(), "3");
        assert_eq!(run("subtract 5 9").await.unwrap(), "-4");
    }

    #[tokio::test]
    async fn test_infix_and_errors() {
        let tool = CalculateTool;
        let out = tool
            .execute(serde_json::json!({"input": "3 * 6"}))
            .await
            .unwrap();
        assert_eq!(out, "18");
        assert!(tool
            .execute(serde_json::json!({"input": "divide 1 0"}))
            .await
            .is_err());
        assert!(tool
            .execute(serde_json::json!({"input": "frobnicate"}))
            .await
            .is_err());
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(18.0), "18");
        assert_eq!(format_number(4.5), "4.5");
    }
}
