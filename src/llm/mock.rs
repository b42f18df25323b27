//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 预置脚本化回复：文本、结构化对象、工具调用记录各一个队列，按调用顺序弹出；
//! 队列耗尽时回退为回显最后一条 User 消息，便于本地跑通编排流程。

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream;
use serde_json::Value;

use crate::llm::{LlmClient, ToolCallRecord, ToolChoice, ToolSpec};
use crate::memory::{Role, Turn};

/// Mock 客户端：按脚本弹出预置回复
#[derive(Debug, Default)]
pub struct MockLlmClient {
    responses: Mutex<VecDeque<String>>,
    structured: Mutex<VecDeque<Value>>,
    tool_calls: Mutex<VecDeque<Vec<ToolCallRecord>>>,
    fail_next: Mutex<bool>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置一批文本回复（complete / complete_stream 共用）
    pub fn with_responses<I, S>(self, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut queue = self.responses.lock().unwrap();
            queue.extend(responses.into_iter().map(Into::into));
        }
        self
    }

    /// 预置一批结构化回复
    pub fn with_structured<I>(self, values: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        {
            let mut queue = self.structured.lock().unwrap();
            queue.extend(values);
        }
        self
    }

    /// 预置一批工具调用记录
    pub fn with_tool_calls<I>(self, calls: I) -> Self
    where
        I: IntoIterator<Item = Vec<ToolCallRecord>>,
    {
        {
            let mut queue = self.tool_calls.lock().unwrap();
            queue.extend(calls);
        }
        self
    }

    /// 让下一次调用直接失败（模拟网络/服务异常）
    pub fn fail_next(&self) {
        *self.fail_next.lock().unwrap() = true;
    }

    fn take_failure(&self) -> Option<String> {
        let mut flag = self.fail_next.lock().unwrap();
        if *flag {
            *flag = false;
            Some("mock llm failure".to_string())
        } else {
            None
        }
    }

    fn echo(&self, messages: &[Turn]) -> String {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::User))
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        format!("Echo from Mock: {}", last_user)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Turn]) -> Result<String, String> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        let scripted = self.responses.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or_else(|| self.echo(messages)))
    }

    async fn complete_stream(
        &self,
        messages: &[Turn],
    ) -> Result<Pin<Box<dyn futures_util::Stream<Item = Result<String, String>> + Send>>, String>
    {
        let content = self.complete(messages).await?;
        // 按字符切成小块模拟流式输出，供 PlanStream 的增量路径吃到多块
        let chars: Vec<char> = content.chars().collect();
        let chunks: Vec<Result<String, String>> = chars
            .chunks(16)
            .map(|c| Ok(c.iter().collect()))
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }

    async fn complete_structured(
        &self,
        _messages: &[Turn],
        _schema: &Value,
    ) -> Result<Value, String> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        self.structured
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| "no scripted structured response".to_string())
    }

    async fn complete_with_tools(
        &self,
        _messages: &[Turn],
        _tools: &[ToolSpec],
        _choice: ToolChoice,
    ) -> Result<Vec<ToolCallRecord>, String> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        Ok(self.tool_calls.lock().unwrap().pop_front().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_then_echo() {
        let mock = MockLlmClient::new().with_responses(["first", "second"]);
        let msgs = vec![Turn::user("hello")];
        assert_eq!(mock.complete(&msgs).await.unwrap(), "first");
        assert_eq!(mock.complete(&msgs).await.unwrap(), "second");
        assert_eq!(
            mock.complete(&msgs).await.unwrap(),
            "Echo from Mock: hello"
        );
    }

    #[tokio::test]
    async fn test_fail_next() {
        let mock = MockLlmClient::new().with_responses(["ok"]);
        mock.fail_next();
        assert!(mock.complete(&[Turn::user("x")]).await.is_err());
        assert_eq!(mock.complete(&[Turn::user("x")]).await.unwrap(), "ok");
    }
}
