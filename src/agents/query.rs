//! 数据找回智能体：构造查询的子工作流
//!
//! 生成 SQL 查询 + 自然语言解释，在目标库上执行并采样有界前缀交由裁定器分类；
//! 纯读查询无副作用，无需补偿撤销。

use std::sync::Arc;

use async_trait::async_trait;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use crate::agents::judge::Judge;
use crate::agents::subflow::{ArtifactFlow, Evaluation, SubflowEngine, SubflowNode};
use crate::llm::LlmClient;
use crate::memory::Turn;
use crate::tools::DatabaseBackend;

/// 评估时采样的最大行数
const SAMPLE_ROWS: usize = 5;

const GENERATE_PROMPT: &str = "Write a SQL query that answers the request below, together \
with a short explanation in plain language.\n\
Database schema:\n{schema}\n\
Request: {task}\n{retry_block}";

/// 查询工件：查询文本 + 人类可读解释
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct QueryArtifact {
    pub query: String,
    pub explanation: String,
}

/// 查询构造流程
pub struct QueryFlow {
    llm: Arc<dyn LlmClient>,
    db: Arc<dyn DatabaseBackend>,
    judge: Judge,
}

impl QueryFlow {
    pub fn new(llm: Arc<dyn LlmClient>, db: Arc<dyn DatabaseBackend>) -> Self {
        let judge = Judge::new(llm.clone());
        Self { llm, db, judge }
    }

    async fn generate_artifact(
        &self,
        task: &str,
        prior: Option<(&QueryArtifact, &str)>,
    ) -> Result<QueryArtifact, String> {
        let schema_summary = self.db.schema_summary().await?;
        let retry_block = match prior {
            Some((artifact, feedback)) => format!(
                "A previous attempt was rejected.\nPrevious query: {}\nFeedback: {}\n",
                artifact.query, feedback
            ),
            None => String::new(),
        };
        let prompt = GENERATE_PROMPT
            .replace("{schema}", &schema_summary)
            .replace("{task}", task)
            .replace("{retry_block}", &retry_block);

        let schema =
            serde_json::to_value(schema_for!(QueryArtifact)).map_err(|e| e.to_string())?;
        let value = self
            .llm
            .complete_structured(&[Turn::user(prompt)], &schema)
            .await?;
        serde_json::from_value(value).map_err(|e| format!("artifact parse: {e}"))
    }
}

/// 行采样序列化为紧凑 JSON，供裁定 Prompt 使用
pub(crate) fn sample_text(rows: &[serde_json::Value], limit: usize) -> String {
    let sample: Vec<&serde_json::Value> = rows.iter().take(limit).collect();
    serde_json::to_string(&sample).unwrap_or_else(|_| "[]".to_string())
}

#[async_trait]
impl ArtifactFlow for QueryFlow {
    type Artifact = QueryArtifact;

    async fn generate(
        &self,
        task: &str,
        _attempt: u32,
        prior: Option<(&QueryArtifact, &str)>,
    ) -> Result<QueryArtifact, String> {
        self.generate_artifact(task, prior).await
    }

    async fn evaluate(
        &self,
        task: &str,
        artifact: &QueryArtifact,
        context: &str,
    ) -> Result<Evaluation, String> {
        let rows = match self.db.run_query(&artifact.query).await {
            Ok(rows) => rows,
            // 查询本身跑不起来：直接判 Incorrect 进入重试
            Err(e) => return Ok(Evaluation::incorrect(format!("query failed: {e}"))),
        };
        let sample = sample_text(&rows, SAMPLE_ROWS);
        self.judge
            .classify(task, &artifact.query, &sample, context)
            .await
    }

    fn render(&self, artifact: &QueryArtifact) -> String {
        format!("{}\n\nQuery:\n{}", artifact.explanation, artifact.query)
    }
}

/// 构建可注册的数据找回节点
pub fn recover_data_node(
    llm: Arc<dyn LlmClient>,
    db: Arc<dyn DatabaseBackend>,
) -> SubflowNode<QueryFlow> {
    SubflowNode::new("recover_data", SubflowEngine::new(QueryFlow::new(llm, db)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::tools::SqliteDatabase;

    fn seeded_db() -> Arc<SqliteDatabase> {
        let db = SqliteDatabase::open_in_memory().unwrap();
        db.execute_batch(
            "CREATE TABLE orders (id INTEGER PRIMARY KEY, amount REAL, customer TEXT);
             INSERT INTO orders VALUES (1, 10.5, 'ada'), (2, 20.0, 'bob');",
        )
        .unwrap();
        Arc::new(db)
    }

    #[tokio::test]
    async fn test_accepts_working_query() {
        let llm = Arc::new(
            MockLlmClient::new().with_structured([
                serde_json::json!({
                    "query": "SELECT customer, amount FROM orders ORDER BY id",
                    "explanation": "Lists every order with its customer."
                }),
                serde_json::json!({ "verdict": "correct", "feedback": null }),
            ]),
        );
        let flow = QueryFlow::new(llm, seeded_db());
        let engine = SubflowEngine::new(flow);
        let outcome = engine.run("list all orders").await;
        assert_eq!(outcome.status, crate::agents::subflow::SubflowStatus::Correct);
        assert!(outcome.final_result.contains("SELECT customer"));
        assert!(outcome.final_result.contains("Lists every order"));
    }

    #[tokio::test]
    async fn test_broken_query_retries_with_feedback() {
        let llm = Arc::new(
            MockLlmClient::new().with_structured([
                // 第一轮：引用不存在的表
                serde_json::json!({
                    "query": "SELECT * FROM missing_table",
                    "explanation": "first try"
                }),
                // 第二轮：修正
                serde_json::json!({
                    "query": "SELECT * FROM orders",
                    "explanation": "second try"
                }),
                serde_json::json!({ "verdict": "correct", "feedback": null }),
            ]),
        );
        let flow = QueryFlow::new(llm, seeded_db());
        let engine = SubflowEngine::new(flow);
        let outcome = engine.run("list all orders").await;
        assert_eq!(outcome.status, crate::agents::subflow::SubflowStatus::Correct);
        assert_eq!(outcome.attempts, 2);
    }

    #[test]
    fn test_sample_text_bounds_rows() {
        let rows: Vec<serde_json::Value> =
            (0..10).map(|i| serde_json::json!({ "n": i })).collect();
        let text = sample_text(&rows, 3);
        assert!(text.contains("\"n\":2"));
        assert!(!text.contains("\"n\":3"));
    }
}
