//! 洞察智能体：探索性分析的子工作流
//!
//! 生成一组洞察与支撑查询；裁定为 maybe（信息不足）时提出探索性子查询补充上下文，
//! 受独立计数约束，宣告次数耗尽后带着已收集内容强制接受。无副作用。

use std::sync::Arc;

use async_trait::async_trait;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use crate::agents::judge::Judge;
use crate::agents::query::sample_text;
use crate::agents::subflow::{ArtifactFlow, Evaluation, SubflowEngine, SubflowNode};
use crate::llm::LlmClient;
use crate::memory::Turn;
use crate::tools::DatabaseBackend;

const SAMPLE_ROWS: usize = 5;

const GENERATE_PROMPT: &str = "Analyze the database below and produce a small set of \
insights answering the request, each backed by a SQL query.\n\
Database schema:\n{schema}\n\
Request: {task}\n{retry_block}";

const EXPLORE_PROMPT: &str = "You previously could not decide whether these insights hold. \
Propose ONE exploratory SQL query that would clarify the data.\n\
Insights:\n{insights}\n\
Request: {task}";

/// 洞察工件：洞察清单 + 各自的支撑查询
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct InsightArtifact {
    pub insights: Vec<String>,
    pub supporting_queries: Vec<String>,
}

/// 探索性子查询（maybe 分支）
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct ExploratoryQuery {
    query: String,
}

/// 洞察构造流程
pub struct InsightFlow {
    llm: Arc<dyn LlmClient>,
    db: Arc<dyn DatabaseBackend>,
    judge: Judge,
}

impl InsightFlow {
    pub fn new(llm: Arc<dyn LlmClient>, db: Arc<dyn DatabaseBackend>) -> Self {
        let judge = Judge::new(llm.clone());
        Self { llm, db, judge }
    }
}

#[async_trait]
impl ArtifactFlow for InsightFlow {
    type Artifact = InsightArtifact;

    async fn generate(
        &self,
        task: &str,
        _attempt: u32,
        prior: Option<(&InsightArtifact, &str)>,
    ) -> Result<InsightArtifact, String> {
        let schema_summary = self.db.schema_summary().await?;
        let retry_block = match prior {
            Some((artifact, feedback)) => format!(
                "A previous attempt was rejected.\nPrevious insights: {}\nFeedback: {}\n",
                artifact.insights.join("; "),
                feedback
            ),
            None => String::new(),
        };
        let prompt = GENERATE_PROMPT
            .replace("{schema}", &schema_summary)
            .replace("{task}", task)
            .replace("{retry_block}", &retry_block);

        let schema =
            serde_json::to_value(schema_for!(InsightArtifact)).map_err(|e| e.to_string())?;
        let value = self
            .llm
            .complete_structured(&[Turn::user(prompt)], &schema)
            .await?;
        serde_json::from_value(value).map_err(|e| format!("artifact parse: {e}"))
    }

    async fn evaluate(
        &self,
        task: &str,
        artifact: &InsightArtifact,
        context: &str,
    ) -> Result<Evaluation, String> {
        // 支撑查询全部跑一遍，任何一条失败即否决
        let mut samples = Vec::with_capacity(artifact.supporting_queries.len());
        for query in &artifact.supporting_queries {
            match self.db.run_query(query).await {
                Ok(rows) => samples.push(sample_text(&rows, SAMPLE_ROWS)),
                Err(e) => {
                    return Ok(Evaluation::incorrect(format!(
                        "supporting query failed ({query}): {e}"
                    )))
                }
            }
        }
        let described = artifact.insights.join("\n");
        self.judge
            .classify(task, &described, &samples.join("\n"), context)
            .await
    }

    /// maybe：向模型要一条探索性子查询，执行后把采样作为补充上下文返回
    async fn explore(&self, task: &str, artifact: &InsightArtifact) -> Result<String, String> {
        let prompt = EXPLORE_PROMPT
            .replace("{insights}", &artifact.insights.join("\n"))
            .replace("{task}", task);
        let schema =
            serde_json::to_value(schema_for!(ExploratoryQuery)).map_err(|e| e.to_string())?;
        let value = self
            .llm
            .complete_structured(&[Turn::user(prompt)], &schema)
            .await?;
        let exploratory: ExploratoryQuery =
            serde_json::from_value(value).map_err(|e| format!("exploratory parse: {e}"))?;
        let rows = self.db.run_query(&exploratory.query).await?;
        Ok(format!(
            "{} => {}",
            exploratory.query,
            sample_text(&rows, SAMPLE_ROWS)
        ))
    }

    fn render(&self, artifact: &InsightArtifact) -> String {
        let mut out = String::from("Insights:\n");
        for (idx, insight) in artifact.insights.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", idx + 1, insight));
        }
        out
    }
}

/// 构建可注册的洞察节点
pub fn insights_node(
    llm: Arc<dyn LlmClient>,
    db: Arc<dyn DatabaseBackend>,
) -> SubflowNode<InsightFlow> {
    SubflowNode::new("insights", SubflowEngine::new(InsightFlow::new(llm, db)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::subflow::SubflowStatus;
    use crate::llm::MockLlmClient;
    use crate::tools::SqliteDatabase;

    fn seeded_db() -> Arc<SqliteDatabase> {
        let db = SqliteDatabase::open_in_memory().unwrap();
        db.execute_batch(
            "CREATE TABLE orders (id INTEGER PRIMARY KEY, amount REAL, customer TEXT);
             INSERT INTO orders VALUES (1, 10.5, 'ada'), (2, 20.0, 'bob'), (3, 5.0, 'ada');",
        )
        .unwrap();
        Arc::new(db)
    }

    #[tokio::test]
    async fn test_maybe_gathers_context_then_accepts() {
        let llm = Arc::new(MockLlmClient::new().with_structured([
            // 生成
            serde_json::json!({
                "insights": ["ada places most orders"],
                "supporting_queries": ["SELECT customer, COUNT(*) AS n FROM orders GROUP BY customer"]
            }),
            // 第一次裁定：信息不足
            serde_json::json!({ "verdict": "maybe", "feedback": null }),
            // 探索性子查询
            serde_json::json!({ "query": "SELECT SUM(amount) AS total FROM orders" }),
            // 第二次裁定：接受
            serde_json::json!({ "verdict": "correct", "feedback": null }),
        ]));
        let engine = SubflowEngine::new(InsightFlow::new(llm, seeded_db()));
        let outcome = engine.run("what stands out in the orders table?").await;
        assert_eq!(outcome.status, SubflowStatus::Correct);
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.final_result.contains("ada places most orders"));
    }

    #[tokio::test]
    async fn test_failing_supporting_query_is_incorrect() {
        let llm = Arc::new(MockLlmClient::new().with_structured([
            serde_json::json!({
                "insights": ["bogus"],
                "supporting_queries": ["SELECT * FROM nowhere"]
            }),
            serde_json::json!({
                "insights": ["ada places most orders"],
                "supporting_queries": ["SELECT customer FROM orders"]
            }),
            serde_json::json!({ "verdict": "correct", "feedback": null }),
        ]));
        let engine = SubflowEngine::new(InsightFlow::new(llm, seeded_db()));
        let outcome = engine.run("insights").await;
        assert_eq!(outcome.status, SubflowStatus::Correct);
        assert_eq!(outcome.attempts, 2);
    }
}
