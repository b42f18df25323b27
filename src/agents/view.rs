//! 视图创建智能体：带副作用与补偿撤销的子工作流
//!
//! 视图经外部副作用调用创建，没有事务语义：尝试耗尽后由引擎触发一次显式 drop
//! 作为手工回滚。评估前先清掉同名残留（上一轮尝试可能已建出同名视图）。

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

const GENERATE_PROMPT: &str = "Design a database view for the request below. Respond with \
the view name (a valid identifier), its defining SQL query, and a short explanation.\n\
Database schema:\n{schema}\n\
Request: {task}\n{retry_block}";

/// 视图工件
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct ViewArtifact {
    pub view_name: String,
    pub query: String,
    pub explanation: String,
}

/// 视图创建流程
pub struct ViewFlow {
    llm: Arc<dyn LlmClient>,
    db: Arc<dyn DatabaseBackend>,
    judge: Judge,
}

impl ViewFlow {
    pub fn new(llm: Arc<dyn LlmClient>, db: Arc<dyn DatabaseBackend>) -> Self {
        let judge = Judge::new(llm.clone());
        Self { llm, db, judge }
    }
}

#[async_trait]
impl ArtifactFlow for ViewFlow {
    type Artifact = ViewArtifact;

    async fn generate(
        &self,
        task: &str,
        _attempt: u32,
        prior: Option<(&ViewArtifact, &str)>,
    ) -> Result<ViewArtifact, String> {
        let schema_summary = self.db.schema_summary().await?;
        let retry_block = match prior {
            Some((artifact, feedback)) => format!(
                "A previous attempt was rejected.\nPrevious view {}: {}\nFeedback: {}\n",
                artifact.view_name, artifact.query, feedback
            ),
            None => String::new(),
        };
        let prompt = GENERATE_PROMPT
            .replace("{schema}", &schema_summary)
            .replace("{task}", task)
            .replace("{retry_block}", &retry_block);

        let schema = serde_json::to_value(schema_for!(ViewArtifact)).map_err(|e| e.to_string())?;
        let value = self
            .llm
            .complete_structured(&[Turn::user(prompt)], &schema)
            .await?;
        serde_json::from_value(value).map_err(|e| format!("artifact parse: {e}"))
    }

    async fn evaluate(
        &self,
        task: &str,
        artifact: &ViewArtifact,
        context: &str,
    ) -> Result<Evaluation, String> {
        // 同名残留来自上一轮被否决的尝试
        let _ = self.db.drop_view(&artifact.view_name).await;
        if let Err(e) = self.db.create_view(&artifact.view_name, &artifact.query).await {
            return Ok(Evaluation::incorrect(format!("view creation failed: {e}")));
        }
        let rows = match self
            .db
            .run_query(&format!("SELECT * FROM {}", artifact.view_name))
            .await
        {
            Ok(rows) => rows,
            Err(e) => return Ok(Evaluation::incorrect(format!("view query failed: {e}"))),
        };
        let sample = sample_text(&rows, SAMPLE_ROWS);
        let described = format!("view {} defined as: {}", artifact.view_name, artifact.query);
        self.judge.classify(task, &described, &sample, context).await
    }

    fn has_side_effects(&self) -> bool {
        true
    }

    async fn undo(&self, artifact: &ViewArtifact) -> Result<(), String> {
        self.db.drop_view(&artifact.view_name).await
    }

    fn render(&self, artifact: &ViewArtifact) -> String {
        format!(
            "Created view {}.\n{}\n\nDefinition:\n{}",
            artifact.view_name, artifact.explanation, artifact.query
        )
    }
}

/// 构建可注册的视图创建节点
pub fn create_view_node(
    llm: Arc<dyn LlmClient>,
    db: Arc<dyn DatabaseBackend>,
) -> SubflowNode<ViewFlow> {
    SubflowNode::new("create_view", SubflowEngine::new(ViewFlow::new(llm, db)))
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
    async fn test_accepted_view_stays() {
        let db = seeded_db();
        let llm = Arc::new(
            MockLlmClient::new().with_structured([
                serde_json::json!({
                    "view_name": "ada_orders",
                    "query": "SELECT * FROM orders WHERE customer = 'ada'",
                    "explanation": "Orders placed by ada."
                }),
                serde_json::json!({ "verdict": "correct", "feedback": null }),
            ]),
        );
        let engine = SubflowEngine::new(ViewFlow::new(llm, db.clone()));
        let outcome = engine.run("make a view of ada's orders").await;
        assert_eq!(outcome.status, SubflowStatus::Correct);
        assert!(outcome.final_result.contains("Created view ada_orders"));
        // 被接受的视图保留
        assert_eq!(db.run_query("SELECT * FROM ada_orders").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_exhaustion_drops_view() {
        let db = seeded_db();
        let artifact = serde_json::json!({
            "view_name": "bad_view",
            "query": "SELECT * FROM orders",
            "explanation": "try"
        });
        let verdict = serde_json::json!({ "verdict": "incorrect", "feedback": "wrong filter" });
        let llm = Arc::new(MockLlmClient::new().with_structured([
            artifact.clone(),
            verdict.clone(),
            artifact.clone(),
            verdict.clone(),
            artifact.clone(),
            verdict,
        ]));
        let engine = SubflowEngine::new(ViewFlow::new(llm, db.clone()));
        let outcome = engine.run("make a view").await;
        assert_eq!(outcome.status, SubflowStatus::Incorrect);
        assert!(outcome.undo_performed);
        // 撤销后视图不复存在
        assert!(db.run_query("SELECT * FROM bad_view").await.is_err());
    }
}
