//! 智能体层：节点注册表、执行节点、求解节点、子工作流引擎与三个工件智能体

pub mod insight;
pub mod judge;
pub mod query;
pub mod registry;
pub mod solver;
pub mod subflow;
pub mod view;
pub mod worker;

pub use insight::{insights_node, InsightFlow};
pub use judge::Judge;
pub use query::{recover_data_node, QueryFlow};
pub use registry::{AgentNode, NodeRegistry};
pub use solver::SolveNode;
pub use subflow::{
    ArtifactFlow, Evaluation, SubflowConfig, SubflowEngine, SubflowNode, SubflowOutcome,
    SubflowStatus, MAX_ATTEMPTS, MAX_INSUFFICIENT,
};
pub use view::{create_view_node, ViewFlow};
pub use worker::{ToolNode, WorkerNode};
