//! 核心编排层：错误、状态、路由、事件、主控循环

pub mod error;
pub mod events;
pub mod orchestrator;
pub mod router;
pub mod state;

pub use error::AgentError;
pub use events::OrchestratorEvent;
pub use orchestrator::{Orchestrator, TaskOutcome};
pub use router::{next_node, Route};
pub use state::{OrchestrationState, Step, StepId};
