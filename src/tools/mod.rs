pub mod calculate;
pub mod database;
pub mod echo;
pub mod executor;
pub mod registry;

pub use calculate::CalculateTool;
pub use database::{DatabaseBackend, SqliteDatabase};
pub use echo::EchoTool;
pub use executor::ToolExecutor;
pub use registry::{Tool, ToolCallback, ToolRegistry};
