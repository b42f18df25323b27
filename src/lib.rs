//! Weaver - Rust 任务编排智能体
//!
//! 把自然语言任务分解为工具调用序列，按计划顺序执行并合成最终回答，
//! 经线程级检查点保留跨轮对话记忆。
//!
//! 模块划分：
//! - **agents**: 节点注册表、执行/求解节点、子工作流引擎与查询/视图/洞察智能体
//! - **checkpoint**: 线程级编排状态的版本化快照（内存 / SQLite）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误、状态、路由、事件、主控循环
//! - **gateway**: WebSocket 传输边界（query / toolResponse 入站，进度与结果出站）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **memory**: 线程级对话历史
//! - **planner**: 计划生成、Plan/#E 语法解析、证据替换
//! - **runtime**: 无头编排器装配（供 CLI / 网关调用）
//! - **tools**: 工具箱（calculate、echo、数据库后端）与执行器

pub mod agents;
pub mod checkpoint;
pub mod config;
pub mod core;
#[cfg(feature = "gateway")]
pub mod gateway;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod planner;
pub mod runtime;
pub mod tools;
