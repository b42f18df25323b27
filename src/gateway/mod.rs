//! 网关：WebSocket 传输边界（线路成帧归此处，编排语义归 core）

pub mod message;
pub mod pending;
pub mod server;

pub use message::{ClientMessage, ServerMessage, ToolResponsePayload};
pub use pending::PendingResponses;
pub use server::{router, GatewayState};
