//! 记忆层：线程级对话历史

pub mod history;

pub use history::{ConversationHistory, Role, Turn};
