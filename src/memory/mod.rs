//! 记忆层：发给模型的消息序列、单次会话的动作记录

pub mod conversation;
pub mod transcript;

pub use conversation::{Message, Role};
pub use transcript::{Transcript, TranscriptEntry};
