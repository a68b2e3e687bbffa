//! 单次 run() 的可变状态：会话 id、迭代计数、动作记录、消息序列、最近的推理与原始输出

use uuid::Uuid;

use crate::memory::{Message, Transcript};

#[derive(Debug)]
pub struct AgentSession {
    /// 仅用于日志关联
    pub id: Uuid,
    pub iteration: usize,
    pub transcript: Transcript,
    pub messages: Vec<Message>,
    pub last_reasoning: String,
    pub last_raw: String,
}

impl AgentSession {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            id: Uuid::new_v4(),
            iteration: 0,
            transcript: Transcript::new(),
            messages,
            last_reasoning: String::new(),
            last_raw: String::new(),
        }
    }
}
