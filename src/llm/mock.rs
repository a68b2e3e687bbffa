//! Mock LLM 客户端（用于测试与离线运行，无需 API）
//!
//! 按顺序回放预先脚本化的回复，并记录每次收到的完整消息序列，便于断言 prompt 内容与调用次数。
//! 脚本耗尽后返回 LlmError::Exhausted；若设置了 fallback 则一直回放该文本。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError};
use crate::memory::Message;

/// Mock 客户端：脚本化回复 + 调用记录
#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    fallback: Option<String>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 依次返回给定文本
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = Self::default();
        for r in responses {
            client.push_response(r);
        }
        client
    }

    /// 脚本耗尽后始终返回该文本（离线演示用）
    pub fn with_fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(text.into());
        self
    }

    pub fn push_response(&self, text: impl Into<String>) {
        self.lock_script().push_back(Ok(text.into()));
    }

    /// 在脚本中插入一次传输失败
    pub fn push_error(&self, err: LlmError) {
        self.lock_script().push_back(Err(err));
    }

    /// 已收到的调用次数
    pub fn call_count(&self) -> usize {
        self.lock_calls().len()
    }

    /// 每次调用收到的消息序列（按调用顺序）
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.lock_calls().clone()
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String, LlmError>>> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<Vec<Message>>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.lock_calls().push(messages.to_vec());
        match self.lock_script().pop_front() {
            Some(next) => next,
            None => self.fallback.clone().ok_or(LlmError::Exhausted),
        }
    }
}
