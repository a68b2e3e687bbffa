//! LLM 客户端抽象
//!
//! 控制器只依赖 LlmClient::complete：给定有序消息序列，返回模型原始文本；
//! 传输层失败必须以 LlmError 返回，而不是静默返回畸形文本。

use async_trait::async_trait;
use thiserror::Error;

use crate::memory::Message;

/// 模型传输错误（网络、鉴权、配额、超时等）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Mock 客户端脚本已耗尽
    #[error("no scripted response left")]
    Exhausted,
}

/// LLM 客户端 trait：非流式完成
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成，返回模型输出的原始文本
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
