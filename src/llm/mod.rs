//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock）

pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::AgentError;

pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::{LlmClient, LlmError};

/// 按配置创建 LLM 客户端：provider = "mock" 时走离线 Mock，openai / ollama 走 OpenAI 兼容端点
pub fn create_llm_from_config(cfg: &AppConfig) -> Result<Arc<dyn LlmClient>, AgentError> {
    let provider = cfg.llm.provider.trim().to_lowercase();
    match provider.as_str() {
        "mock" => {
            tracing::warn!("llm.provider = mock, using scripted Mock LLM");
            return Ok(Arc::new(MockLlmClient::new().with_fallback(
                "Thought: I cannot reach a real model in mock mode.",
            )));
        }
        "openai" | "ollama" => {}
        other => {
            return Err(AgentError::Config(format!(
                "unknown llm.provider '{other}' (expected openai, ollama or mock)"
            )))
        }
    }

    let api_key = cfg
        .llm
        .api_key
        .clone()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok());
    tracing::info!(
        provider = %provider,
        model = %cfg.llm.model,
        base_url = %cfg.llm.base_url,
        "Using OpenAI-compatible LLM"
    );
    Ok(Arc::new(
        OpenAiClient::new(Some(&cfg.llm.base_url), &cfg.llm.model, api_key.as_deref())
            .with_temperature(cfg.llm.temperature)
            .with_timeout(cfg.llm.timeouts.request),
    ))
}
