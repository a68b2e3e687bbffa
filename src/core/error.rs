//! 错误类型
//!
//! 分层：LlmError（模型传输）、ToolError（工具能力）、ScriptError（沙箱脚本）由各自模块定义，
//! AgentError 只在从配置装配组件时出现；ReAct 循环本身从不向调用方抛错。

use thiserror::Error;

/// 装配 Agent 时可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Config error: {0}")]
    Config(String),
}

/// 工具能力内部的失败；在注册表边界被渲染为 `Error: ...` 观察文本
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("evaluating expression: {0}")]
    Evaluation(String),

    #[error("missing configuration: {0}")]
    MissingConfig(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("tool timed out after {0}s")]
    Timeout(u64),
}
