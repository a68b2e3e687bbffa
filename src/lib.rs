//! Scout - Rust 推理-行动智能体
//!
//! 模块划分：
//! - **agent**: 从配置装配 ReactAgent
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **memory**: 消息序列与单次会话的动作记录
//! - **react**: 输出解析、推理风格、ReAct 主循环与合成回退
//! - **sandbox**: 受限脚本解释器（代码风格的动作执行）
//! - **tools**: 工具注册表、执行器与内置工具

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod react;
pub mod sandbox;
pub mod tools;

pub use agent::{create_agent, create_agent_with_llm};
pub use react::{Dialect, ReactAgent, ReactEvent, RunReport, Termination};
