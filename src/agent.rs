//! Agent 装配
//!
//! 从 AppConfig 构建 LLM 客户端、工具注册表与执行器、System prompt，组装为 ReactAgent。
//! API Key 与工具实例都在这里显式创建并注入，没有全局单例。

use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::AgentError;
use crate::llm::{create_llm_from_config, LlmClient};
use crate::react::{prompt, Dialect, ReactAgent};
use crate::tools::{
    CalculatorTool, CodeExecutorTool, FinalAnswerTool, ToolExecutor, ToolRegistry, WebSearchTool,
};

/// 按推理风格注册工具：键值风格提供 calculate / web_search；
/// 代码风格额外提供 final_answer，并以其余工具为脚本绑定注册代码执行器
pub fn build_registry(cfg: &AppConfig, dialect: Dialect) -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    tools.register(CalculatorTool::new());
    tools.register(WebSearchTool::new(&cfg.tools.search));

    if dialect == Dialect::Code {
        tools.register(FinalAnswerTool);
        let bindings = tools.script_bindings();
        tools.register(CodeExecutorTool::new(
            bindings,
            cfg.tools.code.max_output_chars,
        ));
    }
    tools
}

/// 使用给定 LLM 组装 Agent（测试与嵌入场景）
pub fn create_agent_with_llm(cfg: &AppConfig, llm: Arc<dyn LlmClient>) -> ReactAgent {
    let dialect = cfg.agent.style;
    let executor = ToolExecutor::new(build_registry(cfg, dialect), cfg.tools.tool_timeout_secs);
    tracing::info!(
        dialect = %dialect,
        tools = ?executor.tool_names(),
        max_iterations = cfg.agent.max_iterations,
        "agent assembled"
    );

    let prompt_path = match dialect {
        Dialect::KeyValue => cfg.agent.react_prompt_path.as_deref(),
        Dialect::Code => cfg.agent.codeact_prompt_path.as_deref(),
    };
    let template = prompt::load_template(dialect, prompt_path);

    ReactAgent::new(llm, Arc::new(executor), dialect)
        .with_prompt_template(&template)
        .with_max_iterations(cfg.agent.max_iterations)
}

/// 从配置完整创建 Agent
pub fn create_agent(cfg: &AppConfig) -> Result<ReactAgent, AgentError> {
    let llm = create_llm_from_config(cfg)?;
    Ok(create_agent_with_llm(cfg, llm))
}
