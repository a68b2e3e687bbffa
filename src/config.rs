//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `SCOUT__*` 覆盖（双下划线表示嵌套，如 `SCOUT__LLM__MODEL=qwen2.5:7b`）。
//! API Key 不在模块加载时读取，而是随配置显式传入各组件。

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::react::Dialect;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSection,
    pub agent: AgentSection,
    pub tools: ToolsSection,
}

/// [llm] 段：OpenAI 兼容端点、模型、温度与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// openai（任意 OpenAI 兼容端点，含 Ollama）/ mock
    pub provider: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    /// 未设置时回退到环境变量 OPENAI_API_KEY
    pub api_key: Option<String>,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: "http://localhost:11434/v1".to_string(),
            model: "qwen2.5:14b-instruct-q8_0".to_string(),
            temperature: 0.3,
            api_key: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [agent] 段：推理风格、迭代预算、可选的 system prompt 覆盖文件
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub style: Dialect,
    pub max_iterations: usize,
    pub react_prompt_path: Option<PathBuf>,
    pub codeact_prompt_path: Option<PathBuf>,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            style: Dialect::KeyValue,
            max_iterations: 5,
            react_prompt_path: None,
            codeact_prompt_path: None,
        }
    }
}

/// [tools] 段：单次工具调用超时、搜索与代码沙箱参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    pub tool_timeout_secs: u64,
    pub search: SearchSection,
    pub code: CodeSection,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
            search: SearchSection::default(),
            code: CodeSection::default(),
        }
    }
}

/// [tools.search] 段：Serper 端点与结果限制
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub api_url: String,
    /// 未设置时回退到环境变量 SERPER_API_KEY
    pub api_key: Option<String>,
    pub num_results: usize,
    pub location: String,
    pub timeout_secs: u64,
    pub max_result_chars: usize,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            api_url: "https://google.serper.dev/search".to_string(),
            api_key: None,
            num_results: 5,
            location: "us".to_string(),
            timeout_secs: 10,
            max_result_chars: 8000,
        }
    }
}

impl SearchSection {
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("SERPER_API_KEY").ok())
    }
}

/// [tools.code] 段：沙箱输出上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CodeSection {
    pub max_output_chars: usize,
}

impl Default for CodeSection {
    fn default() -> Self {
        Self {
            max_output_chars: 4000,
        }
    }
}

/// 从 config 目录加载配置，环境变量 SCOUT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 SCOUT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<&Path>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.to_path_buf()).required(false));
        } else {
            tracing::warn!(path = %path.display(), "config file not found, ignoring");
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("SCOUT")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
