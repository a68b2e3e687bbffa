//! 工具注册表
//!
//! 所有工具实现 Tool trait（id / name / description / input_spec / run），由 ToolRegistry 按 ToolId 注册，
//! 按名称查找时先做大小写与别名归一化；ToolExecutor 在调用时加超时并把失败渲染为观察文本。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::ToolError;

/// 封闭的工具标识集合
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ToolId {
    Calculate,
    WebSearch,
    CodeExecutor,
    FinalAnswer,
}

impl ToolId {
    pub const ALL: [ToolId; 4] = [
        ToolId::Calculate,
        ToolId::WebSearch,
        ToolId::CodeExecutor,
        ToolId::FinalAnswer,
    ];

    /// 规范名（模型在 Action: 中应当使用的名字）
    pub fn name(self) -> &'static str {
        match self {
            ToolId::Calculate => "calculate",
            ToolId::WebSearch => "web_search",
            ToolId::CodeExecutor => "python",
            ToolId::FinalAnswer => "final_answer",
        }
    }

    /// 别名（不含规范名）
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            ToolId::Calculate => &["calculator"],
            ToolId::WebSearch => &["search_tool", "search"],
            ToolId::CodeExecutor => &["code", "code_executor"],
            ToolId::FinalAnswer => &[],
        }
    }

    /// 名称解析：去空白、转小写后匹配规范名或别名
    pub fn from_name(name: &str) -> Option<ToolId> {
        let key = name.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|id| id.name() == key || id.aliases().contains(&key.as_str()))
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 工具输出：观察文本 + 可选的终止信号（final_answer 工具给出）
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    pub final_answer: Option<String>,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            final_answer: None,
        }
    }

    pub fn final_answer(answer: impl Into<String>) -> Self {
        let answer = answer.into();
        Self {
            text: format!("final answer: {answer}"),
            final_answer: Some(answer),
        }
    }
}

/// 工具 trait：标识、名称、描述与输入说明（供 LLM 理解）、异步执行（输入为原始字符串）
#[async_trait]
pub trait Tool: Send + Sync {
    fn id(&self) -> ToolId;

    /// 工具名称（用于 Action: 字段与脚本绑定名）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 输入说明
    fn input_spec(&self) -> &str;

    fn output_type(&self) -> &str {
        "string"
    }

    /// 执行工具
    async fn run(&self, input: &str) -> Result<ToolOutput, ToolError>;
}

/// 工具注册表：按 ToolId 存储 Arc<dyn Tool>，支持 register / get / resolve / catalogue
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<ToolId, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.id(), tool);
    }

    pub fn get(&self, id: ToolId) -> Option<Arc<dyn Tool>> {
        self.tools.get(&id).cloned()
    }

    /// 按模型给出的名称查找；未知名称或未注册实现时返回 None
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Tool>> {
        ToolId::from_name(name).and_then(|id| self.get(id))
    }

    pub fn contains(&self, id: ToolId) -> bool {
        self.tools.contains_key(&id)
    }

    /// 已注册工具的 id，按固定顺序
    pub fn ids(&self) -> Vec<ToolId> {
        let mut ids: Vec<ToolId> = self.tools.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.ids().into_iter().map(|id| id.name().to_string()).collect()
    }

    /// 脚本沙箱可见的绑定：规范名与别名都指向同一实现（代码执行器自身除外）
    pub fn script_bindings(&self) -> HashMap<String, Arc<dyn Tool>> {
        let mut bindings = HashMap::new();
        for (id, tool) in &self.tools {
            if *id == ToolId::CodeExecutor {
                continue;
            }
            bindings.insert(id.name().to_string(), tool.clone());
            for alias in id.aliases() {
                bindings.insert(alias.to_string(), tool.clone());
            }
        }
        bindings
    }

    /// 渲染工具目录，嵌入系统提示词
    pub fn catalogue(&self) -> String {
        self.render_catalogue(self.ids())
    }

    /// 代码风格的目录：只列脚本里可调用的绑定
    pub fn script_catalogue(&self) -> String {
        self.render_catalogue(
            self.ids()
                .into_iter()
                .filter(|id| *id != ToolId::CodeExecutor)
                .collect(),
        )
    }

    fn render_catalogue(&self, ids: Vec<ToolId>) -> String {
        let mut out = String::from("TOOLS:\n");
        for (i, id) in ids.into_iter().enumerate() {
            let Some(tool) = self.tools.get(&id) else {
                continue;
            };
            let mut names = tool.name().to_string();
            if !id.aliases().is_empty() {
                names.push_str(&format!(" (also: {})", id.aliases().join(", ")));
            }
            out.push_str(&format!(
                "{}. {}\n   - Description: {}\n   - Input: {}\n   - Output: {}\n",
                i + 1,
                names,
                tool.description(),
                tool.input_spec(),
                tool.output_type()
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy(ToolId);

    #[async_trait]
    impl Tool for Dummy {
        fn id(&self) -> ToolId {
            self.0
        }
        fn name(&self) -> &str {
            self.0.name()
        }
        fn description(&self) -> &str {
            "dummy tool"
        }
        fn input_spec(&self) -> &str {
            "anything"
        }
        async fn run(&self, input: &str) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::text(input))
        }
    }

    #[test]
    fn test_name_resolution_normalizes_and_accepts_aliases() {
        assert_eq!(ToolId::from_name("  Calculate "), Some(ToolId::Calculate));
        assert_eq!(ToolId::from_name("calculator"), Some(ToolId::Calculate));
        assert_eq!(ToolId::from_name("SEARCH_TOOL"), Some(ToolId::WebSearch));
        assert_eq!(ToolId::from_name("code_executor"), Some(ToolId::CodeExecutor));
        assert_eq!(ToolId::from_name("final_answer"), Some(ToolId::FinalAnswer));
        assert_eq!(ToolId::from_name("wikipedia"), None);
    }

    #[test]
    fn test_resolve_requires_registration() {
        let mut reg = ToolRegistry::new();
        reg.register(Dummy(ToolId::Calculate));
        assert!(reg.resolve("calculator").is_some());
        assert!(reg.resolve("web_search").is_none());
    }

    #[test]
    fn test_catalogue_lists_tools_in_order() {
        let mut reg = ToolRegistry::new();
        reg.register(Dummy(ToolId::WebSearch));
        reg.register(Dummy(ToolId::Calculate));
        let cat = reg.catalogue();
        assert!(cat.starts_with("TOOLS:\n1. calculate (also: calculator)\n   - Description: dummy tool\n"));
        assert!(cat.contains("2. web_search (also: search_tool, search)\n"));
        assert!(cat.contains("   - Output: string\n"));
    }

    #[test]
    fn test_script_bindings_include_aliases_but_not_code_tool() {
        let mut reg = ToolRegistry::new();
        reg.register(Dummy(ToolId::WebSearch));
        reg.register(Dummy(ToolId::CodeExecutor));
        let bindings = reg.script_bindings();
        assert!(bindings.contains_key("web_search"));
        assert!(bindings.contains_key("search_tool"));
        assert!(bindings.contains_key("search"));
        assert!(!bindings.contains_key("python"));
        assert!(!reg.script_catalogue().contains("python"));
        assert!(reg.catalogue().contains("python"));
    }
}
