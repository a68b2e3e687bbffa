//! 受限脚本沙箱：执行模型写出的 Python 风格代码片段
//!
//! 只支持无循环的子集（赋值、表达式、函数/方法调用、列表、f-string），不提供 import、文件、网络或进程访问；
//! 已注册工具以绑定名暴露给脚本（如 `calculate("2+2")`、`search_tool.run("...")`）。
//! 没有循环与自定义函数，脚本必然终止；执行层的超时由 ToolExecutor 统一施加。

pub mod eval;
pub mod lexer;
pub mod parser;

use std::collections::HashMap;
use std::sync::Arc;

use crate::tools::Tool;

pub use eval::Value;

/// 脚本错误；Display 采用 Python 的异常名前缀，便于模型理解
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScriptError {
    #[error("SyntaxError: {message} (line {line})")]
    Syntax { line: usize, message: String },

    #[error("NameError: name '{0}' is not defined")]
    Name(String),

    #[error("TypeError: {0}")]
    Type(String),

    #[error("ValueError: {0}")]
    Value(String),

    #[error("IndexError: {0}")]
    Index(String),

    #[error("ZeroDivisionError: division by zero")]
    ZeroDivision,

    #[error("PermissionError: {0}")]
    Forbidden(String),

    #[error("ToolError: {tool} failed: {message}")]
    Tool { tool: String, message: String },
}

impl ScriptError {
    /// 把嵌套解析（f-string 插值）产生的语法错误行号改为外层所在行
    pub fn at_line(self, line: usize) -> Self {
        match self {
            ScriptError::Syntax { message, .. } => ScriptError::Syntax { line, message },
            other => other,
        }
    }
}

/// 一次脚本执行的结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptOutcome {
    /// 捕获的 print 输出（已按上限截断）
    pub stdout: String,
    /// 脚本中第一次调用 final_answer 工具给出的答案
    pub final_answer: Option<String>,
    /// 失败时的错误描述（运行期错误带行号）
    pub error: Option<String>,
}

impl ScriptOutcome {
    /// 渲染为观察文本：失败时总以 `Error: ` 开头，其后附上出错前的输出；都为空时给出固定提示
    pub fn render(&self) -> String {
        let stdout = self.stdout.trim_end();
        match (&self.error, stdout.is_empty()) {
            (Some(err), true) => format!("Error: {err}"),
            (Some(err), false) => format!("Error: {err}\nOutput before the error:\n{stdout}"),
            (None, true) => "[Executed Successfully with No Output]".to_string(),
            (None, false) => stdout.to_string(),
        }
    }
}

/// 沙箱：持有可调用的工具绑定与输出上限，每次 run 使用全新的变量环境
pub struct Sandbox {
    bindings: HashMap<String, Arc<dyn Tool>>,
    max_output_chars: usize,
}

impl Sandbox {
    pub fn new(bindings: HashMap<String, Arc<dyn Tool>>, max_output_chars: usize) -> Self {
        Self {
            bindings,
            max_output_chars,
        }
    }

    pub fn binding_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bindings.keys().cloned().collect();
        names.sort();
        names
    }

    /// 执行一段脚本；语法错误时不执行任何语句
    pub async fn run(&self, code: &str) -> ScriptOutcome {
        let program = match parser::parse_program(code) {
            Ok(p) => p,
            Err(e) => {
                return ScriptOutcome {
                    error: Some(e.to_string()),
                    ..Default::default()
                }
            }
        };

        let mut interp = eval::Interpreter::new(&self.bindings, self.max_output_chars);
        let mut error = None;
        for stmt in &program {
            if let Err((line, e)) = interp.exec(stmt).await {
                tracing::debug!(line, error = %e, "script failed");
                error = Some(format!("line {line}: {e}"));
                break;
            }
        }
        let (stdout, final_answer) = interp.finish();
        ScriptOutcome {
            stdout,
            final_answer,
            error,
        }
    }
}

/// 在空环境中求值单个算术表达式（计算器使用）
pub async fn eval_expression(src: &str) -> Result<Value, ScriptError> {
    let expr = parser::parse_expression(src)?;
    let bindings = HashMap::new();
    let mut interp = eval::Interpreter::new(&bindings, 0);
    interp.eval(&expr).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ToolError;
    use crate::tools::{ToolId, ToolOutput};
    use async_trait::async_trait;

    struct Upper;

    #[async_trait]
    impl Tool for Upper {
        fn id(&self) -> ToolId {
            ToolId::WebSearch
        }
        fn name(&self) -> &str {
            "web_search"
        }
        fn description(&self) -> &str {
            "test"
        }
        fn input_spec(&self) -> &str {
            "text"
        }
        async fn run(&self, input: &str) -> Result<ToolOutput, ToolError> {
            if input.is_empty() {
                return Err(ToolError::InvalidInput("empty".into()));
            }
            Ok(ToolOutput::text(input.to_uppercase()))
        }
    }

    struct Finish;

    #[async_trait]
    impl Tool for Finish {
        fn id(&self) -> ToolId {
            ToolId::FinalAnswer
        }
        fn name(&self) -> &str {
            "final_answer"
        }
        fn description(&self) -> &str {
            "finish"
        }
        fn input_spec(&self) -> &str {
            "answer"
        }
        async fn run(&self, input: &str) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::final_answer(input))
        }
    }

    fn sandbox() -> Sandbox {
        let mut bindings: HashMap<String, Arc<dyn Tool>> = HashMap::new();
        let upper: Arc<dyn Tool> = Arc::new(Upper);
        bindings.insert("web_search".into(), upper.clone());
        bindings.insert("search_tool".into(), upper);
        bindings.insert("final_answer".into(), Arc::new(Finish));
        Sandbox::new(bindings, 200)
    }

    #[tokio::test]
    async fn test_print_and_arithmetic() {
        let out = sandbox()
            .run("x = 2 * 21\ny = x / 4\nprint(x, y)\nprint(f\"total: {x + 1}\")")
            .await;
        assert_eq!(out.error, None);
        assert_eq!(out.stdout, "42 10.5\ntotal: 43\n");
        assert_eq!(out.render(), "42 10.5\ntotal: 43");
    }

    #[tokio::test]
    async fn test_tool_binding_call_and_method_style() {
        let out = sandbox()
            .run("a = web_search(\"rust\")\nb = search_tool.run(query=\"lang\")\nprint(a + \" \" + b)")
            .await;
        assert_eq!(out.stdout, "RUST LANG\n");
    }

    #[tokio::test]
    async fn test_final_answer_recorded_first_wins() {
        let out = sandbox()
            .run("final_answer(\"42\")\nfinal_answer(\"43\")")
            .await;
        assert_eq!(out.final_answer.as_deref(), Some("42"));
        assert_eq!(out.error, None);
    }

    #[tokio::test]
    async fn test_error_after_final_answer_keeps_answer() {
        let out = sandbox().run("final_answer(7)\nprint(undefined)").await;
        assert_eq!(out.final_answer.as_deref(), Some("7"));
        assert!(out.error.unwrap().contains("NameError"));
    }

    #[tokio::test]
    async fn test_runtime_error_reports_line_and_partial_output() {
        let out = sandbox().run("print('before')\nx = 1 / 0\nprint('after')").await;
        assert_eq!(
            out.render(),
            "Error: line 2: ZeroDivisionError: division by zero\nOutput before the error:\nbefore"
        );
    }

    #[tokio::test]
    async fn test_oversized_repetition_is_a_script_error() {
        let out = sandbox()
            .run("x = 'ab' * 9223372036854775807\nprint('survived')")
            .await;
        assert_eq!(out.stdout, "");
        let err = out.error.unwrap();
        assert!(err.starts_with("line 1: ValueError: result too large"), "{err}");
    }

    #[tokio::test]
    async fn test_doubling_stops_at_the_size_limit() {
        let mut code = String::from("s = 'x' * 1000\na = [s]\n");
        for _ in 0..30 {
            code.push_str("s = s + s\n");
        }
        let out = sandbox().run(&code).await;
        assert!(out.error.unwrap().contains("ValueError: result too large"));

        let mut code = String::from("a = [1]\n");
        for _ in 0..40 {
            code.push_str("a.append(a)\n");
        }
        let out = sandbox().run(&code).await;
        assert!(out.render().starts_with("Error: line "));
    }

    #[tokio::test]
    async fn test_final_answer_text_is_printed() {
        let out = sandbox().run("print('working')\nfinal_answer('42')").await;
        assert_eq!(out.render(), "working\nfinal answer: 42");
    }

    #[tokio::test]
    async fn test_tool_failure_surfaces_as_script_error() {
        let out = sandbox().run("web_search('')").await;
        assert!(out.error.unwrap().contains("ToolError: web_search failed"));
    }

    #[tokio::test]
    async fn test_syntax_error_executes_nothing() {
        let out = sandbox().run("print('a')\nprint('b'").await;
        assert_eq!(out.stdout, "");
        assert!(out.error.unwrap().starts_with("SyntaxError"));
    }

    #[tokio::test]
    async fn test_import_is_refused() {
        let out = sandbox().run("import os\nos.system('ls')").await;
        assert!(out.render().starts_with("Error: PermissionError"));
    }

    #[tokio::test]
    async fn test_empty_output_placeholder() {
        let out = sandbox().run("x = 1").await;
        assert_eq!(out.render(), "[Executed Successfully with No Output]");
    }

    #[tokio::test]
    async fn test_output_is_capped() {
        let out = sandbox().run("print('x' * 1000)").await;
        assert!(out.stdout.chars().count() < 300);
        assert!(out.stdout.contains("[output truncated]"));
    }

    #[tokio::test]
    async fn test_eval_expression() {
        assert_eq!(eval_expression("8-2*(8+2)").await.unwrap(), Value::Int(-12));
        assert_eq!(eval_expression("7 / 2").await.unwrap(), Value::Float(3.5));
        assert!(matches!(
            eval_expression("calculate(1)").await,
            Err(ScriptError::Name(_))
        ));
    }
}
