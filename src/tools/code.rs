//! 代码执行工具：在受限沙箱中运行模型写出的脚本
//!
//! 脚本中可调用的工具绑定在构造时固定；观察为捕获的 print 输出（或固定提示），
//! 脚本调用过 final_answer 时携带终止信号，即使之后的语句出错。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::ToolError;
use crate::sandbox::Sandbox;
use crate::tools::{Tool, ToolId, ToolOutput};

pub struct CodeExecutorTool {
    sandbox: Sandbox,
    description: String,
}

impl CodeExecutorTool {
    pub fn new(bindings: HashMap<String, Arc<dyn Tool>>, max_output_chars: usize) -> Self {
        let sandbox = Sandbox::new(bindings, max_output_chars);
        let description = format!(
            "Executes a Python-style snippet in a sandbox and returns what it printed. \
             No imports or loops; available functions: {}.",
            sandbox.binding_names().join(", ")
        );
        Self {
            sandbox,
            description,
        }
    }
}

#[async_trait]
impl Tool for CodeExecutorTool {
    fn id(&self) -> ToolId {
        ToolId::CodeExecutor
    }

    fn name(&self) -> &str {
        "python"
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_spec(&self) -> &str {
        "the code to execute"
    }

    async fn run(&self, input: &str) -> Result<ToolOutput, ToolError> {
        if input.trim().is_empty() {
            return Err(ToolError::InvalidInput("no code to execute".to_string()));
        }
        let outcome = self.sandbox.run(input).await;
        if let Some(err) = &outcome.error {
            tracing::debug!(error = %err, "script error");
        }
        Ok(ToolOutput {
            text: outcome.render(),
            final_answer: outcome.final_answer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{CalculatorTool, FinalAnswerTool};

    fn tool() -> CodeExecutorTool {
        let mut bindings: HashMap<String, Arc<dyn Tool>> = HashMap::new();
        bindings.insert("calculate".into(), Arc::new(CalculatorTool::new()));
        bindings.insert("final_answer".into(), Arc::new(FinalAnswerTool));
        CodeExecutorTool::new(bindings, 4000)
    }

    #[tokio::test]
    async fn test_stdout_is_the_observation() {
        let out = tool()
            .run("r = calculate(\"8-2*(8+2) and 9-2*(9+2)\")\nprint(r)")
            .await
            .unwrap();
        assert_eq!(out.text, "-12 and -14");
        assert_eq!(out.final_answer, None);
    }

    #[tokio::test]
    async fn test_final_answer_call_terminates() {
        let out = tool().run("final_answer(\"42\")").await.unwrap();
        assert_eq!(out.final_answer.as_deref(), Some("42"));
        assert_eq!(out.text, "final answer: 42");
    }

    #[tokio::test]
    async fn test_script_error_is_observation_not_failure() {
        let out = tool().run("print(calculate('abc'))").await.unwrap();
        assert!(out.text.starts_with("Error: line 1: ToolError: calculate failed"));
    }

    #[test]
    fn test_description_lists_bindings() {
        assert!(tool().description().contains("calculate, final_answer"));
    }
}
