//! final_answer 工具：给出终止信号
//!
//! 主要供代码风格在脚本中调用 `final_answer(...)`；键值风格下也可作为 Action 使用。

use async_trait::async_trait;

use crate::core::ToolError;
use crate::tools::{Tool, ToolId, ToolOutput};

#[derive(Default)]
pub struct FinalAnswerTool;

#[async_trait]
impl Tool for FinalAnswerTool {
    fn id(&self) -> ToolId {
        ToolId::FinalAnswer
    }

    fn name(&self) -> &str {
        "final_answer"
    }

    fn description(&self) -> &str {
        "Provides a final answer to the given problem."
    }

    fn input_spec(&self) -> &str {
        "the final answer to the problem"
    }

    async fn run(&self, input: &str) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput::final_answer(input.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_carries_termination_signal() {
        let out = FinalAnswerTool.run(" 42 ").await.unwrap();
        assert_eq!(out.final_answer.as_deref(), Some("42"));
        assert_eq!(out.text, "final answer: 42");
    }
}
