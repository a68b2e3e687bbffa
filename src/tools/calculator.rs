//! Calculate 工具：算术表达式求值
//!
//! 去掉数字中的逗号；`|expr|` 片段先求值再取绝对值；含 ` and ` 时拆成多个子表达式分别求值并以 ` and ` 拼接。
//! 只接受 `0-9 . + - * / ( )` 与空格（`×` `÷` 会被替换），求值走沙箱的表达式解释器，不执行任意代码。

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use crate::core::ToolError;
use crate::sandbox::{eval_expression, Value};
use crate::tools::{Tool, ToolId, ToolOutput};

const ALLOWED_CHARS: &str = "0123456789.+-*/() ";

static ABS_RE: OnceLock<Regex> = OnceLock::new();

#[derive(Default)]
pub struct CalculatorTool;

impl CalculatorTool {
    pub fn new() -> Self {
        Self
    }

    /// 完整的计算流程，返回与 Python 相同的数字文本（整数保持整数，`/` 结果为浮点）
    pub async fn calculate(&self, expression: &str) -> Result<String, ToolError> {
        let mut expr = expression.trim().replace(',', "");
        if expr.is_empty() {
            return Err(ToolError::InvalidInput("expression is empty".to_string()));
        }

        let abs_re = ABS_RE.get_or_init(|| Regex::new(r"\|([^|]+)\|").unwrap());
        let segments: Vec<String> = abs_re
            .captures_iter(&expr)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect();
        for seg in segments {
            let value = match eval_safe(&seg).await? {
                Value::Int(n) => n.checked_abs().map(Value::Int).unwrap_or(Value::Float((n as f64).abs())),
                Value::Float(f) => Value::Float(f.abs()),
                other => other,
            };
            expr = expr.replace(&format!("|{seg}|"), &value.to_display());
        }

        if expr.contains(" and ") {
            let mut results = Vec::new();
            for part in expr.split(" and ") {
                results.push(eval_safe(part).await?.to_display());
            }
            return Ok(results.join(" and "));
        }
        Ok(eval_safe(&expr).await?.to_display())
    }
}

async fn eval_safe(expr: &str) -> Result<Value, ToolError> {
    let expr = expr.replace('×', "*").replace('÷', "/");
    if let Some(bad) = expr.chars().find(|c| !ALLOWED_CHARS.contains(*c)) {
        return Err(ToolError::Evaluation(format!(
            "expression contains invalid character '{bad}'"
        )));
    }
    match eval_expression(&expr).await {
        Ok(v @ (Value::Int(_) | Value::Float(_))) => Ok(v),
        Ok(other) => Err(ToolError::Evaluation(format!(
            "expected a number, got {}",
            other.type_name()
        ))),
        Err(e) => Err(ToolError::Evaluation(e.to_string())),
    }
}

#[async_trait]
impl Tool for CalculatorTool {
    fn id(&self) -> ToolId {
        ToolId::Calculate
    }

    fn name(&self) -> &str {
        "calculate"
    }

    fn description(&self) -> &str {
        "Performs mathematical calculations and evaluations of expressions. \
         Supports basic arithmetic operations, absolute values, commas in numbers, \
         and multiple sub-expressions separated by 'and'."
    }

    fn input_spec(&self) -> &str {
        "expression to calculate"
    }

    async fn run(&self, input: &str) -> Result<ToolOutput, ToolError> {
        self.calculate(input).await.map(ToolOutput::text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn calc(expr: &str) -> Result<String, ToolError> {
        CalculatorTool::new().calculate(expr).await
    }

    #[tokio::test]
    async fn test_sub_expressions_joined_with_and() {
        assert_eq!(calc("8-2*(8+2) and 9-2*(9+2)").await.unwrap(), "-12 and -14");
        assert_eq!(calc("828 - 381 and 900 - 500").await.unwrap(), "447 and 400");
    }

    #[tokio::test]
    async fn test_commas_and_integer_results() {
        assert_eq!(calc("1,127 - 283").await.unwrap(), "844");
        assert_eq!(calc("100000000 * 2").await.unwrap(), "200000000");
    }

    #[tokio::test]
    async fn test_division_yields_float() {
        assert_eq!(calc("10 / 4").await.unwrap(), "2.5");
        assert_eq!(calc("9 / 3").await.unwrap(), "3.0");
        assert_eq!(
            calc("125000000 / 378000").await.unwrap(),
            "330.6878306878307"
        );
    }

    #[tokio::test]
    async fn test_absolute_value_segments() {
        assert_eq!(calc("|3 - 10| + 1").await.unwrap(), "8");
        assert_eq!(calc("2 × |1.5 - 4| ÷ 5").await.unwrap(), "1.0");
    }

    #[tokio::test]
    async fn test_deeply_nested_input_is_an_error() {
        let expr = format!("{}1{}", "(".repeat(3000), ")".repeat(3000));
        match calc(&expr).await {
            Err(ToolError::Evaluation(msg)) => assert!(msg.contains("nested too deeply")),
            other => panic!("expected evaluation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rejects_non_arithmetic_input() {
        assert!(matches!(
            calc("__import__('os')").await,
            Err(ToolError::Evaluation(_))
        ));
        assert!(matches!(calc("2 ** 8").await, Ok(_)));
        assert!(matches!(calc("  ").await, Err(ToolError::InvalidInput(_))));
        assert!(matches!(calc("1 / 0").await, Err(ToolError::Evaluation(_))));
    }
}
