//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时，execute(action) 在超时内调用解析到的工具；
//! 未知工具、工具失败与超时都转为观察文本，从不向循环抛错；每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::core::ToolError;
use crate::react::Action;
use crate::tools::ToolRegistry;

/// 一次执行的结果：观察文本 + 可选终止信号
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Observation {
    pub text: String,
    pub final_answer: Option<String>,
}

impl Observation {
    fn text(text: String) -> Self {
        Self {
            text,
            final_answer: None,
        }
    }
}

/// 工具执行器：对每次调用施加超时，并将结果映射为观察
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
    catalogue: String,
    script_catalogue: String,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        let catalogue = registry.catalogue();
        let script_catalogue = registry.script_catalogue();
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs.max(1)),
            catalogue,
            script_catalogue,
        }
    }

    /// 执行一个动作；结果总是观察文本，失败以 `Error: ` 开头
    pub async fn execute(&self, action: &Action) -> Observation {
        let name = action.tool.trim();
        let Some(tool) = self.registry.resolve(name) else {
            tracing::warn!(tool = name, "unknown tool requested");
            return Observation::text(format!("Unknown tool: {name}"));
        };

        let start = Instant::now();
        let result = timeout(self.timeout, tool.run(&action.input)).await;

        let outcome = match &result {
            Ok(Ok(out)) if out.final_answer.is_some() => "final_answer",
            Ok(Ok(_)) => "ok",
            Ok(Err(_)) => "error",
            Err(_) => "timeout",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool.name(),
            "ok": matches!(outcome, "ok" | "final_answer"),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "input_preview": input_preview(&action.input),
        });
        tracing::info!(audit = %audit, "tool");

        match result {
            Ok(Ok(out)) => Observation {
                text: out.text,
                final_answer: out.final_answer,
            },
            Ok(Err(e)) => Observation::text(format!("Error: {e}")),
            Err(_) => Observation::text(format!(
                "Error: {}",
                ToolError::Timeout(self.timeout.as_secs())
            )),
        }
    }

    /// 创建执行器时渲染好的工具目录
    pub fn catalogue(&self) -> &str {
        &self.catalogue
    }

    /// 脚本绑定的目录（不含代码执行器本身）
    pub fn script_catalogue(&self) -> &str {
        &self.script_catalogue
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }
}

fn input_preview(input: &str) -> String {
    if input.chars().count() > 200 {
        format!("{}...", input.chars().take(200).collect::<String>())
    } else {
        input.to_string()
    }
}
