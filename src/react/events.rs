//! ReAct 过程事件：用于 --verbose 或上层界面实时展示迭代、思考、工具调用、观察与最终答案

use serde::Serialize;

use crate::react::Termination;

/// 单步过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReactEvent {
    /// 新一轮迭代开始（从 1 计）
    Iteration { iteration: usize, max_iterations: usize },
    /// 正在调用模型
    Thinking,
    /// 本轮解析出的推理片段
    Thought { text: String },
    /// 调用工具
    ToolCall { tool: String, input: String },
    /// 工具返回（预览，避免过长）
    Observation { tool: String, preview: String },
    /// 模型没有给出动作也没有结束
    Stalled { iteration: usize },
    /// 进入合成回退
    Synthesis { entries: usize },
    /// Token 使用统计（累计）
    TokenUsage {
        prompt_tokens: u64,
        completion_tokens: u64,
        total_tokens: u64,
    },
    /// 最终答案
    FinalAnswer { text: String, termination: Termination },
    /// 错误
    Error { text: String },
}
