//! 会话记录（Transcript）：一次 run() 内已执行的动作与观察，按迭代顺序只追加
//!
//! 两种渲染：ReAct 风格的要点摘要（合成回退用），以及 CodeAct 风格的编号步骤历史（每轮重建 prompt 用）。

use serde::Serialize;

/// 一条已完成的动作：推理片段 + 工具 + 原始输入 + 观察
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TranscriptEntry {
    pub reasoning: String,
    pub tool: String,
    pub input: String,
    pub observation: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 每条动作一行：`- Used <tool> tool with input '<input>' and got: <observation>`
    pub fn action_summary(&self) -> String {
        self.entries
            .iter()
            .map(|e| {
                format!(
                    "- Used {} tool with input '{}' and got: {}",
                    e.tool, e.input, e.observation
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// 编号步骤历史：Step i / Thought / Code / Observation
    pub fn step_history(&self) -> String {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| {
                let mut step = format!("Step {}:\n", i + 1);
                if !e.reasoning.is_empty() {
                    step.push_str(&format!("Thought: {}\n", e.reasoning));
                }
                if !e.input.is_empty() {
                    step.push_str(&format!("Code:\n```python\n{}\n```\n", e.input));
                }
                if !e.observation.is_empty() {
                    step.push_str(&format!("Observation: {}\n", e.observation));
                }
                step
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
