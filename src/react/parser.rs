//! 模型输出解析：把一次模型回复的原始文本切分为字段并得到结构化 Step
//!
//! 不使用正则：逐行扫描行首标记（允许前导空白，区分大小写），每个标记捕获到下一个标记或文本结尾，
//! 同一标记出现多次时以第一次为准；``` 代码围栏内部不识别标记。
//! 解析永不失败，缺失字段视为空串；解析过程不执行任何代码或表达式。

use serde::Serialize;

/// 键值风格（ReAct）识别的标记
const KEY_VALUE_MARKERS: &[&str] = &["Thought:", "Action Input:", "Action:", "Observation:"];
/// 代码风格（CodeAct）识别的标记
const CODE_MARKERS: &[&str] = &["Thought:", "Code:", "Observation:", "Final Answer:"];

/// 键值风格中表示结束的动作名
pub const FINISH_ACTION: &str = "Finish";
/// 代码风格中动作所指向的工具名（代码执行器）
pub const CODE_TOOL: &str = "python";

const FENCE: &str = "```";

/// 一次工具调用请求：工具名 + 原始输入
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Action {
    pub tool: String,
    pub input: String,
}

/// Step 的三种形态：无操作（停滞）、调用工具、给出最终答案
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepKind {
    NoOp,
    Action(Action),
    Terminal { answer: String },
}

/// 一次模型输出解析得到的步骤
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Step {
    pub reasoning: String,
    pub kind: StepKind,
}

impl Step {
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, StepKind::Terminal { .. })
    }

    pub fn action(&self) -> Option<&Action> {
        match &self.kind {
            StepKind::Action(a) => Some(a),
            _ => None,
        }
    }
}

/// 按标记切分后的字段，保留首次出现
#[derive(Debug, Default)]
struct Fields {
    found: Vec<(&'static str, String)>,
}

impl Fields {
    fn get(&self, marker: &str) -> Option<&str> {
        self.found
            .iter()
            .find(|(m, _)| *m == marker)
            .map(|(_, text)| text.as_str())
    }

    fn text(&self, marker: &str) -> String {
        self.get(marker).unwrap_or_default().to_string()
    }
}

fn marker_at_line_start(line: &str, markers: &[&'static str]) -> Option<(&'static str, usize)> {
    let trimmed = line.trim_start();
    let offset = line.len() - trimmed.len();
    markers
        .iter()
        .find(|m| trimmed.starts_with(**m))
        .map(|m| (*m, offset + m.len()))
}

fn flush<'a>(current: &mut Option<(&'static str, Vec<&'a str>)>, fields: &mut Fields) {
    if let Some((marker, lines)) = current.take() {
        if fields.get(marker).is_none() {
            fields.found.push((marker, lines.join("\n").trim().to_string()));
        }
    }
}

fn tokenize(raw: &str, markers: &[&'static str]) -> Fields {
    let mut fields = Fields::default();
    let mut current: Option<(&'static str, Vec<&str>)> = None;
    let mut in_fence = false;

    for line in raw.lines() {
        let hit = if in_fence {
            None
        } else {
            marker_at_line_start(line, markers)
        };
        match hit {
            Some((marker, end)) => {
                flush(&mut current, &mut fields);
                current = Some((marker, vec![&line[end..]]));
            }
            None => {
                if let Some((_, lines)) = current.as_mut() {
                    lines.push(line);
                }
            }
        }
        if line.matches(FENCE).count() % 2 == 1 {
            in_fence = !in_fence;
        }
    }
    flush(&mut current, &mut fields);
    fields
}

/// 从 `Code:` 字段中取出第一个围栏代码块的内容（可带语言标记；未闭合时取到结尾）
fn extract_fenced_code(field: &str) -> Option<String> {
    let start = field.find(FENCE)?;
    let rest = &field[start + FENCE.len()..];
    // 仅当围栏所在行只剩语言标记时才跳过该行
    let body = match rest.split_once('\n') {
        Some((info, after))
            if info
                .trim()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+')) =>
        {
            after
        }
        _ => rest,
    };
    let body = match body.find(FENCE) {
        Some(end) => &body[..end],
        None => body,
    };
    let body = body.trim();
    if body.is_empty() {
        None
    } else {
        Some(body.to_string())
    }
}

/// 解析键值风格（Thought / Action / Action Input）输出
///
/// - Action 为 `Finish`：终止，答案为 Action Input
/// - 其它非空 Action：调用该工具，输入为 Action Input（缺失时为空串）
/// - 无 Action 但 Thought 含 "final answer"（不区分大小写）：以 Thought 作为答案终止
/// - 否则为无操作
pub fn parse_key_value(raw: &str) -> Step {
    let fields = tokenize(raw, KEY_VALUE_MARKERS);
    let reasoning = fields.text("Thought:");
    let action = fields.get("Action:").filter(|a| !a.is_empty());
    let input = fields.text("Action Input:");

    let kind = match action {
        Some(FINISH_ACTION) => StepKind::Terminal { answer: input },
        Some(tool) => StepKind::Action(Action {
            tool: tool.to_string(),
            input,
        }),
        None if !reasoning.is_empty() && reasoning.to_lowercase().contains("final answer") => {
            tracing::debug!("no action, treating reasoning as final answer");
            StepKind::Terminal {
                answer: reasoning.clone(),
            }
        }
        None => StepKind::NoOp,
    };
    Step { reasoning, kind }
}

/// 解析代码风格（Thought / Code / Observation / Final Answer）输出
///
/// - 有非空 Final Answer：终止
/// - 有代码块：调用代码执行器；即使代码里调用了 final_answer，也在执行层而非解析层判定终止
/// - 否则为无操作
pub fn parse_code(raw: &str) -> Step {
    let fields = tokenize(raw, CODE_MARKERS);
    let reasoning = fields.text("Thought:");

    let kind = if let Some(answer) = fields.get("Final Answer:").filter(|a| !a.is_empty()) {
        StepKind::Terminal {
            answer: answer.to_string(),
        }
    } else if let Some(code) = fields.get("Code:").and_then(extract_fenced_code) {
        StepKind::Action(Action {
            tool: CODE_TOOL.to_string(),
            input: code,
        })
    } else {
        StepKind::NoOp
    };
    Step { reasoning, kind }
}

/// 代码风格中单独取 Final Answer 字段（合成回退解析回复时使用）
pub fn final_answer_field(raw: &str) -> Option<String> {
    tokenize(raw, CODE_MARKERS)
        .get("Final Answer:")
        .filter(|a| !a.is_empty())
        .map(String::from)
}
