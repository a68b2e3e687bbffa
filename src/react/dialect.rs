//! 两种推理风格（Dialect）：键值风格（ReAct）与代码风格（CodeAct）
//!
//! 风格决定：用哪个解析器、开场消息怎么拼、每次动作之后对话如何延续。
//! 两种风格共享同一个迭代控制器。

use serde::{Deserialize, Serialize};

use crate::memory::{Message, Transcript};
use crate::react::parser::{parse_code, parse_key_value, Step};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum Dialect {
    /// Thought / Action / Action Input
    #[default]
    #[serde(rename = "react", alias = "key_value", alias = "keyvalue")]
    #[value(name = "react", alias = "key-value")]
    KeyValue,
    /// Thought / Code / Observation / Final Answer
    #[serde(rename = "codeact", alias = "code")]
    #[value(name = "codeact", alias = "code")]
    Code,
}

impl Dialect {
    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::KeyValue => "react",
            Dialect::Code => "codeact",
        }
    }

    pub fn parse(self, raw: &str) -> Step {
        match self {
            Dialect::KeyValue => parse_key_value(raw),
            Dialect::Code => parse_code(raw),
        }
    }

    /// 第一轮发送给模型的消息
    pub fn opening_messages(self, system_prompt: &str, question: &str, context: &str) -> Vec<Message> {
        match self {
            Dialect::KeyValue => vec![
                Message::system(system_prompt),
                Message::system(format!("Context: {context}")),
                Message::user(format!(
                    "Answer the question using ReAct.\nQuestion: {question}\nBegin with a Thought:"
                )),
            ],
            Dialect::Code => vec![Message::user(format!(
                "{}Please start by thinking about this step by step.",
                code_preamble(system_prompt, question, context)
            ))],
        }
    }

    /// 一次动作执行后延续对话
    ///
    /// 键值风格追加 assistant 原文与 Observation；代码风格用编号步骤历史重建唯一的 user 消息。
    pub fn continue_dialogue(
        self,
        messages: &mut Vec<Message>,
        raw: &str,
        observation: &str,
        ctx: &PromptContext<'_>,
        transcript: &Transcript,
    ) {
        match self {
            Dialect::KeyValue => {
                messages.push(Message::assistant(raw));
                messages.push(Message::user(format!("Observation: {observation}\nThought:")));
            }
            Dialect::Code => {
                *messages = vec![Message::user(format!(
                    "{}{}\n\nWhat should I do next?",
                    code_preamble(ctx.system_prompt, ctx.question, ctx.context),
                    transcript.step_history()
                ))];
            }
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 重建提示词所需的不变部分
#[derive(Clone, Copy, Debug)]
pub struct PromptContext<'a> {
    pub system_prompt: &'a str,
    pub question: &'a str,
    pub context: &'a str,
}

/// 代码风格每轮 prompt 的公共开头：system prompt、可选 Context、Question
fn code_preamble(system_prompt: &str, question: &str, context: &str) -> String {
    let mut out = format!("{}\n\n", system_prompt.trim_end());
    if !context.trim().is_empty() {
        out.push_str(&format!("Context: {}\n\n", context.trim()));
    }
    out.push_str(&format!("Question: {question}\n\n"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Role, TranscriptEntry};

    #[test]
    fn test_key_value_opening() {
        let msgs = Dialect::KeyValue.opening_messages("SYS", "What is 2+2?", "math");
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0], Message::system("SYS"));
        assert_eq!(msgs[1].content, "Context: math");
        assert_eq!(
            msgs[2].content,
            "Answer the question using ReAct.\nQuestion: What is 2+2?\nBegin with a Thought:"
        );
    }

    #[test]
    fn test_code_opening_skips_empty_context() {
        let msgs = Dialect::Code.opening_messages("SYS", "Q?", "  ");
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].role, Role::User);
        assert_eq!(
            msgs[0].content,
            "SYS\n\nQuestion: Q?\n\nPlease start by thinking about this step by step."
        );
    }

    #[test]
    fn test_key_value_continuation_appends() {
        let mut msgs = Dialect::KeyValue.opening_messages("SYS", "Q", "");
        let ctx = PromptContext {
            system_prompt: "SYS",
            question: "Q",
            context: "",
        };
        Dialect::KeyValue.continue_dialogue(&mut msgs, "Thought: t\nAction: x", "obs", &ctx, &Transcript::new());
        assert_eq!(msgs.len(), 5);
        assert_eq!(msgs[3], Message::assistant("Thought: t\nAction: x"));
        assert_eq!(msgs[4], Message::user("Observation: obs\nThought:"));
    }

    #[test]
    fn test_code_continuation_rebuilds_single_message() {
        let mut msgs = Dialect::Code.opening_messages("SYS", "Q", "ctx");
        let mut transcript = Transcript::new();
        transcript.push(TranscriptEntry {
            reasoning: "t".into(),
            tool: "python".into(),
            input: "print(1)".into(),
            observation: "1".into(),
        });
        let ctx = PromptContext {
            system_prompt: "SYS",
            question: "Q",
            context: "ctx",
        };
        Dialect::Code.continue_dialogue(&mut msgs, "raw", "1", &ctx, &transcript);
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].content.starts_with("SYS\n\nContext: ctx\n\nQuestion: Q\n\nStep 1:\n"));
        assert!(msgs[0].content.ends_with("\n\nWhat should I do next?"));
    }

    #[test]
    fn test_deserialize_style_names() {
        let d: Dialect = serde_json::from_str("\"codeact\"").unwrap();
        assert_eq!(d, Dialect::Code);
        let d: Dialect = serde_json::from_str("\"react\"").unwrap();
        assert_eq!(d, Dialect::KeyValue);
    }
}
