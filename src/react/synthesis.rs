//! 合成回退：预算耗尽或模型停滞、且已有动作记录时，用一次额外的模型调用把已收集的信息凝练为答案
//!
//! 只调用一次传输；失败时返回确定性的降级文本，从不报错。

use crate::llm::LlmClient;
use crate::memory::{Message, Transcript};
use crate::react::parser::final_answer_field;
use crate::react::Dialect;

const SYNTHESIS_SYSTEM: &str =
    "You are an expert at synthesizing information to answer questions accurately.";

/// 合成所需的输入
pub struct SynthesisInput<'a> {
    pub dialect: Dialect,
    pub system_prompt: &'a str,
    pub question: &'a str,
    pub transcript: &'a Transcript,
    pub last_reasoning: &'a str,
}

impl SynthesisInput<'_> {
    /// 已收集信息的摘要：键值风格为要点列表，代码风格为编号步骤历史
    fn summary(&self) -> String {
        match self.dialect {
            Dialect::KeyValue => self.transcript.action_summary(),
            Dialect::Code => self.transcript.step_history(),
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        match self.dialect {
            Dialect::KeyValue => vec![
                Message::system(SYNTHESIS_SYSTEM),
                Message::user(format!(
                    "Based on the original question and the information gathered from tools, \
                     synthesize a comprehensive answer.\n\
                     Original Question: {}\n\
                     Information Gathered:\n{}\n\n\
                     Last Thought: {}\n\n\
                     What is the answer to the original question based on this information?",
                    self.question,
                    self.summary(),
                    self.last_reasoning
                )),
            ],
            Dialect::Code => vec![Message::user(format!(
                "{}\n\n\
                 Original Question: {}\n\n\
                 Here's what I've tried so far:\n{}\n\n\
                 Last thought: {}\n\n\
                 Based on all the work above, please provide a final answer to the original question.\n\
                 If you couldn't fully solve it, explain what you discovered and what the limitations were.\n\n\
                 Final Answer: [Your answer here]",
                self.system_prompt.trim_end(),
                self.question,
                self.summary(),
                self.last_reasoning
            ))],
        }
    }
}

/// 执行合成；代码风格优先取回复中的 `Final Answer:` 字段
pub async fn synthesize(llm: &dyn LlmClient, input: &SynthesisInput<'_>) -> String {
    tracing::info!(entries = input.transcript.len(), "synthesizing answer from transcript");
    match llm.complete(&input.messages()).await {
        Ok(reply) => {
            let reply = reply.trim();
            match input.dialect {
                Dialect::KeyValue => reply.to_string(),
                Dialect::Code => final_answer_field(reply).unwrap_or_else(|| reply.to_string()),
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "synthesis failed");
            format!(
                "Could not synthesize final answer due to error: {e}. \
                 Based on the tools used, here's a summary of findings:\n{}",
                input.summary()
            )
        }
    }
}
