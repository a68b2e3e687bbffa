//! ReAct 主循环（迭代控制器）
//!
//! Reason（调用模型）-> 解析 -> Act（执行工具）-> Observe（写入记录并延续对话）-> 下一轮；
//! 终止条件：模型给出最终答案、执行层给出终止信号、停滞（无动作）、预算耗尽、传输失败。
//! 停滞与耗尽在已有动作记录时走合成回退，否则直接返回最后一次模型原文。
//! 可选 event_tx：向 CLI 等前端推送 Iteration / Thought / ToolCall / Observation / FinalAnswer。

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::llm::LlmClient;
use crate::memory::{Transcript, TranscriptEntry};
use crate::react::dialect::PromptContext;
use crate::react::parser::StepKind;
use crate::react::prompt::{default_template, render_system_prompt};
use crate::react::synthesis::{synthesize, SynthesisInput};
use crate::react::{AgentSession, Dialect, ReactEvent};
use crate::tools::ToolExecutor;

/// 默认迭代预算
pub const DEFAULT_MAX_ITERATIONS: usize = 5;
/// Observation 预览最大字符数
const OBSERVATION_PREVIEW_CHARS: usize = 200;

/// 循环结束的原因
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// 模型给出了最终答案（Finish / Final Answer）
    Finished,
    /// 工具执行给出了终止信号（脚本中调用 final_answer）
    ExecutedFinal,
    /// 模型既没有动作也没有结束
    Stalled,
    /// 迭代预算耗尽
    Exhausted,
    /// 模型传输失败
    TransportFailed,
}

/// 一次 run 的完整结果
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub session_id: String,
    pub answer: String,
    pub termination: Termination,
    pub iterations: usize,
    pub transcript: Transcript,
}

/// 迭代控制器：只持有配置，每次 run 创建新的 AgentSession
pub struct ReactAgent {
    llm: Arc<dyn LlmClient>,
    executor: Arc<ToolExecutor>,
    dialect: Dialect,
    max_iterations: usize,
    system_prompt: String,
    event_tx: Option<UnboundedSender<ReactEvent>>,
}

impl ReactAgent {
    /// 使用内置模板与执行器的工具目录构建
    pub fn new(llm: Arc<dyn LlmClient>, executor: Arc<ToolExecutor>, dialect: Dialect) -> Self {
        let mut agent = Self {
            llm,
            executor,
            dialect,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            system_prompt: String::new(),
            event_tx: None,
        };
        agent.system_prompt = agent.render(default_template(dialect));
        agent
    }

    /// 替换 system prompt 模板（`{tools}` 占位符会被替换为工具目录）
    pub fn with_prompt_template(mut self, template: &str) -> Self {
        self.system_prompt = self.render(template);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_event_tx(mut self, tx: UnboundedSender<ReactEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn render(&self, template: &str) -> String {
        let catalogue = match self.dialect {
            Dialect::KeyValue => self.executor.catalogue(),
            Dialect::Code => self.executor.script_catalogue(),
        };
        render_system_prompt(template, catalogue)
    }

    fn send_event(&self, ev: ReactEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(ev);
        }
    }

    /// 以配置的预算回答问题；总是返回字符串
    pub async fn run(&self, question: &str, context: &str) -> String {
        self.run_with_limit(question, context, self.max_iterations).await
    }

    pub async fn run_with_limit(&self, question: &str, context: &str, max_iterations: usize) -> String {
        self.run_report(question, context, max_iterations).await.answer
    }

    /// 执行完整循环并返回答案、动作记录、迭代次数与终止原因；预算 0 视为 1
    pub async fn run_report(&self, question: &str, context: &str, max_iterations: usize) -> RunReport {
        let budget = max_iterations.max(1);
        let prompt_ctx = PromptContext {
            system_prompt: &self.system_prompt,
            question,
            context,
        };
        let mut session = AgentSession::new(self.dialect.opening_messages(
            &self.system_prompt,
            question,
            context,
        ));
        tracing::info!(
            session = %session.id,
            dialect = %self.dialect,
            budget,
            "react run started"
        );

        let mut termination = Termination::Exhausted;
        while session.iteration < budget {
            session.iteration += 1;
            self.send_event(ReactEvent::Iteration {
                iteration: session.iteration,
                max_iterations: budget,
            });
            self.send_event(ReactEvent::Thinking);

            let raw = match self.llm.complete(&session.messages).await {
                Ok(text) => text.trim().to_string(),
                Err(e) => {
                    tracing::error!(session = %session.id, error = %e, "model call failed");
                    self.send_event(ReactEvent::Error {
                        text: e.to_string(),
                    });
                    let answer = format!("Error occurred while processing your question: {e}");
                    return self.finish(session, answer, Termination::TransportFailed);
                }
            };

            let step = self.dialect.parse(&raw);
            session.last_raw = raw.clone();
            session.last_reasoning = step.reasoning.clone();
            tracing::debug!(
                session = %session.id,
                iteration = session.iteration,
                thought = %step.reasoning,
                "parsed step"
            );
            if !step.reasoning.is_empty() {
                self.send_event(ReactEvent::Thought {
                    text: step.reasoning.clone(),
                });
            }

            let action = match step.kind {
                StepKind::Terminal { answer } => {
                    return self.finish(session, answer, Termination::Finished);
                }
                StepKind::NoOp => {
                    tracing::warn!(
                        session = %session.id,
                        iteration = session.iteration,
                        "no action parsed, stopping"
                    );
                    self.send_event(ReactEvent::Stalled {
                        iteration: session.iteration,
                    });
                    termination = Termination::Stalled;
                    break;
                }
                StepKind::Action(action) => action,
            };

            self.send_event(ReactEvent::ToolCall {
                tool: action.tool.clone(),
                input: action.input.clone(),
            });
            let observation = self.executor.execute(&action).await;
            self.send_event(ReactEvent::Observation {
                tool: action.tool.clone(),
                preview: preview(&observation.text),
            });

            session.transcript.push(TranscriptEntry {
                reasoning: step.reasoning,
                tool: action.tool.trim().to_string(),
                input: action.input,
                observation: observation.text.clone(),
            });

            if let Some(answer) = observation.final_answer {
                return self.finish(session, answer, Termination::ExecutedFinal);
            }

            self.dialect.continue_dialogue(
                &mut session.messages,
                &raw,
                &observation.text,
                &prompt_ctx,
                &session.transcript,
            );
        }

        if termination == Termination::Exhausted {
            tracing::info!(session = %session.id, budget, "iteration budget exhausted");
        }

        let answer = if session.transcript.is_empty() {
            session.last_raw.clone()
        } else {
            self.send_event(ReactEvent::Synthesis {
                entries: session.transcript.len(),
            });
            let input = SynthesisInput {
                dialect: self.dialect,
                system_prompt: &self.system_prompt,
                question,
                transcript: &session.transcript,
                last_reasoning: &session.last_reasoning,
            };
            synthesize(self.llm.as_ref(), &input).await
        };
        self.finish(session, answer, termination)
    }

    fn finish(&self, session: AgentSession, answer: String, termination: Termination) -> RunReport {
        tracing::info!(
            session = %session.id,
            iterations = session.iteration,
            actions = session.transcript.len(),
            termination = ?termination,
            "react run finished"
        );
        let (prompt_tokens, completion_tokens, total_tokens) = self.llm.token_usage();
        self.send_event(ReactEvent::TokenUsage {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        });
        self.send_event(ReactEvent::FinalAnswer {
            text: answer.clone(),
            termination,
        });
        RunReport {
            session_id: session.id.to_string(),
            answer,
            termination,
            iterations: session.iteration,
            transcript: session.transcript,
        }
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() > OBSERVATION_PREVIEW_CHARS {
        format!(
            "{}...",
            text.chars().take(OBSERVATION_PREVIEW_CHARS).collect::<String>()
        )
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::memory::Role;
    use crate::tools::{CalculatorTool, ToolRegistry};

    fn agent(llm: Arc<MockLlmClient>, dialect: Dialect) -> ReactAgent {
        let mut reg = ToolRegistry::new();
        reg.register(CalculatorTool::new());
        ReactAgent::new(llm, Arc::new(ToolExecutor::new(reg, 5)), dialect)
    }

    #[test]
    fn test_system_prompt_contains_catalogue() {
        let a = agent(Arc::new(MockLlmClient::new()), Dialect::KeyValue);
        assert!(a.system_prompt().contains("1. calculate (also: calculator)"));
        assert_eq!(a.max_iterations(), DEFAULT_MAX_ITERATIONS);
    }

    #[tokio::test]
    async fn test_zero_budget_is_one_iteration() {
        let llm = Arc::new(MockLlmClient::with_responses([
            "Thought: t\nAction: calculate\nAction Input: 1+1",
            "synthesized",
        ]));
        let report = agent(llm.clone(), Dialect::KeyValue).run_report("q", "", 0).await;
        assert_eq!(report.iterations, 1);
        assert_eq!(report.termination, Termination::Exhausted);
        assert_eq!(report.answer, "synthesized");
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_events_are_emitted_in_order() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let llm = Arc::new(MockLlmClient::with_responses([
            "Thought: add\nAction: calculate\nAction Input: 2+3",
            "Thought: done\nAction: Finish\nAction Input: 5",
        ]));
        let answer = agent(llm.clone(), Dialect::KeyValue)
            .with_event_tx(tx)
            .run("2+3?", "")
            .await;
        assert_eq!(answer, "5");

        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(serde_json::to_value(&ev).unwrap()["type"].as_str().unwrap().to_string());
        }
        assert_eq!(
            kinds,
            [
                "iteration", "thinking", "thought", "tool_call", "observation", "iteration",
                "thinking", "thought", "token_usage", "final_answer"
            ]
        );
        let second = &llm.calls()[1];
        assert_eq!(second.last().unwrap().role, Role::User);
        assert_eq!(second.last().unwrap().content, "Observation: 5\nThought:");
    }
}
