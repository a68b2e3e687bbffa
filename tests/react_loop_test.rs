//! ReAct / CodeAct 循环集成测试：脚本化 Mock LLM + 桩工具，不访问网络

use std::sync::Arc;

use async_trait::async_trait;
use scout::config::AppConfig;
use scout::core::ToolError;
use scout::llm::{LlmError, MockLlmClient};
use scout::memory::Role;
use scout::tools::{CalculatorTool, Tool, ToolExecutor, ToolId, ToolOutput, ToolRegistry};
use scout::{create_agent_with_llm, Dialect, ReactAgent, Termination};

/// 代替 web_search 的桩：原样回显查询
struct EchoSearch;

#[async_trait]
impl Tool for EchoSearch {
    fn id(&self) -> ToolId {
        ToolId::WebSearch
    }
    fn name(&self) -> &str {
        "web_search"
    }
    fn description(&self) -> &str {
        "echoes the query"
    }
    fn input_spec(&self) -> &str {
        "search query"
    }
    async fn run(&self, input: &str) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput::text(format!("result for {}", input.trim())))
    }
}

fn key_value_agent(llm: Arc<MockLlmClient>) -> ReactAgent {
    let mut reg = ToolRegistry::new();
    reg.register(CalculatorTool::new());
    reg.register(EchoSearch);
    ReactAgent::new(llm, Arc::new(ToolExecutor::new(reg, 5)), Dialect::KeyValue)
}

fn code_agent(llm: Arc<MockLlmClient>) -> ReactAgent {
    let mut cfg = AppConfig::default();
    cfg.agent.style = Dialect::Code;
    create_agent_with_llm(&cfg, llm)
}

fn search_step(query: &str) -> String {
    format!("Thought: look it up\nAction: web_search\nAction Input: {query}")
}

#[tokio::test]
async fn test_finish_returns_input_verbatim_without_more_calls() {
    let llm = Arc::new(MockLlmClient::with_responses([
        "Thought: I know this.\nAction: Finish\nAction Input: Paris, France",
        "never used",
    ]));
    let report = key_value_agent(llm.clone()).run_report("Capital?", "", 5).await;
    assert_eq!(report.answer, "Paris, France");
    assert_eq!(report.termination, Termination::Finished);
    assert_eq!(report.iterations, 1);
    assert!(report.transcript.is_empty());
    assert_eq!(llm.call_count(), 1);
}

#[tokio::test]
async fn test_calculation_scenario() {
    let llm = Arc::new(MockLlmClient::with_responses([
        "Thought: I need to compute both.\nAction: calculate\nAction Input: 8-2*(8+2) and 9-2*(9+2)",
        "Thought: I now know the final answer\nAction: Finish\nAction Input: -12 and -14",
    ]));
    let report = key_value_agent(llm.clone()).run_report("Compute", "", 5).await;
    assert_eq!(report.answer, "-12 and -14");
    assert_eq!(report.transcript.len(), 1);
    assert_eq!(report.transcript.entries()[0].observation, "-12 and -14");

    let second = &llm.calls()[1];
    let last = second.last().unwrap();
    assert_eq!(last.role, Role::User);
    assert_eq!(last.content, "Observation: -12 and -14\nThought:");
}

#[tokio::test]
async fn test_unknown_tool_becomes_observation() {
    let llm = Arc::new(MockLlmClient::with_responses([
        "Thought: try wiki\nAction: wikipedia\nAction Input: rust",
        "Thought: done\nAction: Finish\nAction Input: ok",
    ]));
    let report = key_value_agent(llm.clone()).run_report("q", "", 5).await;
    assert_eq!(report.answer, "ok");
    assert_eq!(report.transcript.entries()[0].tool, "wikipedia");
    assert_eq!(report.transcript.entries()[0].observation, "Unknown tool: wikipedia");
    assert!(llm.calls()[1]
        .iter()
        .any(|m| m.content == "Observation: Unknown tool: wikipedia\nThought:"));
}

#[tokio::test]
async fn test_observations_are_visible_in_order() {
    let llm = Arc::new(MockLlmClient::with_responses([
        search_step("alpha"),
        search_step("beta"),
        "Thought: done\nAction: Finish\nAction Input: both".to_string(),
    ]));
    let report = key_value_agent(llm.clone()).run_report("q", "", 5).await;
    assert_eq!(report.transcript.len(), 2);

    let third: String = llm.calls()[2]
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let a = third.find("Observation: result for alpha").unwrap();
    let b = third.find("Observation: result for beta").unwrap();
    assert!(a < b);
}

#[tokio::test]
async fn test_exhaustion_synthesizes_exactly_once() {
    let llm = Arc::new(MockLlmClient::with_responses([
        search_step("one"),
        search_step("two"),
        search_step("three"),
        "Synthesized: one, two, three".to_string(),
    ]));
    let report = key_value_agent(llm.clone()).run_report("q", "", 3).await;
    assert_eq!(report.termination, Termination::Exhausted);
    assert_eq!(report.iterations, 3);
    assert_eq!(report.answer, "Synthesized: one, two, three");
    assert_eq!(llm.call_count(), 4);

    let synthesis = &llm.calls()[3];
    assert_eq!(synthesis[0].role, Role::System);
    let prompt = &synthesis[1].content;
    assert!(prompt.contains("Original Question: q"));
    assert!(prompt.contains(
        "- Used web_search tool with input 'one' and got: result for one\n\
         - Used web_search tool with input 'two' and got: result for two"
    ));
}

#[tokio::test]
async fn test_synthesis_failure_degrades_to_summary() {
    let llm = Arc::new(MockLlmClient::with_responses([search_step("one")]));
    llm.push_error(LlmError::Request("connection reset".into()));
    let answer = key_value_agent(llm).run_with_limit("q", "", 1).await;
    assert!(answer.starts_with(
        "Could not synthesize final answer due to error: request failed: connection reset."
    ));
    assert!(answer.ends_with("- Used web_search tool with input 'one' and got: result for one"));
}

#[tokio::test]
async fn test_stall_without_history_returns_raw_text() {
    let llm = Arc::new(MockLlmClient::with_responses(["I am not sure how to proceed."]));
    let report = key_value_agent(llm.clone()).run_report("q", "", 5).await;
    assert_eq!(report.termination, Termination::Stalled);
    assert_eq!(report.answer, "I am not sure how to proceed.");
    assert_eq!(llm.call_count(), 1);
}

#[tokio::test]
async fn test_final_answer_phrase_in_thought_terminates() {
    let llm = Arc::new(MockLlmClient::with_responses([
        "Thought: The final answer is 4",
    ]));
    let report = key_value_agent(llm).run_report("2+2?", "", 5).await;
    assert_eq!(report.termination, Termination::Finished);
    assert_eq!(report.answer, "The final answer is 4");
}

#[tokio::test]
async fn test_transport_failure_is_reported_as_answer() {
    let llm = Arc::new(MockLlmClient::new());
    llm.push_error(LlmError::Request("HTTP 401".into()));
    let report = key_value_agent(llm.clone()).run_report("q", "", 5).await;
    assert_eq!(report.termination, Termination::TransportFailed);
    assert_eq!(
        report.answer,
        "Error occurred while processing your question: request failed: HTTP 401"
    );
    assert_eq!(llm.call_count(), 1);
}

#[tokio::test]
async fn test_code_final_answer_call_terminates() {
    let llm = Arc::new(MockLlmClient::with_responses([
        "Thought: multiply\nCode:\n```python\nx = 6 * 7\nfinal_answer(str(x))\n```",
        "never used",
    ]));
    let report = code_agent(llm.clone()).run_report("6*7?", "", 5).await;
    assert_eq!(report.answer, "42");
    assert_eq!(report.termination, Termination::ExecutedFinal);
    assert_eq!(report.transcript.entries()[0].tool, "python");
    assert_eq!(report.transcript.entries()[0].observation, "final answer: 42");
    assert_eq!(llm.call_count(), 1);
}

#[tokio::test]
async fn test_code_step_history_and_synthesis() {
    let llm = Arc::new(MockLlmClient::with_responses([
        "Thought: add\nCode:\n```python\nprint(calculate(\"2+3\"))\n```",
        "Thought: hmm",
        "Thought: summarizing\nFinal Answer: 5",
    ]));
    let report = code_agent(llm.clone()).run_report("2+3?", "", 5).await;
    assert_eq!(report.termination, Termination::Stalled);
    assert_eq!(report.answer, "5");
    assert_eq!(report.transcript.entries()[0].observation, "5");

    let calls = llm.calls();
    assert_eq!(calls[1].len(), 1);
    let rebuilt = &calls[1][0].content;
    assert!(rebuilt.contains("Step 1:\nThought: add\n"));
    assert!(rebuilt.contains("Observation: 5\n"));
    assert!(rebuilt.ends_with("What should I do next?"));
    assert!(calls[2][0].content.ends_with("Final Answer: [Your answer here]"));
}

#[tokio::test]
async fn test_code_partial_output_follows_error_marker() {
    let llm = Arc::new(MockLlmClient::with_responses([
        "Thought: try\nCode:\n```python\nprint(\"step one\")\nx = 'ab' * 9223372036854775807\n```",
        "Thought: ok\nFinal Answer: stopped",
    ]));
    let report = code_agent(llm).run_report("q", "", 5).await;
    assert_eq!(report.answer, "stopped");
    let observation = &report.transcript.entries()[0].observation;
    assert!(observation.starts_with("Error: line 2: ValueError: result too large"));
    assert!(observation.ends_with("Output before the error:\nstep one"));
}

#[tokio::test]
async fn test_deeply_nested_calculation_is_observed() {
    let expr = format!("{}1{}", "(".repeat(3000), ")".repeat(3000));
    let llm = Arc::new(MockLlmClient::with_responses([
        format!("Thought: compute\nAction: calculate\nAction Input: {expr}"),
        "Thought: done\nAction: Finish\nAction Input: failed".to_string(),
    ]));
    let report = key_value_agent(llm).run_report("q", "", 5).await;
    assert_eq!(report.answer, "failed");
    assert!(report.transcript.entries()[0]
        .observation
        .starts_with("Error: evaluating expression: SyntaxError: expression nested too deeply"));
}

#[tokio::test]
async fn test_code_runtime_error_is_observed() {
    let llm = Arc::new(MockLlmClient::with_responses([
        "Thought: oops\nCode:\n```python\nprint(undefined_name)\n```",
        "Thought: ok\nFinal Answer: gave up",
    ]));
    let report = code_agent(llm).run_report("q", "", 5).await;
    assert_eq!(report.answer, "gave up");
    assert_eq!(
        report.transcript.entries()[0].observation,
        "Error: line 1: NameError: name 'undefined_name' is not defined"
    );
}
