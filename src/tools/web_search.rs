//! Web 搜索工具：Serper（Google 搜索 API）
//!
//! POST `{q, num, gl}` 并带 `X-API-KEY` 请求头；num 限制在 1..=10；
//! 将 organic 结果格式化为编号的 `Information N:` 段落，超过 max_result_chars 时截断并追加 ...[truncated]。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::SearchSection;
use crate::core::ToolError;
use crate::tools::{Tool, ToolId, ToolOutput};

const NO_RESULTS: &str = "No information is retrieved";

#[derive(Debug, Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    num: usize,
    gl: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<OrganicResult>,
}

/// 一条自然搜索结果；缺失字段按空串处理
#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct OrganicResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
    pub date: String,
}

/// 将结果格式化为 `Information N:` 段落并按字符数截断
pub fn format_results(results: &[OrganicResult], max_chars: usize) -> String {
    if results.is_empty() {
        return NO_RESULTS.to_string();
    }
    let text = results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let mut section = format!("Information {}:\n", i + 1);
            if !r.title.is_empty() {
                section.push_str(r.title.trim());
                section.push('\n');
            }
            if !r.snippet.is_empty() {
                section.push_str(r.snippet.trim());
                section.push('\n');
            }
            if !r.link.is_empty() {
                section.push_str(&format!("Source: {}\n", r.link.trim()));
            }
            if !r.date.is_empty() {
                section.push_str(&format!("Date: {}\n", r.date.trim()));
            }
            section.trim_end().to_string()
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    truncate(text, max_chars)
}

fn truncate(text: String, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!(
            "{}...[truncated]",
            text.chars().take(max_chars).collect::<String>()
        )
    } else {
        text
    }
}

/// Serper 搜索工具；API Key 在构造时从配置（或 SERPER_API_KEY）解析
pub struct WebSearchTool {
    client: Client,
    api_url: String,
    api_key: Option<String>,
    num_results: usize,
    location: String,
    max_result_chars: usize,
}

impl WebSearchTool {
    pub fn new(cfg: &SearchSection) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to build search client, using defaults");
                Client::new()
            });
        Self {
            client,
            api_url: cfg.api_url.clone(),
            api_key: cfg.resolved_api_key(),
            num_results: cfg.num_results.clamp(1, 10),
            location: cfg.location.to_lowercase(),
            max_result_chars: cfg.max_result_chars,
        }
    }

    pub async fn search(&self, query: &str) -> Result<Vec<OrganicResult>, ToolError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidInput("query cannot be empty".to_string()));
        }
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ToolError::MissingConfig("SERPER_API_KEY is not set".to_string())
        })?;

        let payload = SerperRequest {
            q: query,
            num: self.num_results,
            gl: &self.location,
        };
        tracing::debug!(query, num = self.num_results, "serper search");
        let resp = self
            .client
            .post(&self.api_url)
            .header("X-API-KEY", api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ToolError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ToolError::Request(format!("HTTP {status}")));
        }
        let body: SerperResponse = resp
            .json()
            .await
            .map_err(|e| ToolError::Request(format!("invalid response: {e}")))?;
        Ok(body.organic)
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn id(&self) -> ToolId {
        ToolId::WebSearch
    }

    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Performs web search based on your query (think a Google search) then returns \
         the top search results, each with title, snippet, source link and date."
    }

    fn input_spec(&self) -> &str {
        "the search query to perform"
    }

    async fn run(&self, input: &str) -> Result<ToolOutput, ToolError> {
        let results = self.search(input).await?;
        Ok(ToolOutput::text(format_results(&results, self.max_result_chars)))
    }
}
