//! System prompt：内置默认模板，可由配置路径或 config/prompts/ 下的文件覆盖
//!
//! 模板中的 `{tools}` 在会话开始时替换为注册表渲染的工具目录。

use std::path::Path;

use crate::react::Dialect;

const TOOLS_PLACEHOLDER: &str = "{tools}";

const REACT_TEMPLATE: &str = r#"You are an assistant that solves problems step by step using the ReAct (Reasoning + Acting) approach.
Rules for every response:
  1. After your reasoning, always give exactly one tool call.
  2. Use the exact tool names and literal argument values. Never pass variable names as arguments.
  3. Only call a tool when the current step needs it.
  4. When no more tools are needed, use the action "Finish" with the complete answer as its input.
  5. Use "Thought:", "Action:" and "Action Input:" exactly as shown. "Observation:" is provided to you; never write it yourself.
  6. Base every next step on the observations you have received.

You have access to the following tools:

{tools}
Format for each step:
Thought: <your reasoning about the current state of the problem>
Action: <the tool to use>
Action Input: <the input to the tool>
Observation: <the result of the action, provided to you>

When you know the final answer:
Thought: I now know the final answer
Action: Finish
Action Input: <your detailed, complete final answer>

Example:
Question: What is the current population of Vietnam, and how many cakes are needed if each person gets 2 cakes?

Thought: I need the current population of Vietnam first.
Action: web_search
Action Input: current population of Vietnam
Observation: The current population of Vietnam is approximately 100 million.

Thought: Now I multiply the population by 2.
Action: calculate
Action Input: 100000000 * 2
Observation: 200000000

Thought: I now know the final answer
Action: Finish
Action Input: With a population of about 100 million and 2 cakes per person, about 200 million cakes are needed.
"#;

const CODEACT_TEMPLATE: &str = r#"You are CodeAct, an expert assistant that solves problems by writing and running small Python snippets.

Structure every response like this:

Thought: <your analysis and plan>
Code:
```python
# your code here
```

The code runs in a restricted sandbox: no imports, no loops, no function definitions.
Use print(...) to see values; what you print comes back to you as the Observation.
When you have the answer, call final_answer("your answer") in your code, or reply with:
Final Answer: <your answer>

The following functions are available inside the code:

{tools}
Example:
Question: What is the current population of Vietnam, and how many cakes are needed if each person gets 2 cakes?

Thought: I need the current population of Vietnam, so I will search for it.
Code:
```python
result = search_tool.run("current population of Vietnam")
print(result)
```

Thought: The population is about 100 million, each person gets 2 cakes.
Code:
```python
total = 100000000 * 2
final_answer(f"About {total} cakes are needed.")
```
"#;

/// 内置默认模板
pub fn default_template(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::KeyValue => REACT_TEMPLATE,
        Dialect::Code => CODEACT_TEMPLATE,
    }
}

fn default_paths(dialect: Dialect) -> [&'static str; 2] {
    match dialect {
        Dialect::KeyValue => ["config/prompts/react.md", "../config/prompts/react.md"],
        Dialect::Code => ["config/prompts/codeact.md", "../config/prompts/codeact.md"],
    }
}

/// 加载模板：显式路径 > config/prompts/ > 内置默认；读取失败时回退而不报错
pub fn load_template(dialect: Dialect, explicit: Option<&Path>) -> String {
    if let Some(path) = explicit {
        match std::fs::read_to_string(path) {
            Ok(s) => return s,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "prompt file unreadable, using default")
            }
        }
    }
    default_paths(dialect)
        .into_iter()
        .find_map(|p| std::fs::read_to_string(p).ok())
        .unwrap_or_else(|| default_template(dialect).to_string())
}

/// 用工具目录填充模板；模板没有占位符时把目录追加到末尾
pub fn render_system_prompt(template: &str, catalogue: &str) -> String {
    if template.contains(TOOLS_PLACEHOLDER) {
        template.replace(TOOLS_PLACEHOLDER, catalogue)
    } else {
        format!("{}\n\n{}", template.trim_end(), catalogue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_render_fills_placeholder() {
        let p = render_system_prompt(default_template(Dialect::KeyValue), "TOOLS:\n1. calculate\n");
        assert!(p.contains("following tools:\n\nTOOLS:\n1. calculate\n"));
        assert!(!p.contains(TOOLS_PLACEHOLDER));
    }

    #[test]
    fn test_render_appends_without_placeholder() {
        assert_eq!(render_system_prompt("Be brief.\n", "TOOLS:"), "Be brief.\n\nTOOLS:");
    }

    #[test]
    fn test_explicit_file_overrides_default() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "custom {{tools}}").unwrap();
        let t = load_template(Dialect::Code, Some(f.path()));
        assert_eq!(t, "custom {tools}");
    }

    #[test]
    fn test_missing_file_falls_back() {
        let t = load_template(Dialect::KeyValue, Some(Path::new("/nonexistent/prompt.md")));
        assert!(t.contains("Action: Finish"));
    }
}
