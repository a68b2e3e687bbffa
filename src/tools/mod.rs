//! 工具层：Tool trait、注册表、执行器与内置工具（计算、搜索、代码执行、最终答案）

pub mod calculator;
pub mod code;
pub mod executor;
pub mod final_answer;
pub mod registry;
pub mod web_search;

pub use calculator::CalculatorTool;
pub use code::CodeExecutorTool;
pub use executor::{Observation, ToolExecutor};
pub use final_answer::FinalAnswerTool;
pub use registry::{Tool, ToolId, ToolOutput, ToolRegistry};
pub use web_search::WebSearchTool;
