//! 认知层：输出解析、推理风格、System prompt、ReAct 主循环与合成回退

pub mod dialect;
pub mod events;
pub mod loop_;
pub mod parser;
pub mod prompt;
pub mod session;
pub mod synthesis;

pub use dialect::Dialect;
pub use events::ReactEvent;
pub use loop_::{ReactAgent, RunReport, Termination, DEFAULT_MAX_ITERATIONS};
pub use parser::{parse_code, parse_key_value, Action, Step, StepKind};
pub use session::AgentSession;
