//! 自适应检索子代理：工具决策、工具操作、清洗、验证与主循环

pub mod cleaner;
pub mod orchestrator;
pub mod prompts;
pub mod tool_decision;
pub mod tool_ops;
pub mod types;
pub mod validator;

pub use cleaner::ContextCleaner;
pub use orchestrator::SubAgent;
pub use tool_decision::ToolDecision;
pub use tool_ops::ToolOperation;
pub use types::{render_contexts, ContextItem, SubAgentResult, ToolLabel, ValidationVerdict};
pub use validator::{parse_verdict, OutputValidator, VerdictParse};
