//! 检索子代理错误类型
//!
//! 按阶段分类：上游调用失败（LLM / 搜索 / 重排）、结构化输出解析失败、不支持的工具、超时。
//! 可恢复条件（验证结果解析失败、空缓存）在各阶段内部用显式回退吸收，不会走到这里；
//! 其余错误由 Orchestrator 在 process 外层边界捕获一次并转为带错误说明的 SubAgentResult。

use thiserror::Error;

/// 检索流水线各阶段可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Rerank error: {0}")]
    Rerank(String),

    #[error("JSON parse error: {0}")]
    JsonParse(String),

    /// 工具标签不在 {vector_search, web_search} 之内：契约违反，不重试
    #[error("Unsupported tool: {0}")]
    UnsupportedTool(String),

    #[error("Timeout in stage: {0}")]
    Timeout(String),

    #[error("Config error: {0}")]
    Config(String),
}
