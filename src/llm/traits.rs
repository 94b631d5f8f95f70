//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock / 脚本化测试桩）实现 LlmClient：complete（非流式）。
//! 每次外部调用由调用方通过 complete_bounded 加超时，避免上游挂起阻塞整个重试循环。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::Message;

/// LLM 客户端 trait：非流式完成
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

/// 带超时的完成调用；超时视同该阶段的普通失败，由调用方决定回退或传播
pub async fn complete_bounded(
    llm: &Arc<dyn LlmClient>,
    messages: &[Message],
    timeout_secs: u64,
) -> Result<String, String> {
    match tokio::time::timeout(Duration::from_secs(timeout_secs), llm.complete(messages)).await {
        Ok(result) => result,
        Err(_) => Err(format!("LLM request timed out after {}s", timeout_secs)),
    }
}
