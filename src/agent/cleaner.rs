//! Context 清洗：让 LLM 只保留与当前步骤相关的内容
//!
//! 无状态的过滤 / 摘要函数；既用于新鲜检索结果，也用于「已有发现 + 新发现」的拼接。

use std::sync::Arc;

use crate::agent::prompts::{CLEAN_CONTEXT_SYSTEM_PROMPT, CLEAN_CONTEXT_USER_PROMPT};
use crate::core::AgentError;
use crate::llm::{complete_bounded, LlmClient, Message, TokenUsage};

pub struct ContextCleaner {
    llm: Arc<dyn LlmClient>,
    timeout_secs: u64,
    pub usage: TokenUsage,
}

impl ContextCleaner {
    pub fn new(llm: Arc<dyn LlmClient>, timeout_secs: u64) -> Self {
        Self {
            llm,
            timeout_secs,
            usage: TokenUsage::new(),
        }
    }

    pub async fn clean(&self, step: &str, context: &str) -> Result<String, AgentError> {
        let messages = vec![
            Message::system(CLEAN_CONTEXT_SYSTEM_PROMPT),
            Message::user(
                CLEAN_CONTEXT_USER_PROMPT
                    .replace("{query}", step)
                    .replace("{context}", context),
            ),
        ];

        let (p0, c0, _) = self.llm.token_usage();
        let cleaned = complete_bounded(&self.llm, &messages, self.timeout_secs)
            .await
            .map_err(AgentError::Llm)?;
        let (p1, c1, _) = self.llm.token_usage();
        self.usage
            .add(p1.saturating_sub(p0), c1.saturating_sub(c0));

        let cleaned = cleaned.trim().to_string();
        tracing::debug!(step = %step, chars = cleaned.len(), "context cleaned");
        Ok(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;

    #[tokio::test]
    async fn test_clean_trims_response() {
        let llm = Arc::new(ScriptedLlmClient::new(vec!["  Paris is the capital.  \n"]));
        let cleaner = ContextCleaner::new(llm, 5);
        let out = cleaner.clean("capital of France", "raw text").await.unwrap();
        assert_eq!(out, "Paris is the capital.");
    }
}
