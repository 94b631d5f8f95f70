//! 工具决策：用 LLM 将检索步骤分类为一个工具标签
//!
//! 原始响应做 trim + lowercase 归一化后映射到 ToolLabel；
//! 无法识别的标签向上抛 UnsupportedTool，由 Orchestrator 处理，不做静默兜底。

use std::sync::Arc;

use crate::agent::prompts::{DECIDE_TOOL_SYSTEM_PROMPT, DECIDE_TOOL_USER_PROMPT};
use crate::agent::ToolLabel;
use crate::core::AgentError;
use crate::llm::{complete_bounded, LlmClient, Message, TokenUsage};

pub struct ToolDecision {
    llm: Arc<dyn LlmClient>,
    timeout_secs: u64,
    /// 本组件累计的 token 消耗
    pub usage: TokenUsage,
}

impl ToolDecision {
    pub fn new(llm: Arc<dyn LlmClient>, timeout_secs: u64) -> Self {
        Self {
            llm,
            timeout_secs,
            usage: TokenUsage::new(),
        }
    }

    pub async fn decide(&self, step: &str) -> Result<ToolLabel, AgentError> {
        let messages = vec![
            Message::system(DECIDE_TOOL_SYSTEM_PROMPT),
            Message::user(DECIDE_TOOL_USER_PROMPT.replace("{query}", step)),
        ];

        let (p0, c0, _) = self.llm.token_usage();
        let response = complete_bounded(&self.llm, &messages, self.timeout_secs)
            .await
            .map_err(AgentError::Llm)?;
        let (p1, c1, _) = self.llm.token_usage();
        self.usage
            .add(p1.saturating_sub(p0), c1.saturating_sub(c0));

        // 模型偶尔会带引号返回
        let normalized = response.trim().trim_matches('"').to_lowercase();
        let tool: ToolLabel = normalized.parse()?;
        tracing::info!(tool = tool.as_str(), step = %step, "decided retrieval tool");
        Ok(tool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;

    #[tokio::test]
    async fn test_decide_normalizes_response() {
        let llm = Arc::new(ScriptedLlmClient::new(vec!["  \"Web_Search\"  "]));
        let decision = ToolDecision::new(llm, 5);
        let tool = decision.decide("capital of France").await.unwrap();
        assert_eq!(tool, ToolLabel::WebSearch);
    }

    #[tokio::test]
    async fn test_decide_rejects_unknown_label() {
        let llm = Arc::new(ScriptedLlmClient::new(vec!["knowledge_graph"]));
        let decision = ToolDecision::new(llm, 5);
        let err = decision.decide("anything").await.unwrap_err();
        assert!(matches!(err, AgentError::UnsupportedTool(_)));
    }

    #[tokio::test]
    async fn test_decide_accumulates_tokens() {
        let llm = Arc::new(ScriptedLlmClient::new(vec!["web_search"]));
        let decision = ToolDecision::new(llm, 5);
        decision.decide("q").await.unwrap();
        let (prompt, completion, total) = decision.usage.get();
        assert_eq!((prompt, completion, total), (10, 5, 15));
    }
}
