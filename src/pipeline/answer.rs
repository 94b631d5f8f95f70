//! 最终答案合成：基于各步骤的发现回答原始查询

use std::sync::Arc;

use crate::core::AgentError;
use crate::llm::{complete_bounded, LlmClient, Message, TokenUsage};

const ANSWER_SYSTEM_PROMPT: &str = r#"<role>You write the final answer to a user query from gathered findings.</role>
<goal>Answer the query completely and accurately using only the provided context.</goal>
<constraints>
- Base the answer solely on the provided findings; do not invent facts.
- If the findings are insufficient for part of the query, say so plainly.
- Be coherent and direct; no meta commentary about the retrieval process.
</constraints>"#;

const ANSWER_USER_PROMPT: &str = r#"<query>
{query}
</query>

<context>
{context}
</context>"#;

pub struct AnswerGenerator {
    llm: Arc<dyn LlmClient>,
    timeout_secs: u64,
    pub usage: TokenUsage,
}

impl AnswerGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, timeout_secs: u64) -> Self {
        Self {
            llm,
            timeout_secs,
            usage: TokenUsage::new(),
        }
    }

    pub async fn generate(&self, query: &str, context: &str) -> Result<String, AgentError> {
        let messages = vec![
            Message::system(ANSWER_SYSTEM_PROMPT),
            Message::user(
                ANSWER_USER_PROMPT
                    .replace("{query}", query)
                    .replace("{context}", context),
            ),
        ];

        let (p0, c0, _) = self.llm.token_usage();
        let answer = complete_bounded(&self.llm, &messages, self.timeout_secs)
            .await
            .map_err(AgentError::Llm)?;
        let (p1, c1, _) = self.llm.token_usage();
        self.usage
            .add(p1.saturating_sub(p0), c1.saturating_sub(c0));

        Ok(answer.trim().to_string())
    }
}
