//! 事实抽取：从用户查询中提取解题所需的关键事实
//!
//! 单次提示模板调用，无迭代无恢复逻辑。

use std::sync::Arc;

use crate::core::AgentError;
use crate::llm::{complete_bounded, LlmClient, Message, TokenUsage};

const GET_FACT_SYSTEM_PROMPT: &str = r#"<role>You analyze a task statement and survey the information needed to solve it.</role>
<goal>Read the query, identify the facts it already provides and the facts that must be looked up or inferred.</goal>
<output_format>
  ### 1. Facts given in the query
  ### 2. Facts to look up
  ### 3. Facts to derive
</output_format>
<warning>
  Make no assumptions beyond what the query states.
  If a section has no applicable content, skip it without speculation.
</warning>"#;

const GET_FACT_USER_PROMPT: &str = r#"<instruction>
Extract the key factual information from this query: {query}

Provide a concise summary of the essential facts that would be necessary to answer this query.
Focus only on factual information, relevant concepts, and potential approaches.
</instruction>"#;

pub struct GetFact {
    llm: Arc<dyn LlmClient>,
    timeout_secs: u64,
    pub usage: TokenUsage,
}

impl GetFact {
    pub fn new(llm: Arc<dyn LlmClient>, timeout_secs: u64) -> Self {
        Self {
            llm,
            timeout_secs,
            usage: TokenUsage::new(),
        }
    }

    pub async fn extract(&self, query: &str) -> Result<String, AgentError> {
        let messages = vec![
            Message::system(GET_FACT_SYSTEM_PROMPT),
            Message::user(GET_FACT_USER_PROMPT.replace("{query}", query)),
        ];

        let (p0, c0, _) = self.llm.token_usage();
        let fact = complete_bounded(&self.llm, &messages, self.timeout_secs)
            .await
            .map_err(AgentError::Llm)?;
        let (p1, c1, _) = self.llm.token_usage();
        self.usage
            .add(p1.saturating_sub(p0), c1.saturating_sub(c0));

        Ok(fact.trim().to_string())
    }
}
