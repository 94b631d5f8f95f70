//! 检索计划生成与解析
//!
//! LLM 产出检索步骤列表；解析优先取 JSON 数组（{"step","question","agent"}），
//! 失败时回退到 [step N] 标记切分。计划不为每步分配身份，步骤仅属于所在迭代。

use std::sync::Arc;

use serde_json::Value;

use crate::core::AgentError;
use crate::llm::{complete_bounded, LlmClient, Message, TokenUsage};

const PLANNING_SYSTEM_PROMPT: &str = r#"<role>
  You plan data-retrieval work. Each step in the plan is handed to a sub-agent that can gather
  data from a vector index or web search, rerank and filter sources, and produce its own finding.
  After all steps complete, an answer generator consolidates the findings into a final answer.
</role>
<goal>Develop a high-level step-by-step plan from the query and the extracted facts.</goal>
<output_format>
  [
    {"step": "step1", "question": "...", "agent": "sub-agent"},
    {"step": "step2", "question": "...", "agent": "sub-agent"}
  ]
</output_format>
<warning>
  Rely only on the provided query and facts; assume nothing about missing data.
  Output the JSON array only, with no surrounding prose.
</warning>"#;

const PLANNING_USER_PROMPT: &str = r#"<query>
{query}
</query>

<fact>
{fact}
</fact>"#;

/// 将规划输出解析为步骤问题列表
pub fn parse_plan(output: &str) -> Vec<String> {
    let output = output.trim();

    // 首选 JSON 数组
    if let Some(start) = output.find('[') {
        if let Some(end) = output.rfind(']') {
            if start < end {
                if let Ok(Value::Array(items)) = serde_json::from_str(&output[start..=end]) {
                    let questions: Vec<String> = items
                        .iter()
                        .filter_map(|item| item.get("question"))
                        .filter_map(|q| q.as_str())
                        .map(|q| q.trim().to_string())
                        .filter(|q| !q.is_empty())
                        .collect();
                    if !questions.is_empty() {
                        return questions;
                    }
                }
            }
        }
    }

    // 回退：[step N] 标记切分
    let mut steps = Vec::new();
    for marker in output.split("[step").filter(|m| !m.trim().is_empty()) {
        if let Some((_, content)) = marker.split_once(']') {
            let content = content.trim();
            if !content.is_empty() {
                steps.push(content.to_string());
            }
        }
    }
    steps
}

pub struct Planner {
    llm: Arc<dyn LlmClient>,
    timeout_secs: u64,
    pub usage: TokenUsage,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>, timeout_secs: u64) -> Self {
        Self {
            llm,
            timeout_secs,
            usage: TokenUsage::new(),
        }
    }

    pub async fn plan(&self, query: &str, fact: &str) -> Result<Vec<String>, AgentError> {
        let messages = vec![
            Message::system(PLANNING_SYSTEM_PROMPT),
            Message::user(
                PLANNING_USER_PROMPT
                    .replace("{query}", query)
                    .replace("{fact}", fact),
            ),
        ];

        let (p0, c0, _) = self.llm.token_usage();
        let response = complete_bounded(&self.llm, &messages, self.timeout_secs)
            .await
            .map_err(AgentError::Llm)?;
        let (p1, c1, _) = self.llm.token_usage();
        self.usage
            .add(p1.saturating_sub(p0), c1.saturating_sub(c0));

        let steps = parse_plan(&response);
        if steps.is_empty() {
            // 计划不可解析时整个查询作为单步执行
            tracing::warn!(response = %response, "plan not parseable, using query as single step");
            return Ok(vec![query.to_string()]);
        }
        tracing::info!(steps = steps.len(), "retrieval plan generated");
        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_plan() {
        let output = r#"[
            {"step": "step1", "question": "Capital of France?", "agent": "sub-agent"},
            {"step": "step2", "question": "Population of Paris?", "agent": "sub-agent"}
        ]"#;
        let steps = parse_plan(output);
        assert_eq!(steps, vec!["Capital of France?", "Population of Paris?"]);
    }

    #[test]
    fn test_parse_step_markers() {
        let output = "[step 1] Find the capital of France\n[step 2] Find its population";
        let steps = parse_plan(output);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0], "Find the capital of France");
    }

    #[test]
    fn test_parse_garbage_returns_empty() {
        assert!(parse_plan("no plan here").is_empty());
    }
}
