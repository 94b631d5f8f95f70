//! 输出验证：对「原始步骤 + 已合并信息」请求结构化充分性结论
//!
//! 解析策略：严格 JSON -> 从自由文本中提取第一个配平的对象片段 -> 类型化回退。
//! 回退结论为 is_sufficient = true、reformulated_query = step：上游响应畸形时
//! 选择继续推进而不是无限重试。验证阶段的 LLM 超时 / 调用失败同样按解析失败回退。

use std::sync::Arc;

use crate::agent::prompts::{VALIDATE_OUTPUT_SYSTEM_PROMPT, VALIDATE_OUTPUT_USER_PROMPT};
use crate::agent::ValidationVerdict;
use crate::core::AgentError;
use crate::llm::{complete_bounded, LlmClient, Message, TokenUsage};

/// 解析结果：拿到结论，或带原因的回退
#[derive(Debug)]
pub enum VerdictParse {
    Parsed(ValidationVerdict),
    Fallback(String),
}

/// 从自由文本中取第一个配平的 {...} 片段（跳过字符串字面量内的花括号）
fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// 严格解析，失败则在文本内抢救一个对象片段
pub fn parse_verdict(raw: &str) -> VerdictParse {
    let raw = raw.trim();
    match serde_json::from_str::<ValidationVerdict>(raw) {
        Ok(v) => VerdictParse::Parsed(v),
        Err(first_err) => {
            if let Some(fragment) = first_balanced_object(raw) {
                if let Ok(v) = serde_json::from_str::<ValidationVerdict>(fragment) {
                    return VerdictParse::Parsed(v);
                }
            }
            VerdictParse::Fallback(first_err.to_string())
        }
    }
}

pub struct OutputValidator {
    llm: Arc<dyn LlmClient>,
    timeout_secs: u64,
    pub usage: TokenUsage,
}

impl OutputValidator {
    pub fn new(llm: Arc<dyn LlmClient>, timeout_secs: u64) -> Self {
        Self {
            llm,
            timeout_secs,
            usage: TokenUsage::new(),
        }
    }

    fn fallback_verdict(step: &str, reason: &str) -> ValidationVerdict {
        ValidationVerdict {
            is_sufficient: true,
            reasoning: format!("Failed to parse validation result: {}", reason),
            missing_aspects: vec![],
            reformulated_query: step.to_string(),
        }
    }

    /// 验证始终针对原始步骤，而非可能已被改写的当前步骤
    pub async fn validate(&self, step: &str, info: &str) -> Result<ValidationVerdict, AgentError> {
        let messages = vec![
            Message::system(VALIDATE_OUTPUT_SYSTEM_PROMPT),
            Message::user(
                VALIDATE_OUTPUT_USER_PROMPT
                    .replace("{step}", step)
                    .replace("{info}", info),
            ),
        ];

        let (p0, c0, _) = self.llm.token_usage();
        let response = match complete_bounded(&self.llm, &messages, self.timeout_secs).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "validator call failed, assuming sufficient");
                return Ok(Self::fallback_verdict(step, &e));
            }
        };
        let (p1, c1, _) = self.llm.token_usage();
        self.usage
            .add(p1.saturating_sub(p0), c1.saturating_sub(c0));

        match parse_verdict(&response) {
            VerdictParse::Parsed(verdict) => {
                tracing::info!(
                    is_sufficient = verdict.is_sufficient,
                    missing = verdict.missing_aspects.len(),
                    "validation verdict"
                );
                Ok(verdict)
            }
            VerdictParse::Fallback(reason) => {
                tracing::warn!(reason = %reason, response = %response, "validator output not parseable");
                Ok(Self::fallback_verdict(step, &reason))
            }
        }
    }
}
