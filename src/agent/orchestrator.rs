//! 子代理主循环
//!
//! SELECT_TOOL -> (CACHE_HIT | RETRIEVE) -> [失败时同步重试] -> RERANK -> CLEAN -> MERGE
//! -> (VALIDATE | 最后一次尝试跳过验证) -> (DONE | REFORMULATE -> SELECT_TOOL)。
//!
//! 两条独立的重试通道：检索失败时立即换扰动查询重试（不消耗验证周期）；
//! 验证不充分时按改写后的查询重试。retry_count 在一次 process 内单调不减，
//! 上界为配置的 max_retries，循环因此必然在 max_retries + 1 轮内终止。
//!
//! 错误在 process 外层边界捕获一次：调用方总能拿到 SubAgentResult，
//! 失败时 info 携带可读错误说明，元数据保留已累计的 token 计数。

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use crate::agent::cleaner::ContextCleaner;
use crate::agent::tool_decision::ToolDecision;
use crate::agent::tool_ops::ToolOperation;
use crate::agent::types::{render_contexts, SubAgentResult};
use crate::agent::validator::OutputValidator;
use crate::core::AgentError;
use crate::memory::MemoryManager;

pub struct SubAgent {
    tool_decision: ToolDecision,
    tool_ops: ToolOperation,
    cleaner: ContextCleaner,
    validator: OutputValidator,
    memory: Arc<MemoryManager>,
    max_retries: usize,
}

/// 验证器没有给出可用改写时，从已记录的缺失方面合成下一步查询
fn synthesize_step(original_step: &str, missing: &[String]) -> String {
    if missing.is_empty() {
        format!("{} (need more comprehensive information)", original_step)
    } else {
        format!("{} (focus on: {})", original_step, missing.join("; "))
    }
}

impl SubAgent {
    pub fn new(
        tool_decision: ToolDecision,
        tool_ops: ToolOperation,
        cleaner: ContextCleaner,
        validator: OutputValidator,
        memory: Arc<MemoryManager>,
        max_retries: usize,
    ) -> Self {
        Self {
            tool_decision,
            tool_ops,
            cleaner,
            validator,
            memory,
            max_retries,
        }
    }

    /// 各组件累计 token 数之和：(prompt, completion, total)
    fn token_totals(&self) -> (u64, u64, u64) {
        let usages = [
            self.tool_decision.usage.get(),
            self.cleaner.usage.get(),
            self.validator.usage.get(),
            self.memory.usage.get(),
        ];
        usages.iter().fold((0, 0, 0), |acc, (p, c, t)| {
            (acc.0 + p, acc.1 + c, acc.2 + t)
        })
    }

    /// 执行一个检索步骤
    ///
    /// query_id 缺省时生成新会话并通过元数据返回，调用方可据此在后续步骤复用同一会话。
    pub async fn process(&self, step: &str, query_id: Option<String>) -> SubAgentResult {
        let query_id = query_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut retry_count: usize = 0;
        match self.run(step, &query_id, &mut retry_count).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, step = %step, "sub-agent step failed");
                let (prompt, completion, total) = self.token_totals();
                let mut metadata = HashMap::new();
                metadata.insert("query_id".to_string(), query_id);
                metadata.insert("error".to_string(), e.to_string());
                metadata.insert("retry_count".to_string(), retry_count.to_string());
                metadata.insert("prompt_tokens".to_string(), prompt.to_string());
                metadata.insert("completion_tokens".to_string(), completion.to_string());
                metadata.insert("total_tokens".to_string(), total.to_string());
                SubAgentResult {
                    info: format!("Error while retrieving information for '{}': {}", step, e),
                    metadata,
                }
            }
        }
    }

    /// retry_count 由调用方持有：出错中断时已走过的重试次数仍可进入错误元数据
    async fn run(
        &self,
        step: &str,
        query_id: &str,
        retry_count: &mut usize,
    ) -> Result<SubAgentResult, AgentError> {
        let original_step = step;
        let mut current_step = step.to_string();
        let mut validation_history = Vec::new();

        loop {
            let tool = self.tool_decision.decide(&current_step).await?;

            let (contexts, failed) = match self.memory.get_cache(query_id, &current_step).await {
                Some(cached) => {
                    tracing::info!(step = %current_step, "using cached contexts");
                    (cached, false)
                }
                None => {
                    let (contexts, failed) = self.tool_ops.execute(tool, &current_step).await;
                    // 失败尝试的结果不可信，不写缓存
                    if !failed {
                        self.memory
                            .cache(query_id, &current_step, contexts.clone())
                            .await;
                    }
                    (contexts, failed)
                }
            };

            if failed {
                if *retry_count < self.max_retries {
                    *retry_count += 1;
                    current_step = format!(
                        "{} (alternative information, attempt {})",
                        original_step, retry_count
                    );
                    tracing::info!(
                        retry_count = *retry_count,
                        step = %current_step,
                        "retrieval failed, retrying with perturbed query"
                    );
                    continue;
                }
                // 预算耗尽且本次检索失败：返回记忆中已有内容
                tracing::warn!(step = %original_step, "retry budget exhausted on failed retrieval");
                break;
            }

            let ranked = self.tool_ops.rerank(&current_step, contexts).await;
            let serialized = render_contexts(&ranked);
            let cleaned = self.cleaner.clean(&current_step, &serialized).await?;
            // 合并始终以原始步骤为键：累积是面向查询的，不随改写漂移
            let merged = self.memory.merge(query_id, original_step, &cleaned).await?;

            if *retry_count >= self.max_retries {
                // 最后一次尝试不再消耗验证调用
                tracing::info!(
                    retry_count = *retry_count,
                    "final attempt reached, skipping validation"
                );
                break;
            }

            let verdict = self.validator.validate(original_step, &merged).await?;
            validation_history.push(json!({
                "attempt": *retry_count,
                "is_sufficient": verdict.is_sufficient,
                "reasoning": verdict.reasoning,
                "reformulated_query": verdict.reformulated_query,
            }));

            if verdict.is_sufficient {
                break;
            }

            self.memory
                .update_missing_aspects(query_id, verdict.missing_aspects.clone())
                .await;

            let reformulated = verdict.reformulated_query.trim();
            current_step = if !reformulated.is_empty() && reformulated != current_step {
                reformulated.to_string()
            } else {
                let (_, missing, _) = self.memory.get(query_id).await;
                synthesize_step(original_step, &missing)
            };
            *retry_count += 1;
            tracing::info!(
                retry_count = *retry_count,
                step = %current_step,
                "reformulated for next attempt"
            );
        }

        let (info, missing_aspects, _) = self.memory.get(query_id).await;
        let info = if info.is_empty() {
            format!("No information found for: {}", original_step)
        } else {
            info
        };

        let (prompt, completion, total) = self.token_totals();
        let mut metadata = HashMap::new();
        metadata.insert("query_id".to_string(), query_id.to_string());
        metadata.insert("retry_count".to_string(), retry_count.to_string());
        metadata.insert("prompt_tokens".to_string(), prompt.to_string());
        metadata.insert("completion_tokens".to_string(), completion.to_string());
        metadata.insert("total_tokens".to_string(), total.to_string());
        metadata.insert("missing_aspects".to_string(), missing_aspects.join("; "));
        metadata.insert(
            "validation_history".to_string(),
            serde_json::to_string(&validation_history).unwrap_or_default(),
        );

        Ok(SubAgentResult { info, metadata })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesize_step_with_aspects() {
        let step = synthesize_step("capital of France", &["population".into(), "area".into()]);
        assert_eq!(step, "capital of France (focus on: population; area)");
    }

    #[test]
    fn test_synthesize_step_generic_suffix() {
        let step = synthesize_step("capital of France", &[]);
        assert_eq!(step, "capital of France (need more comprehensive information)");
    }
}
