//! 外层 RAG 流水线：事实抽取 -> 计划 -> 逐步执行子代理 -> 答案合成
//!
//! 计划内所有步骤共享同一个 query_id 会话，发现跨步累积；
//! 流水线结束时显式清除会话。

pub mod answer;
pub mod get_fact;
pub mod planning;

use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

pub use answer::AnswerGenerator;
pub use get_fact::GetFact;
pub use planning::{parse_plan, Planner};

use crate::agent::SubAgent;
use crate::core::AgentError;
use crate::memory::MemoryManager;

/// 一次完整查询的结果：最终答案与各步骤发现
#[derive(Debug)]
pub struct PipelineOutput {
    pub answer: String,
    pub findings: Vec<serde_json::Value>,
}

pub struct Pipeline {
    get_fact: GetFact,
    planner: Planner,
    answer_generator: AnswerGenerator,
    sub_agent: SubAgent,
    memory: Arc<MemoryManager>,
}

impl Pipeline {
    pub fn new(
        get_fact: GetFact,
        planner: Planner,
        answer_generator: AnswerGenerator,
        sub_agent: SubAgent,
        memory: Arc<MemoryManager>,
    ) -> Self {
        Self {
            get_fact,
            planner,
            answer_generator,
            sub_agent,
            memory,
        }
    }

    pub async fn run(&self, query: &str) -> Result<PipelineOutput, AgentError> {
        let fact = self.get_fact.extract(query).await?;
        tracing::info!(fact = %fact, "facts to gather");

        let steps = self.planner.plan(query, &fact).await?;

        let query_id = Uuid::new_v4().to_string();
        let mut findings = Vec::new();
        for step in &steps {
            let result = self.sub_agent.process(step, Some(query_id.clone())).await;
            tracing::info!(
                step = %step,
                retry_count = result.metadata.get("retry_count").map(String::as_str).unwrap_or("-"),
                "step finished"
            );
            findings.push(json!({
                "query": step,
                "content": result.info,
            }));
        }

        let context = serde_json::to_string(&findings)
            .map_err(|e| AgentError::JsonParse(e.to_string()))?;
        let answer = self.answer_generator.generate(query, &context).await?;

        // 会话生命周期 = 一次计划执行
        self.memory.clear(&query_id).await;

        Ok(PipelineOutput { answer, findings })
    }
}
