//! 跨步记忆：按 query_id 隔离的会话存储
//!
//! 显式的 arena + 索引结构（query_id -> InformationMemory），由唯一一个
//! MemoryManager 实例持有并传引用给 Orchestrator，不走全局可变状态。
//! 每个会话一把独立的锁：merge 在持锁期间完成读改写，同一会话内不会出现
//! 撕裂更新；不同 query_id 之间互不阻塞。
//!
//! merge 的非回退不变式：complete_info 一旦非空，后续合并只能在其上整合，
//! 新信息绝不直接覆盖旧信息。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::agent::prompts::{MERGE_CONTEXT_SYSTEM_PROMPT, MERGE_CONTEXT_USER_PROMPT};
use crate::agent::ContextItem;
use crate::core::AgentError;
use crate::llm::{complete_bounded, LlmClient, Message, TokenUsage};

/// 单个查询会话的累积状态；生命周期为一次外层检索计划的执行
#[derive(Debug, Default, Clone)]
pub struct InformationMemory {
    /// 已累积的清洗后发现
    pub complete_info: String,
    /// 验证器最近报告的缺失方面
    pub missing_aspects: Vec<String>,
    /// 首次 merge 时记录的原始查询
    pub original_query: String,
    /// 按当前步骤文本缓存的原始检索结果；仅缓存未判失败的尝试
    pub cached_contexts: HashMap<String, Vec<ContextItem>>,
}

pub struct MemoryManager {
    llm: Arc<dyn LlmClient>,
    timeout_secs: u64,
    pub usage: TokenUsage,
    sessions: RwLock<HashMap<String, Arc<Mutex<InformationMemory>>>>,
}

impl MemoryManager {
    pub fn new(llm: Arc<dyn LlmClient>, timeout_secs: u64) -> Self {
        Self {
            llm,
            timeout_secs,
            usage: TokenUsage::new(),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// 取会话句柄，首次访问时创建
    async fn entry(&self, query_id: &str) -> Arc<Mutex<InformationMemory>> {
        {
            let sessions = self.sessions.read().await;
            if let Some(entry) = sessions.get(query_id) {
                return entry.clone();
            }
        }
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(query_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(InformationMemory::default())))
            .clone()
    }

    /// 合并新发现到会话
    ///
    /// 会话为空时新 context 原样成为 complete_info 并记录原始查询；
    /// 否则交给 LLM 做整合去重，结果替换 complete_info。持锁覆盖整个读改写，
    /// 同一会话的并发 merge 串行执行。
    pub async fn merge(
        &self,
        query_id: &str,
        query: &str,
        new_context: &str,
    ) -> Result<String, AgentError> {
        let entry = self.entry(query_id).await;
        let mut memory = entry.lock().await;

        if memory.complete_info.is_empty() {
            memory.complete_info = new_context.to_string();
            memory.original_query = query.to_string();
            return Ok(new_context.to_string());
        }

        let messages = vec![
            Message::system(MERGE_CONTEXT_SYSTEM_PROMPT),
            Message::user(
                MERGE_CONTEXT_USER_PROMPT
                    .replace("{query}", query)
                    .replace("{existing_info}", &memory.complete_info)
                    .replace("{new_info}", new_context),
            ),
        ];

        let (p0, c0, _) = self.llm.token_usage();
        let merged = complete_bounded(&self.llm, &messages, self.timeout_secs)
            .await
            .map_err(AgentError::Llm)?;
        let (p1, c1, _) = self.llm.token_usage();
        self.usage
            .add(p1.saturating_sub(p0), c1.saturating_sub(c0));

        let merged = merged.trim().to_string();
        memory.complete_info = merged.clone();
        Ok(merged)
    }

    /// 读取会话状态：(complete_info, missing_aspects, original_query)
    pub async fn get(&self, query_id: &str) -> (String, Vec<String>, String) {
        let entry = self.entry(query_id).await;
        let memory = entry.lock().await;
        (
            memory.complete_info.clone(),
            memory.missing_aspects.clone(),
            memory.original_query.clone(),
        )
    }

    pub async fn update_missing_aspects(&self, query_id: &str, aspects: Vec<String>) {
        let entry = self.entry(query_id).await;
        entry.lock().await.missing_aspects = aspects;
    }

    /// 缓存一次未失败尝试的原始检索结果，键为当前步骤文本
    pub async fn cache(&self, query_id: &str, step: &str, contexts: Vec<ContextItem>) {
        let entry = self.entry(query_id).await;
        entry
            .lock()
            .await
            .cached_contexts
            .insert(step.to_string(), contexts);
    }

    pub async fn get_cache(&self, query_id: &str, step: &str) -> Option<Vec<ContextItem>> {
        let entry = self.entry(query_id).await;
        let memory = entry.lock().await;
        memory.cached_contexts.get(step).cloned()
    }

    /// 会话结束时显式清除
    pub async fn clear(&self, query_id: &str) {
        self.sessions.write().await.remove(query_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;

    fn manager(responses: Vec<&str>) -> MemoryManager {
        MemoryManager::new(Arc::new(ScriptedLlmClient::new(responses)), 5)
    }

    #[tokio::test]
    async fn test_first_merge_is_verbatim() {
        let mgr = manager(vec![]);
        let merged = mgr.merge("q1", "capital of France", "Paris.").await.unwrap();
        assert_eq!(merged, "Paris.");
        let (info, _, original) = mgr.get("q1").await;
        assert_eq!(info, "Paris.");
        assert_eq!(original, "capital of France");
    }

    #[tokio::test]
    async fn test_second_merge_consolidates() {
        // 脚本化的整合输出同时保留两轮事实：验证 complete_info 被合并结果替换而非被新输入覆盖
        let mgr = manager(vec!["Paris is the capital. Its population is about 2.1 million."]);
        mgr.merge("q1", "about Paris", "Paris is the capital.").await.unwrap();
        mgr.merge("q1", "about Paris", "Population is about 2.1 million.")
            .await
            .unwrap();
        let (info, _, _) = mgr.get("q1").await;
        assert!(info.contains("capital"));
        assert!(info.contains("2.1 million"));
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let mgr = manager(vec![]);
        mgr.merge("a", "qa", "info for a").await.unwrap();
        mgr.merge("b", "qb", "info for b").await.unwrap();
        let (info_a, _, _) = mgr.get("a").await;
        let (info_b, _, _) = mgr.get("b").await;
        assert_eq!(info_a, "info for a");
        assert_eq!(info_b, "info for b");
    }

    #[tokio::test]
    async fn test_cache_roundtrip() {
        let mgr = manager(vec![]);
        let contexts = vec![ContextItem {
            title: "t".into(),
            url: "u".into(),
            chunks: vec!["c".into()],
            relevance_score: None,
        }];
        mgr.cache("q1", "step text", contexts.clone()).await;
        let cached = mgr.get_cache("q1", "step text").await.unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].chunks, contexts[0].chunks);
        assert!(mgr.get_cache("q1", "other step").await.is_none());
        assert!(mgr.get_cache("q2", "step text").await.is_none());
    }

    #[tokio::test]
    async fn test_clear_drops_session() {
        let mgr = manager(vec![]);
        mgr.merge("q1", "q", "some info").await.unwrap();
        mgr.clear("q1").await;
        let (info, _, original) = mgr.get("q1").await;
        assert!(info.is_empty());
        assert!(original.is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_aspects() {
        let mgr = manager(vec![]);
        mgr.update_missing_aspects("q1", vec!["population".into()]).await;
        let (_, missing, _) = mgr.get("q1").await;
        assert_eq!(missing, vec!["population"]);
    }
}
