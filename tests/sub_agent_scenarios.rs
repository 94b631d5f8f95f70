//! 子代理端到端场景测试
//!
//! 用脚本化的 LLM / 搜索 / 打分桩驱动完整主循环，覆盖：
//! 一次通过、检索失败的同步重试通道、重试预算耗尽、缓存命中与循环有界性。

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use scout::agent::{
        ContextCleaner, OutputValidator, SubAgent, ToolDecision, ToolOperation,
    };
    use scout::llm::{LlmClient, ScriptedLlmClient};
    use scout::memory::MemoryManager;
    use scout::rerank::Reranker;
    use scout::search::{SearchHit, SearchProvider};

    const SUFFICIENT: &str =
        r#"{"is_sufficient": true, "reasoning": "answers the step", "reformulated_query": ""}"#;

    /// 脚本化搜索：按预置队列逐次返回结果；队列耗尽后返回空结果
    struct ScriptedSearch {
        results: Mutex<VecDeque<Vec<SearchHit>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSearch {
        fn new(results: Vec<Vec<SearchHit>>) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results.into_iter().collect()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SearchProvider for ScriptedSearch {
        async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<SearchHit>, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.results.lock().unwrap().pop_front().unwrap_or_default())
        }
    }

    /// 所有候选同分：保持原序
    struct UniformReranker;

    #[async_trait]
    impl Reranker for UniformReranker {
        async fn score(&self, _query: &str, candidates: &[String]) -> Result<Vec<f32>, String> {
            Ok(vec![0.5; candidates.len()])
        }
    }

    fn hit(title: &str, chunks: Vec<&str>) -> SearchHit {
        SearchHit {
            title: title.to_string(),
            url: format!("https://example.com/{}", title),
            chunks: chunks.into_iter().map(String::from).collect(),
            blocked: false,
        }
    }

    fn build_agent(
        llm: Arc<ScriptedLlmClient>,
        search: Arc<ScriptedSearch>,
        max_retries: usize,
    ) -> SubAgent {
        let llm_dyn: Arc<dyn LlmClient> = llm;
        let memory = Arc::new(MemoryManager::new(llm_dyn.clone(), 5));
        SubAgent::new(
            ToolDecision::new(llm_dyn.clone(), 5),
            ToolOperation::new(search, Arc::new(UniformReranker), 5, 3),
            ContextCleaner::new(llm_dyn.clone(), 5),
            OutputValidator::new(llm_dyn.clone(), 5),
            memory,
            max_retries,
        )
    }

    #[tokio::test]
    async fn test_single_pass_success() {
        // 决策 -> 检索成功 -> 清洗 -> 首次合并原样入库 -> 验证充分，retry_count = 0
        let llm = Arc::new(ScriptedLlmClient::new(vec![
            "web_search",
            "Paris is the capital of France.",
            SUFFICIENT,
        ]));
        let search = ScriptedSearch::new(vec![vec![hit(
            "paris",
            vec!["Paris is the capital and largest city of France."],
        )]]);
        let agent = build_agent(llm.clone(), search.clone(), 3);

        let result = agent.process("Capital of France", None).await;

        assert_eq!(result.info, "Paris is the capital of France.");
        assert_eq!(result.metadata.get("retry_count").unwrap(), "0");
        assert!(!result.metadata.get("query_id").unwrap().is_empty());
        let history = result.metadata.get("validation_history").unwrap();
        assert!(history.contains("\"is_sufficient\":true"));
        assert_eq!(search.calls(), 1);
        assert_eq!(llm.remaining(), 0);
    }

    #[tokio::test]
    async fn test_failed_retrieval_uses_immediate_retry_channel() {
        // 第一次检索返回零结果：不消耗验证调用，立即换扰动查询重试
        let llm = Arc::new(ScriptedLlmClient::new(vec![
            "web_search",
            "web_search",
            "Recovered on second attempt.",
            SUFFICIENT,
        ]));
        let search = ScriptedSearch::new(vec![
            vec![],
            vec![hit("doc", vec!["useful content"])],
        ]);
        let agent = build_agent(llm.clone(), search.clone(), 3);

        let result = agent.process("obscure topic", None).await;

        assert_eq!(result.metadata.get("retry_count").unwrap(), "1");
        assert_eq!(result.info, "Recovered on second attempt.");
        assert_eq!(search.calls(), 2);
        // 验证只发生了一次
        let history: serde_json::Value =
            serde_json::from_str(result.metadata.get("validation_history").unwrap()).unwrap();
        assert_eq!(history.as_array().unwrap().len(), 1);
        assert_eq!(llm.remaining(), 0);
    }

    #[tokio::test]
    async fn test_insufficient_until_budget_exhausted() {
        // 验证器持续判不充分；最后一次尝试跳过验证，返回记忆中的合并结果
        let insufficient_alpha = r#"{"is_sufficient": false, "reasoning": "too thin", "missing_aspects": ["details"], "reformulated_query": "alpha"}"#;
        let insufficient_beta = r#"{"is_sufficient": false, "reasoning": "still thin", "missing_aspects": ["more details"], "reformulated_query": "beta"}"#;
        let llm = Arc::new(ScriptedLlmClient::new(vec![
            "web_search",
            "cleaned one",
            insufficient_alpha,
            "web_search",
            "cleaned two",
            "merged after two",
            insufficient_beta,
            "web_search",
            "cleaned three",
            "merged after three",
        ]));
        let search = ScriptedSearch::new(vec![
            vec![hit("a", vec!["text a"])],
            vec![hit("b", vec!["text b"])],
            vec![hit("c", vec!["text c"])],
        ]);
        let agent = build_agent(llm.clone(), search.clone(), 2);

        let result = agent.process("broad question", None).await;

        assert_eq!(result.metadata.get("retry_count").unwrap(), "2");
        assert_eq!(result.info, "merged after three");
        assert_eq!(result.metadata.get("missing_aspects").unwrap(), "more details");
        let history: serde_json::Value =
            serde_json::from_str(result.metadata.get("validation_history").unwrap()).unwrap();
        assert_eq!(history.as_array().unwrap().len(), 2);
        assert_eq!(llm.remaining(), 0);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_retrieval() {
        // 同一会话内对相同步骤的第二次 process 复用缓存，不再触发搜索
        let llm = Arc::new(ScriptedLlmClient::new(vec![
            "web_search",
            "first cleaned",
            SUFFICIENT,
            "web_search",
            "second cleaned",
            "first and second consolidated",
            SUFFICIENT,
        ]));
        let search = ScriptedSearch::new(vec![vec![hit("doc", vec!["content"])]]);
        let agent = build_agent(llm.clone(), search.clone(), 3);

        let first = agent.process("same step", None).await;
        let query_id = first.metadata.get("query_id").unwrap().clone();

        let second = agent.process("same step", Some(query_id.clone())).await;

        assert_eq!(search.calls(), 1);
        assert_eq!(second.metadata.get("query_id").unwrap(), &query_id);
        assert_eq!(second.info, "first and second consolidated");
        assert_eq!(llm.remaining(), 0);
    }

    #[tokio::test]
    async fn test_always_failing_search_terminates() {
        // 检索永远失败：循环在 max_retries + 1 轮内终止，返回无信息说明
        let llm = Arc::new(ScriptedLlmClient::new(vec![
            "web_search",
            "web_search",
            "web_search",
        ]));
        let search = ScriptedSearch::new(vec![]);
        let agent = build_agent(llm.clone(), search.clone(), 2);

        let result = agent.process("hopeless query", None).await;

        assert_eq!(search.calls(), 3);
        assert_eq!(result.metadata.get("retry_count").unwrap(), "2");
        assert!(result.info.starts_with("No information found for:"));
        assert_eq!(llm.remaining(), 0);
    }

    #[tokio::test]
    async fn test_decision_error_yields_result_not_panic() {
        // 工具标签不合法：错误在外层边界转为带说明的 SubAgentResult
        let llm = Arc::new(ScriptedLlmClient::new(vec!["knowledge_graph"]));
        let search = ScriptedSearch::new(vec![]);
        let agent = build_agent(llm.clone(), search, 2);

        let result = agent.process("any step", None).await;

        assert!(result.info.contains("Unsupported tool"));
        assert!(result.metadata.contains_key("error"));
        assert_eq!(result.metadata.get("retry_count").unwrap(), "0");
        // 已累计的 token 计数保留在元数据里
        assert_eq!(result.metadata.get("total_tokens").unwrap(), "15");
    }

    #[tokio::test]
    async fn test_error_metadata_keeps_retry_count() {
        // 第一次检索失败走重试通道后出错中断：错误元数据仍记录已发生的重试次数
        let llm = Arc::new(ScriptedLlmClient::new(vec!["web_search", "bad_label"]));
        let search = ScriptedSearch::new(vec![vec![]]);
        let agent = build_agent(llm.clone(), search, 3);

        let result = agent.process("some step", None).await;

        assert!(result.metadata.contains_key("error"));
        assert_eq!(result.metadata.get("retry_count").unwrap(), "1");
    }
}
