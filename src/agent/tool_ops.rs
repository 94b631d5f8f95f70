//! 工具操作：按工具标签分发检索、归一化结果并分类失败
//!
//! vector_search 在当前版本没有独立的向量索引实现，按既有行为回退到 web 路径；
//! 接口保持按标签分发、返回同一结果形状，后续接入真实向量检索时只改这里。
//!
//! 失败是信号而非异常：空结果、或超过半数结果无正文 / 命中拦截页，均视为一次检索失败，
//! 由 Orchestrator 决定是否换一个扰动后的查询立即重试。

use std::sync::Arc;

use crate::agent::{ContextItem, ToolLabel};
use crate::rerank::Reranker;
use crate::search::{SearchHit, SearchProvider};

pub struct ToolOperation {
    search: Arc<dyn SearchProvider>,
    reranker: Arc<dyn Reranker>,
    /// 搜索返回的结果条数
    top_k: usize,
    /// 重排后保留的 context 条数
    rerank_top_k: usize,
}

/// 失败分类：零结果，或坏结果（无分块或拦截页）超过半数
fn classify_failure(hits: &[SearchHit]) -> bool {
    if hits.is_empty() {
        return true;
    }
    let bad = hits
        .iter()
        .filter(|h| h.chunks.is_empty() || h.blocked)
        .count();
    bad * 2 > hits.len()
}

impl ToolOperation {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        reranker: Arc<dyn Reranker>,
        top_k: usize,
        rerank_top_k: usize,
    ) -> Self {
        Self {
            search,
            reranker,
            top_k,
            rerank_top_k,
        }
    }

    /// 执行一次检索尝试；上游搜索错误按检索失败分类，不中断重试循环
    pub async fn execute(&self, tool: ToolLabel, step: &str) -> (Vec<ContextItem>, bool) {
        let hits = match tool {
            ToolLabel::WebSearch => self.search.search(step, self.top_k).await,
            ToolLabel::VectorSearch => {
                // 向量索引尚未独立实现，走同一条 web 路径
                tracing::debug!(step = %step, "vector_search falling back to web path");
                self.search.search(step, self.top_k).await
            }
        };

        match hits {
            Ok(hits) => {
                let failed = classify_failure(&hits);
                if failed {
                    tracing::warn!(
                        step = %step,
                        hits = hits.len(),
                        "retrieval classified as failed"
                    );
                }
                let contexts = hits.into_iter().map(ContextItem::from).collect();
                (contexts, failed)
            }
            Err(e) => {
                tracing::warn!(step = %step, error = %e, "search call failed");
                (vec![], true)
            }
        }
    }

    /// 按与 current_step 的相关性重排 contexts
    ///
    /// 每个 context 的分块逐条送打分服务，组内取均值作为该 context 的分数；
    /// 打分失败时降级为按原序截断，不中断流水线。
    pub async fn rerank(&self, query: &str, contexts: Vec<ContextItem>) -> Vec<ContextItem> {
        if contexts.is_empty() {
            return contexts;
        }

        // 展平所有分块，记录每块所属的 context 下标
        let mut candidates = Vec::new();
        let mut owners = Vec::new();
        for (idx, ctx) in contexts.iter().enumerate() {
            for chunk in &ctx.chunks {
                candidates.push(chunk.clone());
                owners.push(idx);
            }
        }
        if candidates.is_empty() {
            let mut out = contexts;
            out.truncate(self.rerank_top_k);
            return out;
        }

        let scores = match self.reranker.score(query, &candidates).await {
            Ok(scores) => scores,
            Err(e) => {
                tracing::warn!(error = %e, "rerank failed, keeping original order");
                let mut out = contexts;
                out.truncate(self.rerank_top_k);
                return out;
            }
        };

        // 组内均值
        let mut sums = vec![0.0f32; contexts.len()];
        let mut counts = vec![0usize; contexts.len()];
        for (owner, score) in owners.iter().zip(scores.iter()) {
            sums[*owner] += score;
            counts[*owner] += 1;
        }

        let mut scored: Vec<ContextItem> = contexts
            .into_iter()
            .enumerate()
            .map(|(idx, mut ctx)| {
                let score = if counts[idx] > 0 {
                    sums[idx] / counts[idx] as f32
                } else {
                    0.0
                };
                ctx.relevance_score = Some(score);
                ctx
            })
            .collect();
        scored.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(self.rerank_top_k);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn hit(chunks: Vec<&str>, blocked: bool) -> SearchHit {
        SearchHit {
            title: "t".into(),
            url: "u".into(),
            chunks: chunks.into_iter().map(String::from).collect(),
            blocked,
        }
    }

    #[test]
    fn test_empty_results_fail() {
        assert!(classify_failure(&[]));
    }

    #[test]
    fn test_majority_bad_fails() {
        let hits = vec![hit(vec!["a"], false), hit(vec![], false), hit(vec![], true)];
        assert!(classify_failure(&hits));
    }

    #[test]
    fn test_half_bad_does_not_fail() {
        let hits = vec![hit(vec!["a"], false), hit(vec![], false)];
        assert!(!classify_failure(&hits));
    }

    struct FixedScores(Vec<f32>);

    #[async_trait]
    impl Reranker for FixedScores {
        async fn score(&self, _query: &str, candidates: &[String]) -> Result<Vec<f32>, String> {
            Ok(self.0[..candidates.len()].to_vec())
        }
    }

    struct NoSearch;

    #[async_trait]
    impl SearchProvider for NoSearch {
        async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<SearchHit>, String> {
            Ok(vec![])
        }
    }

    fn ctx(chunks: Vec<&str>) -> ContextItem {
        ContextItem {
            title: "t".into(),
            url: "u".into(),
            chunks: chunks.into_iter().map(String::from).collect(),
            relevance_score: None,
        }
    }

    #[tokio::test]
    async fn test_rerank_averages_per_context() {
        // 第一个 context 两块均 0.2，第二个单块 0.9：重排后第二个在前
        let ops = ToolOperation::new(
            Arc::new(NoSearch),
            Arc::new(FixedScores(vec![0.2, 0.2, 0.9])),
            5,
            3,
        );
        let ranked = ops
            .rerank("q", vec![ctx(vec!["a", "b"]), ctx(vec!["c"])])
            .await;
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].relevance_score, Some(0.9));
        assert!((ranked[1].relevance_score.unwrap() - 0.2).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_rerank_truncates_to_top_k() {
        let ops = ToolOperation::new(
            Arc::new(NoSearch),
            Arc::new(FixedScores(vec![0.1, 0.2, 0.3])),
            5,
            2,
        );
        let ranked = ops
            .rerank("q", vec![ctx(vec!["a"]), ctx(vec!["b"]), ctx(vec!["c"])])
            .await;
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].relevance_score, Some(0.3));
    }
}
