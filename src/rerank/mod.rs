//! 重排层：相关性打分服务的客户端抽象
//!
//! 打分服务接收 (query, 候选文本列表)，返回与候选同序的标量分数；
//! 候选按所属 context 分组时，由调用方（工具操作层）对每组分数取均值后排序。

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::RerankSection;
use crate::core::AgentError;

/// 打分抽象：分数列表与 candidates 同序
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn score(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>, String>;
}

#[derive(Deserialize)]
struct ScoreResponse {
    scores: Vec<f32>,
}

/// 交叉编码打分服务的 HTTP 客户端
pub struct HttpReranker {
    client: reqwest::Client,
    url: String,
}

impl HttpReranker {
    /// 构造失败直接上抛，不回退到无超时的默认客户端
    pub fn new(url: &str, timeout_secs: u64) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("rerank client build: {}", e)))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    /// 未配置端点时返回 Ok(None)，由调用方决定回退策略
    pub fn from_config(config: &RerankSection) -> Result<Option<Self>, AgentError> {
        config
            .url
            .as_deref()
            .map(|url| Self::new(url, config.timeout_secs))
            .transpose()
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn score(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>, String> {
        if candidates.is_empty() {
            return Ok(vec![]);
        }
        let body = json!({ "query": query, "texts": candidates });
        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("rerank request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("rerank service returned HTTP {}", resp.status()));
        }
        let parsed: ScoreResponse = resp
            .json()
            .await
            .map_err(|e| format!("rerank response parse: {}", e))?;
        if parsed.scores.len() != candidates.len() {
            return Err(format!(
                "rerank score count mismatch: {} candidates, {} scores",
                candidates.len(),
                parsed.scores.len()
            ));
        }
        Ok(parsed.scores)
    }
}

/// 无打分服务时的回退：按出现顺序给出递减分数，保持原序
pub struct PassthroughReranker;

#[async_trait]
impl Reranker for PassthroughReranker {
    async fn score(&self, _query: &str, candidates: &[String]) -> Result<Vec<f32>, String> {
        Ok((0..candidates.len())
            .map(|i| 1.0 - i as f32 / (candidates.len().max(1) as f32))
            .collect())
    }
}
