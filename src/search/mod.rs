//! 搜索层：搜索引擎查询、并发抓取页面、文本分块、反爬识别
//!
//! 产出统一的 SearchHit {title, url, chunks, blocked}，由工具操作层归一化为 ContextItem。

pub mod botwall;
pub mod chunker;
pub mod engine;

use async_trait::async_trait;

pub use botwall::BotwallDetector;
pub use chunker::Chunker;
pub use engine::WebSearcher;

/// 单条搜索结果：标题、URL、正文分块；blocked 标记抓取时命中反爬拦截页
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub chunks: Vec<String>,
    pub blocked: bool,
}

/// 搜索提供方抽象：发起查询并返回 top_k 条带正文的结果
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>, String>;
}
