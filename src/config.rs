//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `SCOUT__*` 覆盖（双下划线表示嵌套，如 `SCOUT__LLM__MODEL=gpt-4o-mini`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSection,
    pub embedding: EmbeddingSection,
    pub search: SearchSection,
    pub chunking: ChunkingSection,
    pub rerank: RerankSection,
    pub agent: AgentSection,
}

/// [llm] 段：端点、模型与生成参数
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LlmSection {
    pub base_url: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    pub api_key: Option<String>,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_completion_tokens")]
    pub max_completion_tokens: u32,
    #[serde(default)]
    pub frequency_penalty: f32,
    #[serde(default)]
    pub presence_penalty: f32,
    /// 单次 LLM 调用超时（秒）
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_completion_tokens() -> u32 {
    4096
}

fn default_llm_timeout_secs() -> u64 {
    60
}

/// [embedding] 段：语义分块用的嵌入端点
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct EmbeddingSection {
    pub base_url: Option<String>,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    pub api_key: Option<String>,
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

/// [search] 段：结果条数、抓取超时、单页最大字符数、反爬特征
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_page_chars")]
    pub max_page_chars: usize,
    /// 页面原文中出现至少 challenge_threshold 个特征短语时判定为反爬拦截页
    #[serde(default = "default_challenge_patterns")]
    pub challenge_patterns: Vec<String>,
    #[serde(default = "default_challenge_threshold")]
    pub challenge_threshold: usize,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            timeout_secs: default_search_timeout_secs(),
            max_page_chars: default_max_page_chars(),
            challenge_patterns: default_challenge_patterns(),
            challenge_threshold: default_challenge_threshold(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

fn default_search_timeout_secs() -> u64 {
    15
}

fn default_max_page_chars() -> usize {
    20000
}

fn default_challenge_patterns() -> Vec<String> {
    vec![
        "verify you are human".into(),
        "checking your browser".into(),
        "enable javascript and cookies".into(),
        "unusual traffic".into(),
        "are you a robot".into(),
        "access denied".into(),
        "request blocked".into(),
        "captcha".into(),
        "cloudflare".into(),
    ]
}

fn default_challenge_threshold() -> usize {
    3
}

/// [chunking] 段：语义分块的相似度阈值与回退段落大小
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChunkingSection {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,
}

impl Default for ChunkingSection {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            max_chunk_chars: default_max_chunk_chars(),
        }
    }
}

fn default_similarity_threshold() -> f32 {
    0.6
}

fn default_max_chunk_chars() -> usize {
    1200
}

/// [rerank] 段：交叉编码打分服务端点
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RerankSection {
    pub url: Option<String>,
    #[serde(default = "default_rerank_timeout_secs")]
    pub timeout_secs: u64,
    /// 重排后保留的 context 条数
    #[serde(default = "default_rerank_top_k")]
    pub top_k: usize,
}

impl Default for RerankSection {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_rerank_timeout_secs(),
            top_k: default_rerank_top_k(),
        }
    }
}

fn default_rerank_timeout_secs() -> u64 {
    10
}

fn default_rerank_top_k() -> usize {
    3
}

/// [agent] 段：子代理重试预算
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
        }
    }
}

fn default_max_retries() -> usize {
    3
}

/// 从 config 目录加载配置，环境变量 SCOUT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 SCOUT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("SCOUT")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.agent.max_retries, 3);
        assert_eq!(cfg.search.challenge_threshold, 3);
        assert!(cfg.search.challenge_patterns.len() >= 3);
        assert_eq!(cfg.rerank.top_k, 3);
    }
}
