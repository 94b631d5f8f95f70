//! Scout CLI：对单个查询跑完整的检索流水线并打印答案
//!
//! 用法：`scout "<question>"`；配置来自 config/default.toml 与 SCOUT__* 环境变量。

use std::sync::Arc;

use anyhow::{bail, Context};

use scout::agent::{ContextCleaner, OutputValidator, SubAgent, ToolDecision, ToolOperation};
use scout::config::load_config;
use scout::llm::{create_embedder, GenerationParams, OpenAiClient};
use scout::memory::MemoryManager;
use scout::pipeline::{AnswerGenerator, GetFact, Pipeline, Planner};
use scout::rerank::{HttpReranker, PassthroughReranker, Reranker};
use scout::search::{Chunker, WebSearcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    scout::observability::init();

    let query: String = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if query.trim().is_empty() {
        bail!("usage: scout \"<question>\"");
    }

    let config = load_config(None).context("failed to load config")?;

    let llm: Arc<dyn scout::llm::LlmClient> = Arc::new(
        OpenAiClient::new(
            config.llm.base_url.as_deref(),
            &config.llm.model,
            config.llm.api_key.as_deref(),
        )
        .with_params(GenerationParams {
            temperature: config.llm.temperature,
            max_completion_tokens: config.llm.max_completion_tokens,
            frequency_penalty: config.llm.frequency_penalty,
            presence_penalty: config.llm.presence_penalty,
        }),
    );
    let llm_timeout = config.llm.timeout_secs;

    let embedder = create_embedder(
        config.embedding.base_url.as_deref(),
        &config.embedding.model,
        config.embedding.api_key.as_deref(),
    );
    let chunker = Chunker::new(embedder, &config.chunking);
    let searcher = Arc::new(WebSearcher::new(&config.search, chunker)?);

    let reranker: Arc<dyn Reranker> = match HttpReranker::from_config(&config.rerank)? {
        Some(client) => Arc::new(client),
        None => {
            tracing::warn!("no rerank endpoint configured, keeping retrieval order");
            Arc::new(PassthroughReranker)
        }
    };

    let memory = Arc::new(MemoryManager::new(llm.clone(), llm_timeout));
    let sub_agent = SubAgent::new(
        ToolDecision::new(llm.clone(), llm_timeout),
        ToolOperation::new(searcher, reranker, config.search.top_k, config.rerank.top_k),
        ContextCleaner::new(llm.clone(), llm_timeout),
        OutputValidator::new(llm.clone(), llm_timeout),
        memory.clone(),
        config.agent.max_retries,
    );

    let pipeline = Pipeline::new(
        GetFact::new(llm.clone(), llm_timeout),
        Planner::new(llm.clone(), llm_timeout),
        AnswerGenerator::new(llm.clone(), llm_timeout),
        sub_agent,
        memory,
    );

    let output = pipeline.run(&query).await?;
    println!("{}", output.answer);

    let (prompt, completion, total) = llm.token_usage();
    tracing::info!(prompt, completion, total, "token usage");
    Ok(())
}
