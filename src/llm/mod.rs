//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock）、嵌入客户端

pub mod embedding;
pub mod message;
pub mod mock;
pub mod openai;
pub mod traits;

pub use embedding::{create_embedder, EmbeddingClient};
pub use message::{Message, Role};
pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use openai::{GenerationParams, OpenAiClient, TokenUsage};
pub use traits::{complete_bounded, LlmClient};
