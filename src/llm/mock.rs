//! Mock LLM 客户端（用于测试，无需 API）
//!
//! MockLlmClient 回显最后一条 User 消息；ScriptedLlmClient 按预置脚本逐条返回，
//! 并为每次调用累计固定 token 数，便于验证 token 统计与调用次数。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, Message, Role, TokenUsage};

/// Mock 客户端：回显用户最后一条消息
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::User))
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        Ok(format!("Echo from Mock: {}", last_user))
    }
}

/// 每次脚本化调用计入的 prompt / completion token 数
const SCRIPTED_PROMPT_TOKENS: u64 = 10;
const SCRIPTED_COMPLETION_TOKENS: u64 = 5;

/// 脚本化客户端：按顺序返回预置响应，脚本耗尽时返回错误
pub struct ScriptedLlmClient {
    responses: Mutex<VecDeque<String>>,
    usage: TokenUsage,
}

impl ScriptedLlmClient {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(String::from).collect()),
            usage: TokenUsage::new(),
        }
    }

    /// 剩余未消费的脚本条数
    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete(&self, _messages: &[Message]) -> Result<String, String> {
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(response) => {
                self.usage
                    .add(SCRIPTED_PROMPT_TOKENS, SCRIPTED_COMPLETION_TOKENS);
                Ok(response)
            }
            None => Err("scripted responses exhausted".to_string()),
        }
    }
}
