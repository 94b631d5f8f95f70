//! 子代理公共类型
//!
//! 所有检索来源在工具操作边界被归一化为同一个 ContextItem 形状，
//! 下游（重排、清洗）不再区分来源。

use std::collections::HashMap;
use std::str::FromStr;

use serde::Deserialize;

use crate::core::AgentError;
use crate::search::SearchHit;

/// 检索工具标签；每次尝试决策一次，不跨尝试保留
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolLabel {
    VectorSearch,
    WebSearch,
}

impl ToolLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolLabel::VectorSearch => "vector_search",
            ToolLabel::WebSearch => "web_search",
        }
    }
}

impl FromStr for ToolLabel {
    type Err = AgentError;

    /// 仅接受归一化后的两个合法标签；其余一律报错，不做猜测兜底
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vector_search" => Ok(ToolLabel::VectorSearch),
            "web_search" => Ok(ToolLabel::WebSearch),
            other => Err(AgentError::UnsupportedTool(other.to_string())),
        }
    }
}

/// 统一的检索结果：标题、URL、正文分块、可选重排分数
#[derive(Debug, Clone)]
pub struct ContextItem {
    pub title: String,
    pub url: String,
    pub chunks: Vec<String>,
    pub relevance_score: Option<f32>,
}

impl From<SearchHit> for ContextItem {
    fn from(hit: SearchHit) -> Self {
        Self {
            title: hit.title,
            url: hit.url,
            chunks: hit.chunks,
            relevance_score: None,
        }
    }
}

/// 将若干 context 序列化为清洗阶段的输入文本
pub fn render_contexts(items: &[ContextItem]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            format!(
                "[Source {}] {} ({})\n{}",
                i + 1,
                if item.title.is_empty() { "Untitled" } else { &item.title },
                if item.url.is_empty() { "no url" } else { &item.url },
                item.chunks.join("\n")
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 验证结论：是否充分、理由、缺失方面、改写后的查询
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationVerdict {
    pub is_sufficient: bool,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub missing_aspects: Vec<String>,
    #[serde(default)]
    pub reformulated_query: String,
}

/// 一次检索步骤的终态输出；元数据携带 token 统计、重试次数、验证历史等
#[derive(Debug, Clone)]
pub struct SubAgentResult {
    pub info: String,
    pub metadata: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_label_parse() {
        assert_eq!("web_search".parse::<ToolLabel>().unwrap(), ToolLabel::WebSearch);
        assert_eq!(
            "vector_search".parse::<ToolLabel>().unwrap(),
            ToolLabel::VectorSearch
        );
        assert!(matches!(
            "vector_db".parse::<ToolLabel>(),
            Err(AgentError::UnsupportedTool(_))
        ));
    }

    #[test]
    fn test_render_contexts() {
        let items = vec![ContextItem {
            title: "Paris".into(),
            url: "https://en.wikipedia.org/wiki/Paris".into(),
            chunks: vec!["Paris is the capital of France.".into()],
            relevance_score: None,
        }];
        let text = render_contexts(&items);
        assert!(text.starts_with("[Source 1] Paris"));
        assert!(text.contains("capital of France"));
    }

    #[test]
    fn test_verdict_defaults() {
        let v: ValidationVerdict = serde_json::from_str(r#"{"is_sufficient": true}"#).unwrap();
        assert!(v.is_sufficient);
        assert!(v.missing_aspects.is_empty());
        assert!(v.reformulated_query.is_empty());
    }
}
