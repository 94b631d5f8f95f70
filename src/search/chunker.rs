//! 文本分块：语义分组优先，段落切分兜底
//!
//! 有嵌入客户端时：句子切分 -> 逐句嵌入 -> 相邻句余弦相似度 >= 阈值则归入同一块；
//! 无嵌入客户端（或嵌入失败）时：按空行切段，超过 max_chunk_chars 再硬切。

use std::sync::Arc;

use crate::config::ChunkingSection;
use crate::llm::EmbeddingClient;

pub struct Chunker {
    embedder: Option<Arc<EmbeddingClient>>,
    similarity_threshold: f32,
    max_chunk_chars: usize,
}

/// 余弦相似度；任一向量为零向量时返回 0
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// 按句末标点切句，保留标点；无标点的残余尾部单独成句
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        current.push(c);
        if matches!(c, '.' | '!' | '?' | '。' | '！' | '？' | '\n') {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        }
    }
    let tail = current.trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

impl Chunker {
    pub fn new(embedder: Option<Arc<EmbeddingClient>>, config: &ChunkingSection) -> Self {
        Self {
            embedder,
            similarity_threshold: config.similarity_threshold,
            max_chunk_chars: config.max_chunk_chars,
        }
    }

    /// 将页面文本切为若干块；空输入返回空列表
    pub async fn chunk(&self, text: &str) -> Vec<String> {
        let text = text.trim();
        if text.is_empty() {
            return vec![];
        }

        if let Some(embedder) = &self.embedder {
            let sentences = split_sentences(text);
            if sentences.len() > 1 {
                match embedder.embed(&sentences).await {
                    Ok(embeddings) if embeddings.len() == sentences.len() => {
                        return self.group_by_similarity(&sentences, &embeddings);
                    }
                    Ok(_) => {
                        tracing::warn!("embedding count mismatch, falling back to paragraphs");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "embedding failed, falling back to paragraphs");
                    }
                }
            }
        }

        self.paragraph_chunks(text)
    }

    /// 相邻句相似度 >= 阈值则并入当前块
    fn group_by_similarity(&self, sentences: &[String], embeddings: &[Vec<f32>]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = vec![sentences[0].clone()];
        for i in 1..sentences.len() {
            let similarity = cosine_similarity(&embeddings[i - 1], &embeddings[i]);
            if similarity >= self.similarity_threshold {
                current.push(sentences[i].clone());
            } else {
                chunks.push(current.join(" "));
                current = vec![sentences[i].clone()];
            }
        }
        if !current.is_empty() {
            chunks.push(current.join(" "));
        }
        chunks
    }

    /// 空行切段；单段超长时按 max_chunk_chars 硬切
    fn paragraph_chunks(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        for para in text.split("\n\n") {
            let para = para.trim();
            if para.is_empty() {
                continue;
            }
            if para.chars().count() <= self.max_chunk_chars {
                chunks.push(para.to_string());
            } else {
                let chars: Vec<char> = para.chars().collect();
                for piece in chars.chunks(self.max_chunk_chars) {
                    chunks.push(piece.iter().collect::<String>().trim().to_string());
                }
            }
        }
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChunkingSection;

    fn chunker() -> Chunker {
        Chunker::new(None, &ChunkingSection::default())
    }

    #[test]
    fn test_cosine() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_split_sentences() {
        let s = split_sentences("One. Two! Three?");
        assert_eq!(s, vec!["One.", "Two!", "Three?"]);
    }

    #[tokio::test]
    async fn test_paragraph_fallback() {
        let chunks = chunker().chunk("First paragraph.\n\nSecond paragraph.").await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "First paragraph.");
    }

    #[tokio::test]
    async fn test_empty_input() {
        assert!(chunker().chunk("   ").await.is_empty());
    }

    #[tokio::test]
    async fn test_oversize_paragraph_is_split() {
        let long = "x".repeat(3000);
        let chunks = chunker().chunk(&long).await;
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 1200));
    }
}
