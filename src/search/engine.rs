//! Web 搜索：DuckDuckGo HTML 端点 + 并发抓取结果页
//!
//! GET 请求带超时与浏览器 User-Agent；结果页经 html2text 提取可读文本后分块。
//! 抓取多个结果页为并发 fan-out / fan-in，随后回到顺序流水线。

use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use html2text::from_read;
use regex::Regex;
use reqwest::Client;

use crate::config::SearchSection;
use crate::core::AgentError;
use crate::search::{BotwallDetector, Chunker, SearchHit, SearchProvider};

const SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// 简易去除 HTML 标签（html2text 失败时的回退）
fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    let mut prev_whitespace = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => {
                let is_whitespace = c.is_whitespace();
                if is_whitespace && prev_whitespace {
                    continue;
                }
                prev_whitespace = is_whitespace;
                out.push(if is_whitespace { ' ' } else { c });
            }
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ").trim().to_string()
}

/// 判断内容是否像 HTML（需提取可读文本）
fn looks_like_html(s: &str) -> bool {
    let s = s.trim_start();
    s.starts_with("<!")
        || s.starts_with("<html")
        || s.starts_with("<HTML")
        || (s.len() > 20
            && s.contains('<')
            && (s.contains("</") || s.contains("<meta") || s.contains("<head") || s.contains("<title")))
}

/// 百分号解码（用于还原 DuckDuckGo 跳转链接中的 uddg 参数）
///
/// 逐字节解码：href 来自页面原文，% 后可能紧跟多字节字符，不能按字符边界切片。
fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hi = (bytes[i + 1] as char).to_digit(16);
            let lo = (bytes[i + 2] as char).to_digit(16);
            if let (Some(hi), Some(lo)) = (hi, lo) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        if bytes[i] == b'+' {
            out.push(b' ');
        } else {
            out.push(bytes[i]);
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// 从结果链接还原真实 URL：跳转链接取 uddg 参数，协议相对链接补 https
fn resolve_result_url(href: &str) -> String {
    if let Some(idx) = href.find("uddg=") {
        let encoded = &href[idx + "uddg=".len()..];
        let encoded = encoded.split('&').next().unwrap_or(encoded);
        return percent_decode(encoded);
    }
    if let Some(rest) = href.strip_prefix("//") {
        return format!("https://{}", rest);
    }
    href.to_string()
}

/// Web 搜索器：查询搜索引擎、抓取 top_k 结果页并分块
pub struct WebSearcher {
    client: Client,
    chunker: Chunker,
    botwall: BotwallDetector,
    max_page_chars: usize,
}

impl WebSearcher {
    /// 构造失败（TLS 后端不可用等）直接上抛：回退到无超时无 UA 的客户端不可接受
    pub fn new(config: &SearchSection, chunker: Chunker) -> Result<Self, AgentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AgentError::Config(format!("search client build: {}", e)))?;
        Ok(Self {
            client,
            chunker,
            botwall: BotwallDetector::from_config(config),
            max_page_chars: config.max_page_chars,
        })
    }

    /// 解析搜索结果页，提取 (title, url) 列表
    fn parse_results(&self, html: &str, top_k: usize) -> Vec<(String, String)> {
        // class="result__a" 是 DDG HTML 版结果标题链接的固定标记
        let link_re =
            Regex::new(r#"(?s)<a[^>]*class="result__a"[^>]*href="([^"]+)"[^>]*>(.*?)</a>"#)
                .expect("static regex");
        link_re
            .captures_iter(html)
            .take(top_k)
            .map(|cap| {
                let url = resolve_result_url(&cap[1]);
                let title = strip_html_tags(&cap[2]);
                (title, url)
            })
            .collect()
    }

    /// 抓取单个结果页：提取可读文本、识别拦截页、截断并分块
    async fn fetch_page(&self, title: &str, url: &str) -> SearchHit {
        let body = match self.client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "failed to read page body");
                    return SearchHit {
                        title: title.to_string(),
                        url: url.to_string(),
                        chunks: vec![],
                        blocked: false,
                    };
                }
            },
            Ok(resp) => {
                tracing::warn!(url = %url, status = %resp.status(), "non-success page fetch");
                return SearchHit {
                    title: title.to_string(),
                    url: url.to_string(),
                    chunks: vec![],
                    blocked: false,
                };
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "page fetch failed");
                return SearchHit {
                    title: title.to_string(),
                    url: url.to_string(),
                    chunks: vec![],
                    blocked: false,
                };
            }
        };

        let body = body.strip_prefix('\u{FEFF}').unwrap_or(&body);
        let text = if looks_like_html(body) {
            match from_read(body.as_bytes(), 120) {
                Ok(t) if !t.trim().is_empty() => t,
                _ => strip_html_tags(body),
            }
        } else {
            body.to_string()
        };

        if self.botwall.is_challenge(&text) {
            tracing::warn!(url = %url, "bot challenge page detected");
            return SearchHit {
                title: title.to_string(),
                url: url.to_string(),
                chunks: vec![],
                blocked: true,
            };
        }

        let text: String = text.chars().take(self.max_page_chars).collect();
        let chunks = self.chunker.chunk(&text).await;
        SearchHit {
            title: title.to_string(),
            url: url.to_string(),
            chunks,
            blocked: false,
        }
    }
}

#[async_trait]
impl SearchProvider for WebSearcher {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>, String> {
        tracing::info!(query = %query, top_k, "web search");
        let resp = self
            .client
            .get(SEARCH_ENDPOINT)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| format!("search request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("search engine returned HTTP {}", resp.status()));
        }
        let html = resp
            .text()
            .await
            .map_err(|e| format!("read search response: {}", e))?;

        let results = self.parse_results(&html, top_k);
        if results.is_empty() {
            return Ok(vec![]);
        }

        // 并发抓取各结果页，完成后合并
        let fetches = results
            .iter()
            .map(|(title, url)| self.fetch_page(title, url));
        Ok(join_all(fetches).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_html_tags() {
        assert_eq!(strip_html_tags("<b>Paris</b> is  nice"), "Paris is nice");
    }

    #[test]
    fn test_resolve_uddg_redirect() {
        let href = "//duckduckgo.com/l/?uddg=https%3A%2F%2Fen.wikipedia.org%2Fwiki%2FParis&rut=abc";
        assert_eq!(resolve_result_url(href), "https://en.wikipedia.org/wiki/Paris");
    }

    #[test]
    fn test_resolve_uddg_with_multibyte_href() {
        // % 后紧跟单个十六进制位再接多字节字符：逐字节解码，不 panic
        let href = "//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2F%aé&rut=1";
        let url = resolve_result_url(href);
        assert!(url.starts_with("https://example.com/"));
        assert!(url.contains("%aé"));
    }

    #[test]
    fn test_percent_decode_keeps_invalid_escapes() {
        assert_eq!(percent_decode("a%zzb"), "a%zzb");
        assert_eq!(percent_decode("caf%C3%A9"), "café");
    }

    #[test]
    fn test_resolve_plain_url() {
        assert_eq!(
            resolve_result_url("https://example.com/a"),
            "https://example.com/a"
        );
        assert_eq!(
            resolve_result_url("//example.com/a"),
            "https://example.com/a"
        );
    }

    #[test]
    fn test_new_with_default_config() {
        let chunker = Chunker::new(None, &crate::config::ChunkingSection::default());
        assert!(WebSearcher::new(&crate::config::SearchSection::default(), chunker).is_ok());
    }

    #[test]
    fn test_parse_results() {
        let chunker = Chunker::new(None, &crate::config::ChunkingSection::default());
        let searcher = WebSearcher::new(&crate::config::SearchSection::default(), chunker).unwrap();
        let html = r#"
            <a rel="nofollow" class="result__a" href="https://a.example/1">First <b>hit</b></a>
            <a rel="nofollow" class="result__a" href="https://a.example/2">Second hit</a>
        "#;
        let results = searcher.parse_results(html, 5);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0], ("First hit".to_string(), "https://a.example/1".to_string()));
    }
}
