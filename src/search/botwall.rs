//! 反爬拦截页识别
//!
//! 词法启发式：统计页面原文中命中的特征短语个数，达到阈值即判定为拦截页。
//! 短语列表与阈值均来自配置，可按目标站点调整。

use crate::config::SearchSection;

/// 拦截页识别器：特征短语 + 命中数阈值
#[derive(Debug, Clone)]
pub struct BotwallDetector {
    patterns: Vec<String>,
    threshold: usize,
}

impl BotwallDetector {
    pub fn new(patterns: Vec<String>, threshold: usize) -> Self {
        let patterns = patterns.into_iter().map(|p| p.to_lowercase()).collect();
        Self {
            patterns,
            threshold,
        }
    }

    pub fn from_config(config: &SearchSection) -> Self {
        Self::new(
            config.challenge_patterns.clone(),
            config.challenge_threshold,
        )
    }

    /// 判断原文是否为拦截页：命中的不同特征短语数 >= 阈值
    pub fn is_challenge(&self, raw_text: &str) -> bool {
        let text = raw_text.to_lowercase();
        let hits = self
            .patterns
            .iter()
            .filter(|p| text.contains(p.as_str()))
            .count();
        hits >= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> BotwallDetector {
        BotwallDetector::new(
            vec![
                "verify you are human".into(),
                "checking your browser".into(),
                "unusual traffic".into(),
                "captcha".into(),
            ],
            3,
        )
    }

    #[test]
    fn test_three_phrases_is_challenge() {
        let page = "Verify you are human. Checking your browser before accessing. \
                    We detected unusual traffic from your network.";
        assert!(detector().is_challenge(page));
    }

    #[test]
    fn test_two_phrases_is_not_challenge() {
        let page = "Please complete the CAPTCHA. Checking your browser...";
        assert!(!detector().is_challenge(page));
    }

    #[test]
    fn test_normal_page() {
        let page = "Paris is the capital and largest city of France.";
        assert!(!detector().is_challenge(page));
    }
}
