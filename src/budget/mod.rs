//! Token budget estimation and threshold classification.
//!
//! Everything here is a pure function of (current tokens, budget,
//! configured thresholds); the manager holds no hidden state beyond its
//! configuration and an optional exact counter.

use serde::Serialize;

use crate::config::TokenBudgetConfig;
use crate::error::CoreResult;

/// Caller-supplied exact token counter (e.g. a model-specific
/// tokenizer). When present it is always preferred over the
/// character-ratio estimate.
pub trait TokenCounter: Send + Sync {
    /// Count the tokens in a piece of text.
    fn count(&self, text: &str) -> usize;
}

impl<F> TokenCounter for F
where
    F: Fn(&str) -> usize + Send + Sync,
{
    fn count(&self, text: &str) -> usize {
        self(text)
    }
}

/// Band a token usage falls into relative to its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UsageBand {
    /// Comfortably within budget.
    Normal,
    /// At or above the warning fraction (~80%).
    Warning,
    /// At or above the compression-trigger fraction (~90%);
    /// summarization must begin.
    Compression,
    /// At or above the emergency fraction (~95%).
    Emergency,
}

/// Estimates serialized token cost and classifies usage against a
/// budget.
pub struct TokenBudgetManager {
    config: TokenBudgetConfig,
    counter: Option<Box<dyn TokenCounter>>,
}

impl std::fmt::Debug for TokenBudgetManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBudgetManager")
            .field("config", &self.config)
            .field("exact_counter", &self.counter.is_some())
            .finish()
    }
}

impl TokenBudgetManager {
    /// Build a manager using the ratio estimator only.
    pub fn new(config: TokenBudgetConfig) -> Self {
        Self {
            config,
            counter: None,
        }
    }

    /// Install an exact counter; it takes precedence over the ratio
    /// estimate for all text.
    pub fn with_counter(mut self, counter: Box<dyn TokenCounter>) -> Self {
        self.counter = Some(counter);
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &TokenBudgetConfig {
        &self.config
    }

    /// Estimate the token cost of a string.
    ///
    /// Uses the exact counter when one was supplied, otherwise length
    /// divided by the configured characters-per-token constant, rounded
    /// up so no non-empty text estimates to zero.
    pub fn estimate_text(&self, text: &str) -> usize {
        if let Some(counter) = &self.counter {
            return counter.count(text);
        }
        let chars = text.chars().count();
        let per_token = self.config.chars_per_token.max(1);
        (chars + per_token - 1) / per_token
    }

    /// Estimate the token cost of any serializable payload via its JSON
    /// form.
    pub fn estimate_value<T: Serialize>(&self, value: &T) -> CoreResult<usize> {
        let body = serde_json::to_string(value)?;
        Ok(self.estimate_text(&body))
    }

    /// Estimate the combined cost of a slice of serializable records.
    pub fn estimate_slice<T: Serialize>(&self, values: &[T]) -> CoreResult<usize> {
        let mut total = 0;
        for value in values {
            total += self.estimate_value(value)?;
        }
        Ok(total)
    }

    /// Classify a usage against a budget.
    pub fn usage_band(&self, current_tokens: usize, max_tokens: usize) -> UsageBand {
        if max_tokens == 0 {
            return UsageBand::Emergency;
        }
        let fraction = current_tokens as f64 / max_tokens as f64;
        if fraction >= self.config.emergency_threshold {
            UsageBand::Emergency
        } else if fraction >= self.config.compression_threshold {
            UsageBand::Compression
        } else if fraction >= self.config.warning_threshold {
            UsageBand::Warning
        } else {
            UsageBand::Normal
        }
    }

    /// True once usage is at or above the compression trigger.
    pub fn should_summarize_context(&self, current_tokens: usize, max_tokens: usize) -> bool {
        self.usage_band(current_tokens, max_tokens) >= UsageBand::Compression
    }

    /// True once usage is at or above the emergency threshold.
    pub fn is_critical(&self, current_tokens: usize, max_tokens: usize) -> bool {
        self.usage_band(current_tokens, max_tokens) >= UsageBand::Emergency
    }

    /// Tokens remaining before usage hits the compression trigger.
    pub fn available_before_compression(&self, current_tokens: usize, max_tokens: usize) -> usize {
        let trigger = (max_tokens as f64 * self.config.compression_threshold) as usize;
        trigger.saturating_sub(current_tokens)
    }
}

impl Default for TokenBudgetManager {
    fn default() -> Self {
        Self::new(TokenBudgetConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ratio_estimate_rounds_up() {
        let manager = TokenBudgetManager::default();
        assert_eq!(manager.estimate_text(""), 0);
        assert_eq!(manager.estimate_text("ab"), 1);
        assert_eq!(manager.estimate_text("abcd"), 1);
        assert_eq!(manager.estimate_text("abcde"), 2);
    }

    #[test]
    fn test_exact_counter_preferred() {
        let manager =
            TokenBudgetManager::default().with_counter(Box::new(|text: &str| text.len() * 10));
        assert_eq!(manager.estimate_text("ab"), 20);
    }

    #[test]
    fn test_estimate_monotonic_over_subsets() {
        let manager = TokenBudgetManager::default();
        let full = vec![json!({"id": "a", "ctx": "x".repeat(50)}), json!({"id": "b"})];
        let subset = &full[..1];

        let full_cost = manager.estimate_slice(&full).unwrap();
        let subset_cost = manager.estimate_slice(subset).unwrap();
        assert!(full_cost >= subset_cost);
    }

    #[test]
    fn test_bands() {
        let manager = TokenBudgetManager::default();
        assert_eq!(manager.usage_band(100, 1000), UsageBand::Normal);
        assert_eq!(manager.usage_band(800, 1000), UsageBand::Warning);
        assert_eq!(manager.usage_band(900, 1000), UsageBand::Compression);
        assert_eq!(manager.usage_band(950, 1000), UsageBand::Emergency);
        assert_eq!(manager.usage_band(10, 0), UsageBand::Emergency);
    }

    #[test]
    fn test_should_summarize_iff_at_trigger() {
        let manager = TokenBudgetManager::default();
        assert!(!manager.should_summarize_context(899, 1000));
        assert!(manager.should_summarize_context(900, 1000));
        assert!(manager.should_summarize_context(999, 1000));
    }

    #[test]
    fn test_is_critical() {
        let manager = TokenBudgetManager::default();
        assert!(!manager.is_critical(949, 1000));
        assert!(manager.is_critical(950, 1000));
    }

    #[test]
    fn test_available_before_compression() {
        let manager = TokenBudgetManager::default();
        assert_eq!(manager.available_before_compression(0, 1000), 900);
        assert_eq!(manager.available_before_compression(850, 1000), 50);
        assert_eq!(manager.available_before_compression(950, 1000), 0);
    }
}
