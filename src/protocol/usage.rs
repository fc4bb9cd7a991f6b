//! Per-model token and cost accounting.

use serde::Serialize;

use super::fields::{self, JsonObject};

const INPUT_TOKENS: &[&str] = &["inputTokens", "input_tokens"];
const OUTPUT_TOKENS: &[&str] = &["outputTokens", "output_tokens"];
const CACHE_READ_INPUT_TOKENS: &[&str] = &["cacheReadInputTokens", "cache_read_input_tokens"];
const CACHE_CREATION_INPUT_TOKENS: &[&str] =
    &["cacheCreationInputTokens", "cache_creation_input_tokens"];
const WEB_SEARCH_REQUESTS: &[&str] = &["webSearchRequests", "web_search_requests"];
const COST_USD: &[&str] = &["costUSD", "cost_usd"];
const CONTEXT_WINDOW: &[&str] = &["contextWindow", "context_window"];

/// Usage snapshot for one model.
///
/// Accepts both the camel-case keys of `modelUsage` records and the
/// snake-case keys of raw API usage objects; camel-case wins when both
/// are present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ModelUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_input_tokens: u64,
    pub cache_creation_input_tokens: u64,
    pub web_search_requests: u64,
    pub cost_usd: f64,
    pub context_window: u64,
}

impl ModelUsage {
    /// Build a usage snapshot from a decoded usage object.
    #[must_use]
    pub fn from_json(obj: &JsonObject) -> Self {
        let count = |keys: &[&str]| fields::unsigned(obj, keys).unwrap_or(0);

        Self {
            input_tokens: count(INPUT_TOKENS),
            output_tokens: count(OUTPUT_TOKENS),
            cache_read_input_tokens: count(CACHE_READ_INPUT_TOKENS),
            cache_creation_input_tokens: count(CACHE_CREATION_INPUT_TOKENS),
            web_search_requests: count(WEB_SEARCH_REQUESTS),
            cost_usd: fields::float(obj, COST_USD)
                .filter(|c| c.is_finite())
                .unwrap_or(0.0),
            context_window: count(CONTEXT_WINDOW),
        }
    }

    /// Input tokens including cache reads and cache writes.
    #[must_use]
    pub fn total_input_tokens(&self) -> u64 {
        self.input_tokens
            .saturating_add(self.cache_read_input_tokens)
            .saturating_add(self.cache_creation_input_tokens)
    }

    /// Share of input tokens served from the cache, in `[0.0, 1.0]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.total_input_tokens();
        if total == 0 {
            return 0.0;
        }
        (self.cache_read_input_tokens as f64 / total as f64).clamp(0.0, 1.0)
    }
}
