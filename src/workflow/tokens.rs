//! Character-based token estimation.

use crate::config::{LlmProvider, TokenBudgetConfig};
use crate::services::TokenEstimator;

pub const DEFAULT_CONTEXT_WINDOW: usize = 8_192;

/// Context windows by model-name prefix. More specific prefixes come first.
const CONTEXT_WINDOWS: &[(&str, usize)] = &[
    ("gpt-4o", 128_000),
    ("gpt-4.1", 1_000_000),
    ("gpt-4-turbo", 128_000),
    ("gpt-4-32k", 32_768),
    ("gpt-4", 8_192),
    ("gpt-3.5-turbo", 16_385),
    ("o1", 128_000),
    ("o3", 200_000),
    ("o4", 200_000),
    ("claude", 200_000),
    ("gemini-1.5", 1_000_000),
    ("gemini-2", 1_000_000),
    ("gemini", 32_768),
    ("llama3", 8_192),
    ("llama2", 4_096),
    ("mistral", 32_768),
    ("qwen", 32_768),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    OpenAi,
    Anthropic,
    Gemini,
    Local,
}

impl ModelFamily {
    pub fn detect(provider: &LlmProvider, model: &str) -> Self {
        let model = model.to_lowercase();
        if provider.is_local() {
            ModelFamily::Local
        } else if model.starts_with("claude") {
            ModelFamily::Anthropic
        } else if model.starts_with("gemini") {
            ModelFamily::Gemini
        } else if model.starts_with("gpt") || model.starts_with('o') {
            ModelFamily::OpenAi
        } else {
            match provider {
                LlmProvider::OpenAi => ModelFamily::OpenAi,
                LlmProvider::Anthropic => ModelFamily::Anthropic,
                LlmProvider::Gemini => ModelFamily::Gemini,
                _ => ModelFamily::Local,
            }
        }
    }

    /// Local tokenizers tend to be less efficient, so count them more
    /// conservatively.
    pub fn chars_per_token(&self) -> usize {
        match self {
            ModelFamily::OpenAi | ModelFamily::Anthropic | ModelFamily::Gemini => 4,
            ModelFamily::Local => 3,
        }
    }
}

pub fn context_window_for(model: &str) -> usize {
    let model = model.to_lowercase();
    CONTEXT_WINDOWS
        .iter()
        .find(|(prefix, _)| model.starts_with(prefix))
        .map(|(_, window)| *window)
        .unwrap_or(DEFAULT_CONTEXT_WINDOW)
}

#[derive(Debug, Clone)]
pub struct HeuristicTokenEstimator {
    chars_per_token: usize,
    context_window: usize,
    safety_margin_percent: u8,
    reserved_overhead: usize,
}

impl HeuristicTokenEstimator {
    pub fn new(family: ModelFamily, context_window: usize, budget: &TokenBudgetConfig) -> Self {
        Self {
            chars_per_token: family.chars_per_token(),
            context_window,
            safety_margin_percent: budget.safety_margin_percent,
            reserved_overhead: budget.reserved_overhead,
        }
    }

    pub fn for_model(provider: &LlmProvider, model: &str, budget: &TokenBudgetConfig) -> Self {
        let window = budget
            .context_window
            .unwrap_or_else(|| context_window_for(model));
        Self::new(ModelFamily::detect(provider, model), window, budget)
    }

    pub fn context_window(&self) -> usize {
        self.context_window
    }
}

impl TokenEstimator for HeuristicTokenEstimator {
    fn estimate(&self, text: &str) -> usize {
        // Only the char count matters, which keeps the estimate monotonic in length.
        text.chars().count().div_ceil(self.chars_per_token)
    }

    fn effective_limit(&self) -> usize {
        let scaled = self.context_window * usize::from(self.safety_margin_percent) / 100;
        scaled.saturating_sub(self.reserved_overhead).max(1)
    }
}
