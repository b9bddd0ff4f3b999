//! Picks the model used for high-volume chunk calls.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, error, warn};

use crate::config::{AppConfig, LlmProvider};

const MIN_MODEL_NAME_LEN: usize = 3;
const MAX_MODEL_NAME_LEN: usize = 100;

/// Cheaper siblings per provider. Exact model names only.
const DOWNGRADES: &[(&str, &[(&str, &str)])] = &[
    (
        "openai",
        &[
            ("gpt-4", "gpt-4o-mini"),
            ("gpt-4-turbo", "gpt-4o-mini"),
            ("gpt-4o", "gpt-4o-mini"),
            ("gpt-4.1", "gpt-4.1-mini"),
            ("o1", "o1-mini"),
            ("o3", "o4-mini"),
        ],
    ),
    (
        "anthropic",
        &[
            ("claude-3-opus-20240229", "claude-3-haiku-20240307"),
            ("claude-3-5-sonnet-20241022", "claude-3-5-haiku-20241022"),
            ("claude-3-7-sonnet-20250219", "claude-3-5-haiku-20241022"),
            ("claude-sonnet-4-20250514", "claude-3-5-haiku-20241022"),
            ("claude-opus-4-20250514", "claude-3-5-haiku-20241022"),
        ],
    ),
    (
        "gemini",
        &[
            ("gemini-1.5-pro", "gemini-1.5-flash"),
            ("gemini-2.5-pro", "gemini-2.5-flash"),
        ],
    ),
];

static MODEL_CHARSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("model charset pattern is valid"));
static OPENAI_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(gpt-|chatgpt-|o\d)").expect("openai name pattern is valid"));
static ANTHROPIC_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^claude-").expect("anthropic name pattern is valid"));
static GEMINI_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^gemini-").expect("gemini name pattern is valid"));

pub fn smart_downgrade(model: &str, provider: &LlmProvider) -> String {
    if provider.is_local() {
        return model.to_string();
    }

    DOWNGRADES
        .iter()
        .find(|(name, _)| *name == provider.as_str())
        .and_then(|(_, table)| table.iter().find(|(from, _)| *from == model))
        .map(|(_, to)| to.to_string())
        .unwrap_or_else(|| model.to_string())
}

pub fn select_map_model(config: &AppConfig) -> String {
    if let Some(model) = config
        .map_model
        .as_deref()
        .map(str::trim)
        .filter(|model| !model.is_empty())
    {
        debug!(model, "using configured map model");
        return model.to_string();
    }

    let selected = smart_downgrade(&config.model, &config.llm_provider);
    if selected != config.model {
        debug!(
            primary = %config.model,
            map_model = %selected,
            provider = config.llm_provider.as_str(),
            "downgraded map model"
        );
    }
    selected
}

pub fn validate_model(model: &str, provider: Option<&LlmProvider>) -> bool {
    let len = model.chars().count();
    if !(MIN_MODEL_NAME_LEN..=MAX_MODEL_NAME_LEN).contains(&len) {
        return false;
    }
    if !MODEL_CHARSET.is_match(model) {
        return false;
    }

    match provider {
        Some(LlmProvider::OpenAi) => OPENAI_NAME.is_match(model),
        Some(LlmProvider::Anthropic) => ANTHROPIC_NAME.is_match(model),
        Some(LlmProvider::Gemini) => GEMINI_NAME.is_match(model),
        Some(LlmProvider::Ollama | LlmProvider::LmStudio | LlmProvider::Custom(_)) | None => true,
    }
}

/// Never fails: an invalid map model falls back to the primary model, and an
/// invalid primary is still returned after logging.
pub fn select_and_validate_map_model(config: &AppConfig) -> String {
    let provider = &config.llm_provider;
    let selected = select_map_model(config);
    if validate_model(&selected, Some(provider)) {
        return selected;
    }

    warn!(
        model = %selected,
        provider = provider.as_str(),
        "map model failed validation, falling back to primary model"
    );
    if !validate_model(&config.model, Some(provider)) {
        error!(
            model = %config.model,
            provider = provider.as_str(),
            "primary model failed validation as well"
        );
    }
    config.model.clone()
}
