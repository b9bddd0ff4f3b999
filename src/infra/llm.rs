use std::sync::Arc;

use reqwest::{Client, StatusCode};

use crate::config::{AppConfig, LlmProvider};
use crate::error::{AppError, AppResult};
use crate::infra::anthropic::AnthropicClient;
use crate::infra::gemini::GeminiClient;
use crate::infra::openai::OpenAiCompatibleClient;
use crate::infra::retry::RetryingModel;
use crate::services::LanguageModelService;

/// Builds the provider client for `config`, wrapped in the retry layer.
pub fn build_language_model(config: &AppConfig) -> AppResult<Arc<dyn LanguageModelService>> {
    let http = Client::builder()
        .timeout(config.request_timeout)
        .build()
        .map_err(|err| AppError::Configuration(format!("failed to build HTTP client: {err}")))?;
    let base_url = config.base_url()?;
    let api_key = config.api_key.clone();

    let retry = config.retry.clone();
    let model: Arc<dyn LanguageModelService> = match &config.llm_provider {
        LlmProvider::Gemini => Arc::new(RetryingModel::new(
            GeminiClient::new(http, base_url, api_key),
            retry,
        )),
        LlmProvider::Anthropic => Arc::new(RetryingModel::new(
            AnthropicClient::new(http, base_url, api_key),
            retry,
        )),
        LlmProvider::OpenAi
        | LlmProvider::Ollama
        | LlmProvider::LmStudio
        | LlmProvider::Custom(_) => Arc::new(RetryingModel::new(
            OpenAiCompatibleClient::new(http, base_url, api_key)
                .requiring_key(config.llm_provider.requires_api_key()),
            retry,
        )),
    };
    Ok(model)
}

/// Maps a non-success HTTP status to the retryable or fatal error class.
pub fn classify_status(provider: &str, status: StatusCode, body: &str) -> AppError {
    let message = format!("{provider} responded with {status}: {}", body.trim());
    match status.as_u16() {
        408 | 429 | 500 | 502 | 503 | 504 | 529 => AppError::TransientApi(message),
        401 | 403 => AppError::FatalApi(format!("authentication failed: {message}")),
        _ => AppError::FatalApi(message),
    }
}

pub fn classify_transport(provider: &str, err: reqwest::Error) -> AppError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        AppError::TransientApi(format!("failed to reach {provider}: {err}"))
    } else {
        AppError::FatalApi(format!("failed to call {provider}: {err}"))
    }
}
