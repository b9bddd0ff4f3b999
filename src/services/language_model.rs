use async_trait::async_trait;

use crate::error::AppResult;

/// Single-shot text generation. Implementations own transport, auth and
/// error classification; callers only pick the model.
#[async_trait]
pub trait LanguageModelService: Send + Sync {
    async fn generate_summary(&self, model: &str, prompt: &str) -> AppResult<String>;
}
