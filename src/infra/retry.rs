use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::config::RetryConfig;
use crate::error::AppResult;
use crate::services::LanguageModelService;

/// Retries transient provider failures with exponential back-off.
pub struct RetryingModel<M> {
    inner: M,
    config: RetryConfig,
}

impl<M: LanguageModelService> RetryingModel<M> {
    pub fn new(inner: M, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.config.base_delay.saturating_mul(factor)
    }
}

#[async_trait]
impl<M: LanguageModelService> LanguageModelService for RetryingModel<M> {
    async fn generate_summary(&self, model: &str, prompt: &str) -> AppResult<String> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.inner.generate_summary(model, prompt).await {
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        model,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient language model failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
