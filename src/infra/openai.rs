use async_trait::async_trait;
use reqwest::{Client, header::CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::infra::llm::{classify_status, classify_transport};
use crate::services::LanguageModelService;

const PROVIDER: &str = "OpenAI-compatible endpoint";
const TEMPERATURE: f32 = 0.2;

/// Chat-completions client for OpenAI and the local servers that mimic it.
pub struct OpenAiCompatibleClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    key_required: bool,
}

impl OpenAiCompatibleClient {
    pub fn new(http: Client, base_url: String, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            key_required: false,
        }
    }

    pub fn requiring_key(mut self, required: bool) -> Self {
        self.key_required = required;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LanguageModelService for OpenAiCompatibleClient {
    async fn generate_summary(&self, model: &str, prompt: &str) -> AppResult<String> {
        if self.key_required && self.api_key.is_none() {
            return Err(AppError::Configuration(
                "API key not configured for the selected provider".to_string(),
            ));
        }

        let mut request = self
            .http
            .post(self.endpoint())
            .header(CONTENT_TYPE, "application/json")
            .json(&ChatRequest::new(model, prompt));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| classify_transport(PROVIDER, err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unable to read response>".to_string());
            return Err(classify_status(PROVIDER, status, &body));
        }

        let payload: ChatResponse = response.json().await.map_err(|err| {
            AppError::FatalApi(format!("failed to parse chat completion response: {err}"))
        })?;

        payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| AppError::FatalApi("chat completion returned no content".to_string()))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

impl<'a> ChatRequest<'a> {
    fn new(model: &'a str, prompt: &'a str) -> Self {
        Self {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: TEMPERATURE,
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
