use async_trait::async_trait;
use reqwest::{Client, header::CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::infra::llm::{classify_status, classify_transport};
use crate::services::LanguageModelService;

const PROVIDER: &str = "Anthropic";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

pub struct AnthropicClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl AnthropicClient {
    pub fn new(http: Client, base_url: String, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url,
            api_key,
        }
    }

    fn api_key(&self) -> AppResult<&str> {
        self.api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                AppError::Configuration("Anthropic API key not configured".to_string())
            })
    }
}

#[async_trait]
impl LanguageModelService for AnthropicClient {
    async fn generate_summary(&self, model: &str, prompt: &str) -> AppResult<String> {
        let api_key = self.api_key()?;

        let response = self
            .http
            .post(format!("{}/messages", self.base_url.trim_end_matches('/')))
            .header(CONTENT_TYPE, "application/json")
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .json(&MessagesRequest {
                model,
                max_tokens: MAX_TOKENS,
                messages: vec![Message {
                    role: "user",
                    content: prompt,
                }],
            })
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

        let payload: MessagesResponse = response.json().await.map_err(|err| {
            AppError::FatalApi(format!("failed to parse Anthropic response: {err}"))
        })?;

        let text: String = payload
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();
        if text.trim().is_empty() {
            return Err(AppError::FatalApi(
                "Anthropic returned no text content".to_string(),
            ));
        }
        Ok(text)
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}
