use async_trait::async_trait;
use reqwest::{Client, header::CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::infra::llm::{classify_status, classify_transport};
use crate::services::LanguageModelService;

const PROVIDER: &str = "Gemini";

pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl GeminiClient {
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
            .ok_or_else(|| AppError::Configuration("Gemini API key not configured".to_string()))
    }

    fn endpoint(base_url: &str, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            base_url.trim_end_matches('/'),
            model
        )
    }
}

#[async_trait]
impl LanguageModelService for GeminiClient {
    async fn generate_summary(&self, model: &str, prompt: &str) -> AppResult<String> {
        let api_key = self.api_key()?;

        let response = self
            .http
            .post(Self::endpoint(&self.base_url, model))
            .query(&[("key", api_key)])
            .header(CONTENT_TYPE, "application/json")
            .json(&GenerateContentRequest::new(prompt))
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

        let payload: GenerateContentResponse = response.json().await.map_err(|err| {
            AppError::FatalApi(format!("failed to parse Gemini response: {err}"))
        })?;
        payload.text()
    }
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

impl GenerateContentRequest {
    fn new(prompt: &str) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GenerateContentResponse {
    fn text(self) -> AppResult<String> {
        let text = self
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(AppError::FatalApi(
                "Gemini returned no text candidates".to_string(),
            ));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn builds_generate_content_endpoint() {
        assert_eq!(
            GeminiClient::endpoint("https://example.test/v1beta/", "gemini-2.0-flash"),
            "https://example.test/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn serializes_prompt_as_user_content() {
        let body = serde_json::to_value(GenerateContentRequest::new("hello")).unwrap();
        assert_eq!(
            body,
            json!({"contents": [{"role": "user", "parts": [{"text": "hello"}]}]})
        );
    }

    #[tokio::test]
    async fn returns_candidate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:generateContent"))
            .and(query_param("key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "feat: "}, {"text": "add cli"}]}}]
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::new(Client::new(), server.uri(), Some("secret".to_string()));
        let text = client
            .generate_summary("gemini-2.0-flash", "prompt")
            .await
            .unwrap();
        assert_eq!(text, "feat: add cli");
    }

    #[tokio::test]
    async fn rate_limit_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let client = GeminiClient::new(Client::new(), server.uri(), Some("secret".to_string()));
        let err = client.generate_summary("gemini-pro", "p").await.unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("slow down"));
    }

    #[tokio::test]
    async fn empty_candidates_are_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
            .mount(&server)
            .await;

        let client = GeminiClient::new(Client::new(), server.uri(), Some("secret".to_string()));
        assert!(matches!(
            client.generate_summary("gemini-pro", "p").await,
            Err(AppError::FatalApi(_))
        ));
    }

    #[tokio::test]
    async fn missing_key_fails_before_sending() {
        let client = GeminiClient::new(Client::new(), "http://127.0.0.1:9".to_string(), None);
        assert!(matches!(
            client.generate_summary("gemini-pro", "p").await,
            Err(AppError::Configuration(_))
        ));
    }
}
