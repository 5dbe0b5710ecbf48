//! Gemini `generateContent` client.

use crate::config::ModelConfig;
use crate::domain::model::ImagePayload;
use crate::domain::ports::ModelClient;
use crate::utils::error::{RelayError, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const ERROR_BODY_LIMIT: usize = 200;

pub struct GeminiClient {
    client: Client,
    endpoint: String,
    api_key: String,
    retry_attempts: u32,
    retry_delay: Duration,
}

#[derive(Debug, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(RelayError::MissingConfigError {
                field: "model.api_key".to_string(),
            });
        }

        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            retry_attempts: config.retry_attempts,
            retry_delay: config.retry_delay,
        })
    }

    pub fn build_request_body(prompt: &str, image: Option<&ImagePayload>) -> Value {
        let mut parts = vec![json!({ "text": prompt })];
        if let Some(image) = image {
            parts.push(json!({
                "inline_data": {
                    "mime_type": image.mime_type,
                    "data": BASE64.encode(&image.bytes),
                }
            }));
        }

        json!({
            "contents": [{
                "role": "user",
                "parts": parts
            }]
        })
    }

    /// 串接第一個候選結果中所有文字片段
    pub fn extract_text(response: &GeminiResponse) -> Option<String> {
        let content = response.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();

        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    async fn generate(&self, model_id: &str, body: &Value) -> Result<String> {
        let mut attempt = 0;
        loop {
            match self.send_once(model_id, body).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < self.retry_attempts => {
                    attempt += 1;
                    tracing::warn!(
                        "🔁 Transient model API failure ({}), retry {}/{}",
                        e,
                        attempt,
                        self.retry_attempts
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(&self, model_id: &str, body: &Value) -> Result<String> {
        let url = format!("{}/{}:generateContent", self.endpoint, model_id);
        tracing::debug!("Making model API request to: {}", url);

        let api_key = HeaderValue::from_str(&self.api_key).map_err(|e| {
            RelayError::InvalidConfigValueError {
                field: "model.api_key".to_string(),
                value: "<redacted>".to_string(),
                reason: e.to_string(),
            }
        })?;

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header("x-goog-api-key", api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("Model API response status: {}", status);

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            // 截斷錯誤內容，避免把整段上游回應外洩給呼叫端
            let truncated: String = error_body.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(RelayError::ModelStatusError {
                status: status.as_u16(),
                body: truncated,
            });
        }

        let gemini_response: GeminiResponse = response.json().await?;
        Self::extract_text(&gemini_response).ok_or(RelayError::EmptyModelResponse)
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn generate_text(&self, model_id: &str, prompt: &str) -> Result<String> {
        tracing::info!("Gemini text request: model={}, prompt={} chars", model_id, prompt.len());
        let body = Self::build_request_body(prompt, None);
        self.generate(model_id, &body).await
    }

    async fn generate_vision(
        &self,
        model_id: &str,
        prompt: &str,
        image: &ImagePayload,
    ) -> Result<String> {
        tracing::info!(
            "Gemini vision request: model={}, image={} bytes",
            model_id,
            image.bytes.len()
        );
        let body = Self::build_request_body(prompt, Some(image));
        self.generate(model_id, &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    const MODEL: &str = "gemini-2.0-flash-exp";

    fn config_for(server: &MockServer, retry_attempts: u32) -> ModelConfig {
        let mut config = ModelConfig::new("test-key");
        config.endpoint = server.url("/v1beta/models");
        config.retry_attempts = retry_attempts;
        config.retry_delay = Duration::from_millis(10);
        config
    }

    fn text_reply(text: &str) -> Value {
        json!({
            "candidates": [{
                "content": { "parts": [{ "text": text }], "role": "model" }
            }]
        })
    }

    #[test]
    fn test_build_request_body_text_only() {
        let body = GeminiClient::build_request_body("Hello", None);
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Hello");
        assert_eq!(body["contents"][0]["parts"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_build_request_body_with_image() {
        let image = ImagePayload {
            mime_type: "image/png".to_string(),
            bytes: b"abc".to_vec(),
        };
        let body = GeminiClient::build_request_body("Read this", Some(&image));
        let inline = &body["contents"][0]["parts"][1]["inline_data"];
        assert_eq!(inline["mime_type"], "image/png");
        assert_eq!(inline["data"], "YWJj");
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "{\"a\":" }, { "text": "1}" }] }
            }]
        }))
        .unwrap();
        assert_eq!(GeminiClient::extract_text(&response).as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn test_extract_text_missing() {
        let empty: GeminiResponse = serde_json::from_value(json!({ "candidates": [] })).unwrap();
        assert!(GeminiClient::extract_text(&empty).is_none());

        let blocked: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{ "finishReason": "SAFETY" }]
        }))
        .unwrap();
        assert!(GeminiClient::extract_text(&blocked).is_none());
    }

    #[test]
    fn test_new_rejects_empty_key() {
        assert!(GeminiClient::new(&ModelConfig::new("")).is_err());
    }

    #[tokio::test]
    async fn test_generate_text_success() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(POST)
                .path(format!("/v1beta/models/{}:generateContent", MODEL))
                .header("x-goog-api-key", "test-key")
                .body_contains("Summarize");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(text_reply("All values normal."));
        });

        let client = GeminiClient::new(&config_for(&server, 0)).unwrap();
        let text = client.generate_text(MODEL, "Summarize").await.unwrap();

        api_mock.assert();
        assert_eq!(text, "All values normal.");
    }

    #[tokio::test]
    async fn test_generate_vision_sends_inline_image() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(POST)
                .path(format!("/v1beta/models/{}:generateContent", MODEL))
                .body_contains("\"mime_type\":\"image/jpeg\"");
            then.status(200).json_body(text_reply("{\"testResults\": []}"));
        });

        let client = GeminiClient::new(&config_for(&server, 0)).unwrap();
        let image = ImagePayload {
            mime_type: "image/jpeg".to_string(),
            bytes: vec![0xFF, 0xD8, 0xFF],
        };
        let text = client.generate_vision(MODEL, "Extract", &image).await.unwrap();

        api_mock.assert();
        assert_eq!(text, "{\"testResults\": []}");
    }

    #[tokio::test]
    async fn test_server_error_is_retried_once() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(POST);
            then.status(503).body("overloaded");
        });

        let client = GeminiClient::new(&config_for(&server, 1)).unwrap();
        let err = client.generate_text(MODEL, "hi").await.unwrap_err();

        api_mock.assert_hits(2);
        assert!(matches!(err, RelayError::ModelStatusError { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(POST);
            then.status(400).body("API key not valid. Please pass a valid API key.");
        });

        let client = GeminiClient::new(&config_for(&server, 3)).unwrap();
        let err = client.generate_text(MODEL, "hi").await.unwrap_err();

        api_mock.assert_hits(1);
        match err {
            RelayError::ModelStatusError { status, body } => {
                assert_eq!(status, 400);
                assert!(body.starts_with("API key not valid"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_body_is_truncated() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(403).body("x".repeat(1000));
        });

        let client = GeminiClient::new(&config_for(&server, 0)).unwrap();
        let err = client.generate_text(MODEL, "hi").await.unwrap_err();

        match err {
            RelayError::ModelStatusError { body, .. } => assert_eq!(body.len(), ERROR_BODY_LIMIT),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reply_without_text_is_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(200).json_body(json!({ "candidates": [] }));
        });

        let client = GeminiClient::new(&config_for(&server, 0)).unwrap();
        let err = client.generate_text(MODEL, "hi").await.unwrap_err();
        assert!(matches!(err, RelayError::EmptyModelResponse));
    }
}
