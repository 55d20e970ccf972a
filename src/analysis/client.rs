use crate::analysis::ModelClient;
use crate::config::Config;
use crate::error::{DigestError, Result};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat-completions client for the analysis step.
pub struct HttpModelClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl HttpModelClient {
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.resolve_model_key().ok_or_else(|| {
            DigestError::ModelUnavailable(
                "model API key is not configured (model_api_key or SITEPULSE_MODEL_KEY)"
                    .to_string(),
            )
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|error| {
                DigestError::ModelUnavailable(format!("invalid model API key: {error}"))
            })?,
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.model_timeout_seconds.max(5)))
            .default_headers(headers)
            .build()
            .map_err(|error| {
                DigestError::ModelUnavailable(format!("failed to build model HTTP client: {error}"))
            })?;

        Ok(Self {
            client,
            base_url: config.model_base_url.trim_end_matches('/').to_string(),
            model: config.model_name.clone(),
        })
    }

    /// Connectivity probe for `sitepulse model test`.
    pub async fn test_connection(&self) -> Result<String> {
        self.complete(
            "Return exactly one short sentence confirming the model API is reachable.",
            "Health check for sitepulse.",
        )
        .await
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let endpoint = format!("{}/chat/completions", self.base_url);

        let request_body = json!({
            "model": self.model,
            "temperature": 0.1,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ]
        });

        let response = self
            .client
            .post(&endpoint)
            .json(&request_body)
            .send()
            .await
            .map_err(|error| {
                DigestError::ModelUnavailable(format!("model request failed: {error}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            DigestError::ModelUnavailable(format!("failed to read model response: {error}"))
        })?;

        if !status.is_success() {
            return Err(DigestError::ModelUnavailable(format!(
                "model API error {status}: {body}"
            )));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body).map_err(|error| {
            DigestError::ModelOutputInvalid(format!("unexpected completion envelope: {error}"))
        })?;

        parsed
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| {
                DigestError::ModelOutputInvalid(
                    "model response did not include message.content".to_string(),
                )
            })
    }
}
