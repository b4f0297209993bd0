// SPDX-License-Identifier: MIT

//! Anthropic Model - Claude messages API implementation

use super::{map_send_error, CompletionClient, GenerationConfig};
use crate::error::CompletionError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Claude model implementation
pub struct AnthropicModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
    config: GenerationConfig,
    request_timeout: Duration,
}

impl AnthropicModel {
    pub fn new(
        api_key: String,
        base_url: String,
        model_name: String,
    ) -> Result<Self, CompletionError> {
        let request_timeout = Duration::from_secs(60);
        Ok(Self {
            client: Client::builder().timeout(request_timeout).build()?,
            api_key,
            model_name,
            base_url: base_url.trim_end_matches('/').to_string(),
            config: GenerationConfig::default(),
            request_timeout,
        })
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, CompletionError> {
        self.client = Client::builder().timeout(timeout).build()?;
        self.request_timeout = timeout;
        Ok(self)
    }

    fn request_body(&self, prompt: &str) -> Value {
        // max_tokens is mandatory for this API
        let mut body = json!({
            "model": self.model_name,
            "messages": [{
                "role": "user",
                "content": [{ "type": "text", "text": prompt }]
            }],
            "max_tokens": self.config.max_output_tokens.unwrap_or(1024)
        });

        if let Some(temp) = self.config.temperature {
            body["temperature"] = json!(temp);
        }
        if let Some(top_p) = self.config.top_p {
            body["top_p"] = json!(top_p);
        }

        body
    }

    /// Concatenate all text blocks of a messages-API response
    fn parse_anthropic_response(response: &Value) -> Result<String, CompletionError> {
        let content_blocks = response["content"]
            .as_array()
            .ok_or_else(|| CompletionError::invalid_response("No content in response"))?;

        let texts: Vec<&str> = content_blocks
            .iter()
            .filter(|block| block["type"].as_str() == Some("text"))
            .filter_map(|block| block["text"].as_str())
            .collect();

        if texts.is_empty() {
            return Err(CompletionError::invalid_response(
                "No text blocks in response",
            ));
        }

        if let Some(stop_reason) = response["stop_reason"].as_str() {
            log::debug!("Anthropic stop reason: {}", stop_reason);
        }

        Ok(texts.concat())
    }
}

#[async_trait]
impl CompletionClient for AnthropicModel {
    fn provider(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let url = format!("{}/messages", self.base_url);
        let body = self.request_body(prompt);

        log::debug!(
            "Anthropic request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| map_send_error(e, self.request_timeout))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(CompletionError::api(
                "anthropic",
                format!("{}: {}", status, text),
            ));
        }

        let resp_json: Value = resp
            .json()
            .await
            .map_err(|e| CompletionError::invalid_response(e.to_string()))?;
        log::debug!("Anthropic response: {}", resp_json);

        Self::parse_anthropic_response(&resp_json)
    }
}
