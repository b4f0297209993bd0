// SPDX-License-Identifier: MIT

//! OpenAI-compatible chat completions client
//!
//! Groq exposes the same API shape as OpenAI, so one client serves both.

use super::{map_send_error, CompletionClient, GenerationConfig, Provider};
use crate::error::CompletionError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

/// Chat-completions client for OpenAI-compatible endpoints
pub struct OpenAIModel {
    client: Client,
    provider: Provider,
    api_key: String,
    model_name: String,
    base_url: String,
    config: GenerationConfig,
    request_timeout: Duration,
}

impl OpenAIModel {
    /// Create a new client with a 60 second request timeout
    pub fn new(
        provider: Provider,
        api_key: String,
        base_url: String,
        model_name: String,
    ) -> Result<Self, CompletionError> {
        let request_timeout = Duration::from_secs(60);
        Ok(Self {
            client: Client::builder().timeout(request_timeout).build()?,
            provider,
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

    /// Replace the HTTP client with one using the given timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, CompletionError> {
        self.client = Client::builder().timeout(timeout).build()?;
        self.request_timeout = timeout;
        Ok(self)
    }

    /// Build the request body for a single-prompt completion
    fn request_body(&self, prompt: &str) -> Value {
        let mut body = json!({
            "model": self.model_name,
            "messages": [{ "role": "user", "content": prompt }]
        });

        if let Some(temp) = self.config.temperature {
            body["temperature"] = json!(temp);
        }
        if let Some(max_tokens) = self.config.max_output_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(top_p) = self.config.top_p {
            body["top_p"] = json!(top_p);
        }

        body
    }

    /// Extract the generated text from a chat-completions response
    fn parse_openai_response(response: &Value) -> Result<String, CompletionError> {
        let choice = response["choices"]
            .as_array()
            .and_then(|c| c.first())
            .ok_or_else(|| CompletionError::invalid_response("No choices in response"))?;

        choice["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| CompletionError::invalid_response("No text content in first choice"))
    }
}

#[async_trait]
impl CompletionClient for OpenAIModel {
    fn provider(&self) -> &str {
        self.provider.name()
    }

    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(prompt);

        log::debug!(
            "{} request body: {}",
            self.provider,
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| map_send_error(e, self.request_timeout))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(CompletionError::api(
                self.provider.name(),
                format!("{}: {}", status, text),
            ));
        }

        let resp_json: Value = resp
            .json()
            .await
            .map_err(|e| CompletionError::invalid_response(e.to_string()))?;
        log::debug!("{} response: {}", self.provider, resp_json);

        Self::parse_openai_response(&resp_json)
    }
}
