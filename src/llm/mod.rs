// SPDX-License-Identifier: MIT

//! Completion module - the text-generation backend contract
//!
//! The workflow only ever needs "prompt in, text out", so the core trait is
//! [`CompletionClient::complete`]. Provider implementations live in their
//! own submodules:
//! - [openai] - OpenAI-compatible chat completions (OpenAI, Groq)
//! - [anthropic] - Anthropic's messages API

pub mod anthropic;
pub mod openai;

use crate::error::CompletionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub use anthropic::AnthropicModel;
pub use openai::OpenAIModel;

/// Default model, served by Groq
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Configuration for model generation
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub top_p: Option<f32>,
}

/// Core trait for text-generation backends.
///
/// Implementations must be safe to share across concurrent runs; the only
/// shared state allowed is the underlying connection pool.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Provider name used in logs and error messages
    fn provider(&self) -> &str;

    /// Generate text for a fully rendered prompt
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

/// Supported backend providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Groq,
    #[serde(rename = "openai")]
    OpenAI,
    Anthropic,
}

impl Provider {
    /// Infer the provider from a model name
    pub fn infer(model_name: &str) -> Self {
        if model_name.starts_with("gpt") || model_name.starts_with("o1") {
            Provider::OpenAI
        } else if model_name.starts_with("claude") {
            Provider::Anthropic
        } else {
            Provider::Groq
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Groq => "groq",
            Provider::OpenAI => "openai",
            Provider::Anthropic => "anthropic",
        }
    }

    /// Environment variable holding the API key
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Provider::Groq => "GROQ_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    /// Environment variable that may override the endpoint
    pub fn base_url_var(&self) -> &'static str {
        match self {
            Provider::Groq => "GROQ_BASE_URL",
            Provider::OpenAI => "OPENAI_BASE_URL",
            Provider::Anthropic => "ANTHROPIC_BASE_URL",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Groq => "https://api.groq.com/openai/v1",
            Provider::OpenAI => "https://api.openai.com/v1",
            Provider::Anthropic => "https://api.anthropic.com/v1",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "groq" => Ok(Provider::Groq),
            "openai" => Ok(Provider::OpenAI),
            "anthropic" => Ok(Provider::Anthropic),
            other => Err(format!("Unknown provider: {}", other)),
        }
    }
}

/// Settings for constructing a completion client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompletionSettings {
    /// Explicit provider; inferred from `model` when absent
    pub provider: Option<Provider>,
    pub model: String,
    /// Endpoint override
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    /// HTTP-client timeout for a single call
    pub request_timeout_secs: u64,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            provider: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: None,
            temperature: Some(0.0),
            max_output_tokens: None,
            request_timeout_secs: 60,
        }
    }
}

impl CompletionSettings {
    /// Effective provider
    pub fn provider(&self) -> Provider {
        self.provider.unwrap_or_else(|| Provider::infer(&self.model))
    }

    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
            top_p: None,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Effective endpoint: explicit setting, then environment, then provider default
    pub fn base_url(&self) -> String {
        let provider = self.provider();
        self.base_url
            .clone()
            .or_else(|| env::var(provider.base_url_var()).ok())
            .unwrap_or_else(|| provider.default_base_url().to_string())
    }
}

/// Build a completion client for the configured provider.
///
/// The API key is read from the provider's environment variable.
pub fn build_client(
    settings: &CompletionSettings,
) -> Result<Arc<dyn CompletionClient>, CompletionError> {
    let provider = settings.provider();
    let api_key = env::var(provider.api_key_var())
        .map_err(|_| CompletionError::ApiKeyMissing(provider.name().to_string()))?;
    let base_url = settings.base_url();

    log::info!(
        "Using provider: {} with model: {} ({})",
        provider,
        settings.model,
        base_url
    );

    let client: Arc<dyn CompletionClient> = match provider {
        Provider::Groq | Provider::OpenAI => Arc::new(
            OpenAIModel::new(provider, api_key, base_url, settings.model.clone())?
                .with_config(settings.generation_config())
                .with_timeout(settings.request_timeout())?,
        ),
        Provider::Anthropic => Arc::new(
            AnthropicModel::new(api_key, base_url, settings.model.clone())?
                .with_config(settings.generation_config())
                .with_timeout(settings.request_timeout())?,
        ),
    };

    Ok(client)
}

/// Map a transport failure, distinguishing client-side timeouts
pub(crate) fn map_send_error(err: reqwest::Error, timeout: Duration) -> CompletionError {
    if err.is_timeout() {
        CompletionError::Timeout(timeout)
    } else {
        CompletionError::Http(err)
    }
}
