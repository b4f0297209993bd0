// SPDX-License-Identifier: MIT

//! Typed error handling for support-flow
//!
//! Errors are layered the same way the crate is: the completion backend
//! fails with [`CompletionError`], a workflow run wraps that into
//! [`WorkflowError`] tagged with the failing stage, and the owning service
//! surfaces everything as [`SupportError`].

use std::time::Duration;
use thiserror::Error;

use crate::support::workflow::Stage;

/// Failure of a single call to the text-generation backend
#[derive(Debug, Error)]
pub enum CompletionError {
    /// API key not configured
    #[error("API key not configured for provider: {0}")]
    ApiKeyMissing(String),

    /// Non-success status returned by the backend
    #[error("API error from {provider}: {message}")]
    Api { provider: String, message: String },

    /// Transport-level failure
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// The HTTP client gave up waiting for the backend
    #[error("Completion request timed out after {0:?}")]
    Timeout(Duration),

    /// Body could not be parsed or carried no usable text
    #[error("Invalid response from model: {0}")]
    InvalidResponse(String),
}

impl CompletionError {
    /// Create an API error
    pub fn api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create an invalid response error
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }
}

/// Failure of a workflow run
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// A stage's completion call failed; the run was aborted
    #[error("Stage '{stage}' failed: {source}")]
    Completion {
        stage: Stage,
        #[source]
        source: CompletionError,
    },

    /// The run was cancelled or hit its deadline while a call was pending
    #[error("Run cancelled during stage '{stage}'")]
    Cancelled { stage: Stage },

    /// A write-once state field was written twice
    #[error("State field '{0}' is already set")]
    FieldAlreadySet(&'static str),

    /// The run finished without populating a required field
    #[error("State field '{0}' was never populated")]
    Incomplete(&'static str),
}

impl WorkflowError {
    /// Stage that was executing when the run failed, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Completion { stage, .. } | Self::Cancelled { stage } => Some(*stage),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Description without backend error detail
    pub fn summary(&self) -> String {
        match self {
            Self::Completion { stage, .. } => format!("Stage '{}' failed", stage),
            other => other.to_string(),
        }
    }
}

/// Transcript persistence errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Top-level error type for support-flow
#[derive(Debug, Error)]
pub enum SupportError {
    /// Caller supplied an unusable query (empty or blank)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Workflow run failed
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    /// Completion client could not be constructed
    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    /// Configuration errors (unknown provider, bad values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl SupportError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Message safe to show to an end user.
    ///
    /// Backend detail is deliberately left out; callers log the full error.
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidInput(msg) => msg.clone(),
            Self::Workflow(WorkflowError::Cancelled { .. }) => {
                "The request took too long to process. Please try again.".to_string()
            }
            _ => "Something went wrong while processing your request.".to_string(),
        }
    }
}
