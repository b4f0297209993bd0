// SPDX-License-Identifier: MIT

//! Stage identifiers and the per-stage unit of work
//!
//! A stage either needs the completion backend (render a prompt, then merge
//! the returned text) or produces its update directly.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::prompts::PromptTemplate;
use super::state::{StateUpdate, WorkflowState};
use crate::error::CompletionError;

/// Default notice returned by the `escalate` stage
pub const ESCALATION_NOTICE: &str =
    "This query has been escalated to a human agent due to its negative sentiment.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Categorize,
    AnalyzeSentiment,
    HandleTechnical,
    HandleBilling,
    HandleGeneral,
    Escalate,
}

/// What a stage needs done before its update is known
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageWork {
    /// Send this prompt to the backend, then call [`Stage::merge`]
    Complete(String),
    /// Update known without an external call
    Fixed(StateUpdate),
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Categorize,
        Stage::AnalyzeSentiment,
        Stage::HandleTechnical,
        Stage::HandleBilling,
        Stage::HandleGeneral,
        Stage::Escalate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Categorize => "categorize",
            Stage::AnalyzeSentiment => "analyze_sentiment",
            Stage::HandleTechnical => "handle_technical",
            Stage::HandleBilling => "handle_billing",
            Stage::HandleGeneral => "handle_general",
            Stage::Escalate => "escalate",
        }
    }

    /// Template rendered by this stage, if it calls the backend
    pub fn template(&self) -> Option<PromptTemplate> {
        match self {
            Stage::Categorize => Some(PromptTemplate::Categorize),
            Stage::AnalyzeSentiment => Some(PromptTemplate::Sentiment),
            Stage::HandleTechnical => Some(PromptTemplate::Technical),
            Stage::HandleBilling => Some(PromptTemplate::Billing),
            Stage::HandleGeneral => Some(PromptTemplate::General),
            Stage::Escalate => None,
        }
    }

    /// Stages that write `response` and lead straight to the end of the run
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Stage::Categorize | Stage::AnalyzeSentiment)
    }

    /// First step of a stage: render its prompt, or produce a fixed update
    pub fn prepare(&self, state: &WorkflowState, escalation_notice: &str) -> StageWork {
        match self.template() {
            Some(template) => StageWork::Complete(template.render(state.query())),
            None => StageWork::Fixed(StateUpdate::Response(escalation_notice.to_string())),
        }
    }

    /// Second step: turn backend text into this stage's update.
    ///
    /// Labels are kept as returned. Generated responses must not be blank.
    pub fn merge(&self, text: String) -> Result<StateUpdate, CompletionError> {
        match self {
            Stage::Categorize => Ok(StateUpdate::Category(text)),
            Stage::AnalyzeSentiment => Ok(StateUpdate::Sentiment(text)),
            _ if text.trim().is_empty() => Err(CompletionError::invalid_response(format!(
                "Empty response for stage {}",
                self
            ))),
            _ => Ok(StateUpdate::Response(text)),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
