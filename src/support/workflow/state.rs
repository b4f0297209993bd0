// SPDX-License-Identifier: MIT

//! Per-run workflow state
//!
//! State is created fresh for every query and only ever accumulates:
//! `query` is fixed at construction and every other field is write-once.

use serde::Serialize;

use crate::error::WorkflowError;

/// Record threaded through a single run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowState {
    query: String,
    category: Option<String>,
    sentiment: Option<String>,
    response: Option<String>,
}

/// Partial update produced by a stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateUpdate {
    Category(String),
    Sentiment(String),
    Response(String),
}

impl StateUpdate {
    /// Name of the field this update writes
    pub fn field(&self) -> &'static str {
        match self {
            StateUpdate::Category(_) => "category",
            StateUpdate::Sentiment(_) => "sentiment",
            StateUpdate::Response(_) => "response",
        }
    }
}

impl WorkflowState {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            category: None,
            sentiment: None,
            response: None,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn sentiment(&self) -> Option<&str> {
        self.sentiment.as_deref()
    }

    pub fn response(&self) -> Option<&str> {
        self.response.as_deref()
    }

    /// Merge a stage's update; each field may be written once
    pub fn apply(&mut self, update: StateUpdate) -> Result<(), WorkflowError> {
        let field = update.field();
        let (slot, value) = match update {
            StateUpdate::Category(v) => (&mut self.category, v),
            StateUpdate::Sentiment(v) => (&mut self.sentiment, v),
            StateUpdate::Response(v) => (&mut self.response, v),
        };

        if slot.is_some() {
            return Err(WorkflowError::FieldAlreadySet(field));
        }
        *slot = Some(value);
        Ok(())
    }

    /// Consume the state, returning `(category, sentiment, response)`
    pub(crate) fn into_filled(self) -> Result<(String, String, String), WorkflowError> {
        let category = self.category.ok_or(WorkflowError::Incomplete("category"))?;
        let sentiment = self
            .sentiment
            .ok_or(WorkflowError::Incomplete("sentiment"))?;
        let response = self.response.ok_or(WorkflowError::Incomplete("response"))?;
        Ok((category, sentiment, response))
    }
}
