// SPDX-License-Identifier: MIT

//! Support service - the entry point used by the HTTP surface and the CLI
//!
//! Validates input, runs the workflow once per query, shapes the public
//! response, and hands successful answers to the transcript store.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use super::store::{TranscriptRecord, TranscriptStore};
use super::workflow::{RunOutcome, SupportWorkflow, WorkflowEvent};
use crate::error::SupportError;

/// Public response contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportResponse {
    pub category: String,
    pub sentiment: String,
    pub response: String,
}

impl From<RunOutcome> for SupportResponse {
    fn from(outcome: RunOutcome) -> Self {
        Self {
            category: outcome.category,
            sentiment: outcome.sentiment,
            response: outcome.response,
        }
    }
}

pub struct SupportService {
    workflow: Arc<SupportWorkflow>,
    store: Option<Arc<dyn TranscriptStore>>,
    pending_saves: TaskTracker,
}

impl SupportService {
    pub fn new(workflow: Arc<SupportWorkflow>) -> Self {
        Self {
            workflow,
            store: None,
            pending_saves: TaskTracker::new(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn TranscriptStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Wait for every transcript save spawned so far.
    ///
    /// Short-lived callers (the CLI) call this before exiting so records are
    /// not lost when the runtime shuts down.
    pub async fn flush_transcripts(&self) {
        self.pending_saves.close();
        self.pending_saves.wait().await;
        self.pending_saves.reopen();
    }

    /// Reject empty or whitespace-only queries
    pub fn validate(query: &str) -> Result<(), SupportError> {
        if query.trim().is_empty() {
            return Err(SupportError::InvalidInput(
                "Empty message received".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn run_customer_support(&self, query: &str) -> Result<SupportResponse, SupportError> {
        self.run_customer_support_with_cancel(query, &CancellationToken::new())
            .await
    }

    pub async fn run_customer_support_with_cancel(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<SupportResponse, SupportError> {
        Self::validate(query).inspect_err(|e| log::warn!("Rejected query: {}", e))?;

        let run_id = Uuid::new_v4();
        log::info!("[{}] Running support workflow", run_id);

        let outcome = self
            .workflow
            .run_with_cancel(query, cancel)
            .await
            .inspect_err(|e| log::error!("[{}] Support workflow failed: {}", run_id, e))?;

        Ok(self.finish(run_id, query, outcome))
    }

    /// Same as [`Self::run_customer_support`], streaming progress to `tx`
    pub async fn run_customer_support_stream(
        &self,
        query: &str,
        cancel: &CancellationToken,
        tx: mpsc::Sender<WorkflowEvent>,
    ) -> Result<SupportResponse, SupportError> {
        if let Err(e) = Self::validate(query) {
            log::warn!("Rejected query: {}", e);
            let _ = tx.send(WorkflowEvent::Error(e.public_message())).await;
            return Err(e);
        }

        let run_id = Uuid::new_v4();
        log::info!("[{}] Running support workflow (streaming)", run_id);

        let outcome = self
            .workflow
            .run_stream(query, cancel, tx)
            .await
            .inspect_err(|e| log::error!("[{}] Support workflow failed: {}", run_id, e))?;

        Ok(self.finish(run_id, query, outcome))
    }

    fn finish(&self, run_id: Uuid, query: &str, outcome: RunOutcome) -> SupportResponse {
        log::info!(
            "[{}] Completed via {} (category: {}, sentiment: {})",
            run_id,
            outcome.stage,
            outcome.category,
            outcome.sentiment
        );

        let answer = SupportResponse::from(outcome);
        self.persist(TranscriptRecord::new(run_id, query, &answer));
        answer
    }

    fn persist(&self, record: TranscriptRecord) {
        let Some(store) = self.store.clone() else {
            return;
        };

        self.pending_saves.spawn(async move {
            let id = record.id;
            if let Err(e) = store.save(record).await {
                log::warn!(
                    "[{}] Failed to save transcript to {} store: {}",
                    id,
                    store.name(),
                    e
                );
            }
        });
    }
}
