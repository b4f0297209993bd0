// SPDX-License-Identifier: MIT

//! Workflow engine
//!
//! The engine is built once with its completion client and routing table and
//! then shared read-only; every run owns its own [`WorkflowState`].

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::router::{route, Route, RoutingTable};
use super::stages::{Stage, StageWork, ESCALATION_NOTICE};
use super::state::WorkflowState;
use crate::error::WorkflowError;
use crate::llm::CompletionClient;

/// Final result of a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub category: String,
    pub sentiment: String,
    pub response: String,
    /// Routing decision taken after sentiment analysis
    pub route: Route,
    /// Stage that produced `response`
    pub stage: Stage,
}

/// Progress events emitted by [`SupportWorkflow::run_stream`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowEvent {
    StageStarted { stage: Stage },
    StageCompleted { stage: Stage },
    Routed { route: Route, stage: Stage },
    Completed(RunOutcome),
    Error(String),
}

/// Customer-support workflow engine
pub struct SupportWorkflow {
    client: Arc<dyn CompletionClient>,
    routing: RoutingTable,
    escalation_notice: String,
    call_timeout: Option<Duration>,
}

impl SupportWorkflow {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            client,
            routing: RoutingTable::default(),
            escalation_notice: ESCALATION_NOTICE.to_string(),
            call_timeout: None,
        }
    }

    pub fn with_escalation_notice(mut self, notice: impl Into<String>) -> Self {
        self.escalation_notice = notice.into();
        self
    }

    /// Deadline for each pending backend call; elapsing cancels the run
    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Run the workflow for one query
    pub async fn run(&self, query: &str) -> Result<RunOutcome, WorkflowError> {
        self.execute(query, &CancellationToken::new(), None).await
    }

    /// Run the workflow, aborting with `Cancelled` once `cancel` fires
    pub async fn run_with_cancel(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, WorkflowError> {
        self.execute(query, cancel, None).await
    }

    /// Run the workflow with streaming progress events.
    ///
    /// The final event is either `Completed` or `Error`. A dropped receiver
    /// does not affect the run.
    pub async fn run_stream(
        &self,
        query: &str,
        cancel: &CancellationToken,
        tx: mpsc::Sender<WorkflowEvent>,
    ) -> Result<RunOutcome, WorkflowError> {
        let result = self.execute(query, cancel, Some(&tx)).await;
        let event = match &result {
            Ok(outcome) => WorkflowEvent::Completed(outcome.clone()),
            Err(e) => WorkflowEvent::Error(e.summary()),
        };
        let _ = tx.send(event).await;
        result
    }

    /// Render the fixed topology as a Mermaid flowchart
    pub fn to_mermaid(&self) -> String {
        to_mermaid(&self.routing)
    }

    async fn execute(
        &self,
        query: &str,
        cancel: &CancellationToken,
        events: Option<&mpsc::Sender<WorkflowEvent>>,
    ) -> Result<RunOutcome, WorkflowError> {
        let mut state = WorkflowState::new(query);

        self.run_stage(Stage::Categorize, &mut state, cancel, events)
            .await?;
        self.run_stage(Stage::AnalyzeSentiment, &mut state, cancel, events)
            .await?;

        let decision = route(&state);
        let handler = self.routing.resolve(decision);
        log::info!(
            "Routed query (category: {:?}, sentiment: {:?}) to {}",
            state.category(),
            state.sentiment(),
            handler
        );
        emit(
            events,
            WorkflowEvent::Routed {
                route: decision,
                stage: handler,
            },
        )
        .await;

        self.run_stage(handler, &mut state, cancel, events).await?;

        let (category, sentiment, response) = state.into_filled()?;
        Ok(RunOutcome {
            category,
            sentiment,
            response,
            route: decision,
            stage: handler,
        })
    }

    async fn run_stage(
        &self,
        stage: Stage,
        state: &mut WorkflowState,
        cancel: &CancellationToken,
        events: Option<&mpsc::Sender<WorkflowEvent>>,
    ) -> Result<(), WorkflowError> {
        log::debug!("Executing stage: {}", stage);
        emit(events, WorkflowEvent::StageStarted { stage }).await;

        let update = match stage.prepare(state, &self.escalation_notice) {
            StageWork::Fixed(update) => update,
            StageWork::Complete(prompt) => {
                log::debug!("Stage {} prompt: {}", stage, prompt);
                let text = self.complete(stage, &prompt, cancel).await?;
                stage
                    .merge(text)
                    .map_err(|source| WorkflowError::Completion { stage, source })?
            }
        };
        state.apply(update)?;

        emit(events, WorkflowEvent::StageCompleted { stage }).await;
        Ok(())
    }

    /// The single suspension point of a run
    async fn complete(
        &self,
        stage: Stage,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, WorkflowError> {
        let call = self.client.complete(prompt);

        let result = match self.call_timeout {
            Some(limit) => tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(WorkflowError::Cancelled { stage }),
                res = tokio::time::timeout(limit, call) => match res {
                    Ok(res) => res,
                    Err(_) => {
                        log::warn!("Stage {} exceeded call timeout of {:?}", stage, limit);
                        return Err(WorkflowError::Cancelled { stage });
                    }
                },
            },
            None => tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(WorkflowError::Cancelled { stage }),
                res = call => res,
            },
        };

        result.map_err(|source| WorkflowError::Completion { stage, source })
    }
}

async fn emit(events: Option<&mpsc::Sender<WorkflowEvent>>, event: WorkflowEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event).await;
    }
}

/// Mermaid flowchart of the workflow for a given routing table
pub fn to_mermaid(routing: &RoutingTable) -> String {
    let mut out = String::from("graph TD;\n");
    let _ = writeln!(out, "    __start__ --> {};", Stage::Categorize);
    let _ = writeln!(
        out,
        "    {} --> {};",
        Stage::Categorize,
        Stage::AnalyzeSentiment
    );
    for (route, stage) in routing.entries() {
        let _ = writeln!(
            out,
            "    {} -. {} .-> {};",
            Stage::AnalyzeSentiment,
            route,
            stage
        );
    }
    for (_, stage) in routing.entries() {
        let _ = writeln!(out, "    {} --> __end__;", stage);
    }
    out
}
