// SPDX-License-Identifier: MIT

//! Customer-support workflow
//!
//! A fixed graph of stages: `categorize` → `analyze_sentiment` → one of
//! `handle_technical`, `handle_billing`, `handle_general` or `escalate`,
//! with the last hop chosen by [`route`].

mod engine;
mod prompts;
mod router;
mod stages;
mod state;

pub use engine::{to_mermaid, RunOutcome, SupportWorkflow, WorkflowEvent};
pub use prompts::PromptTemplate;
pub use router::{
    route, Route, RoutingTable, BILLING_CATEGORY, NEGATIVE_SENTIMENT, TECHNICAL_CATEGORY,
};
pub use stages::{Stage, StageWork, ESCALATION_NOTICE};
pub use state::{StateUpdate, WorkflowState};
