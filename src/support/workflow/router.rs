// SPDX-License-Identifier: MIT

//! Routing decision made after sentiment analysis

use serde::{Deserialize, Serialize};
use std::fmt;

use super::stages::Stage;
use super::state::WorkflowState;

pub const NEGATIVE_SENTIMENT: &str = "Negative";
pub const TECHNICAL_CATEGORY: &str = "Technical";
pub const BILLING_CATEGORY: &str = "Billing";

/// Decision label produced by [`route`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Technical,
    Billing,
    General,
    Escalate,
}

impl Route {
    pub const ALL: [Route; 4] = [
        Route::Technical,
        Route::Billing,
        Route::General,
        Route::Escalate,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Route::Technical => "handle_technical",
            Route::Billing => "handle_billing",
            Route::General => "handle_general",
            Route::Escalate => "escalate",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Pick the next stage from accumulated state.
///
/// Negative sentiment wins over any category. Labels are compared exactly;
/// anything other than the two known categories falls back to general.
pub fn route(state: &WorkflowState) -> Route {
    if state.sentiment() == Some(NEGATIVE_SENTIMENT) {
        return Route::Escalate;
    }

    match state.category() {
        Some(TECHNICAL_CATEGORY) => Route::Technical,
        Some(BILLING_CATEGORY) => Route::Billing,
        _ => Route::General,
    }
}

/// Maps each routing decision to the stage that handles it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingTable {
    technical: Stage,
    billing: Stage,
    general: Stage,
    escalate: Stage,
}

impl RoutingTable {
    pub fn resolve(&self, route: Route) -> Stage {
        match route {
            Route::Technical => self.technical,
            Route::Billing => self.billing,
            Route::General => self.general,
            Route::Escalate => self.escalate,
        }
    }

    /// All `(decision, stage)` pairs in declaration order
    pub fn entries(&self) -> impl Iterator<Item = (Route, Stage)> + '_ {
        Route::ALL.into_iter().map(move |r| (r, self.resolve(r)))
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self {
            technical: Stage::HandleTechnical,
            billing: Stage::HandleBilling,
            general: Stage::HandleGeneral,
            escalate: Stage::Escalate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::support::workflow::state::StateUpdate;

    fn state(category: &str, sentiment: &str) -> WorkflowState {
        let mut state = WorkflowState::new("query");
        state
            .apply(StateUpdate::Category(category.to_string()))
            .unwrap();
        state
            .apply(StateUpdate::Sentiment(sentiment.to_string()))
            .unwrap();
        state
    }

    #[test]
    fn test_negative_sentiment_always_escalates() {
        for category in ["Technical", "Billing", "General", "", "Shipping"] {
            assert_eq!(route(&state(category, "Negative")), Route::Escalate);
        }
    }

    #[test]
    fn test_category_routing() {
        assert_eq!(route(&state("Technical", "Neutral")), Route::Technical);
        assert_eq!(route(&state("Billing", "Positive")), Route::Billing);
        assert_eq!(route(&state("General", "Neutral")), Route::General);
    }

    #[test]
    fn test_unrecognized_category_falls_back_to_general() {
        for category in ["", "technical", "Billing.", "Account access", " Technical"] {
            assert_eq!(route(&state(category, "Neutral")), Route::General);
        }
    }

    #[test]
    fn test_unrecognized_sentiment_is_not_negative() {
        for sentiment in ["negative", "Negative.", "Position", "", "Mixed"] {
            assert_eq!(route(&state("Technical", sentiment)), Route::Technical);
        }
    }

    #[test]
    fn test_missing_fields_route_to_general() {
        let state = WorkflowState::new("query");
        assert_eq!(route(&state), Route::General);
    }

    #[test]
    fn test_default_table_targets_terminal_stages() {
        let table = RoutingTable::default();
        assert_eq!(table.resolve(Route::Technical), Stage::HandleTechnical);
        assert_eq!(table.resolve(Route::Billing), Stage::HandleBilling);
        assert_eq!(table.resolve(Route::General), Stage::HandleGeneral);
        assert_eq!(table.resolve(Route::Escalate), Stage::Escalate);
        assert!(table.entries().all(|(_, stage)| stage.is_terminal()));
        for (route, stage) in table.entries() {
            assert_eq!(route.label(), stage.name());
        }
    }
}
