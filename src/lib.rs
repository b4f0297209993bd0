// SPDX-License-Identifier: MIT

//! Customer-support query routing.
//!
//! A query is categorised and sentiment-scored by a text-generation backend,
//! then routed to a technical, billing or general answer, or escalated to a
//! human agent when the customer is unhappy.

pub mod error;
pub mod llm;
pub mod support;
