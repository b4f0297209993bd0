// SPDX-License-Identifier: MIT

pub mod config;
pub mod server;
pub mod service;
pub mod store;
pub mod workflow;

pub use config::Settings;
pub use service::{SupportResponse, SupportService};
