//! bugbridge - Bugzilla to Jira synchronization
//!
//! Receives Bugzilla webhooks, matches each bug to a rule by its whiteboard
//! tag, and runs that rule's configured step pipeline against Jira.
//!
//! # Architecture
//!
//! - **config**: Rule file (YAML), its validation, and process settings
//! - **tracker**: Bugzilla bug and webhook payload model
//! - **rules**: Compiled rules and the tag → rule registry
//! - **pipeline**: Event classification, step library and executor
//! - **integrations**: Bugzilla and Jira REST adapters, retry
//! - **runner**: End-to-end handling of one webhook
//! - **server**: HTTP endpoints (axum)

pub mod config;
pub mod error;
pub mod integrations;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod rules;
pub mod runner;
pub mod server;
pub mod tracker;

// Re-exports
pub use error::{BridgeError, Result, Tracker, TrackerError};
pub use integrations::{DownstreamTracker, Trackers, UpstreamTracker};
pub use pipeline::{Outcome, Phase, PipelineExecutor, Step, StepRegistry, StepStatus};
pub use rules::{RegistryHandle, Rule, RuleRegistry};
pub use runner::{Bridge, Disposition, Report};
pub use server::BridgeServer;
