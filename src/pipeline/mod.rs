//! Event classification and step pipeline execution
//!
//! # Flow
//!
//! 1. [`classify`] assigns a matched event to a [`Phase`] (or ignores it)
//! 2. [`PipelineExecutor::run`] walks the rule's steps for that phase,
//!    threading an [`ActionContext`] through them
//! 3. The run ends as [`Outcome::Completed`], [`Outcome::Aborted`] or
//!    [`Outcome::Failed`]
//!
//! [`field_map`] holds the pure Bugzilla → Jira translations steps use.

mod classifier;
mod context;
mod executor;
pub mod field_map;
pub mod steps;

pub use classifier::{classify, Classification, IgnoreReason, Phase};
pub use context::{ActionContext, ContextFlags};
pub use executor::{Outcome, PipelineExecutor, StepRecord};
pub use steps::{Step, StepRegistry, StepStatus};
