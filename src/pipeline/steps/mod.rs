//! Step library
//!
//! Each step is one named, idempotent unit of pipeline work. Steps are
//! looked up by name in a [`StepRegistry`] when rules are compiled; nothing
//! is resolved by name while a request is being handled.

mod assignee;
mod comments;
mod components;
mod create_issue;
mod duplicates;
mod links;
mod status;
mod update_issue;

pub use assignee::MaybeAssignJiraUser;
pub use comments::{AddJiraCommentsForChanges, CreateComment};
pub use components::MaybeUpdateComponents;
pub use create_issue::CreateIssue;
pub use duplicates::MaybeDeleteDuplicate;
pub use links::{AddLinkToBugzilla, AddLinkToJira};
pub use status::{MaybeUpdateIssueResolution, MaybeUpdateIssueStatus};
pub use update_issue::{SyncWhiteboardLabels, UpdateIssue};

use super::{ActionContext, Phase};
use crate::integrations::Trackers;
use crate::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Steps run for an unlinked ticket when a rule omits `steps.new`
pub const DEFAULT_NEW_STEPS: &[&str] = &[
    "create_issue",
    "maybe_delete_duplicate",
    "add_link_to_bugzilla",
    "add_link_to_jira",
];

/// Steps run for a changed, linked ticket when a rule omits `steps.existing`.
/// A comment that arrives with other changes is forwarded here too.
pub const DEFAULT_EXISTING_STEPS: &[&str] = &[
    "update_issue",
    "add_jira_comments_for_changes",
    "create_comment",
];

/// Steps run for a new comment when a rule omits `steps.comment`
pub const DEFAULT_COMMENT_STEPS: &[&str] = &["create_comment"];

/// Built-in default step names for a phase
pub fn default_step_names(phase: Phase) -> &'static [&'static str] {
    match phase {
        Phase::New => DEFAULT_NEW_STEPS,
        Phase::Existing => DEFAULT_EXISTING_STEPS,
        Phase::Comment => DEFAULT_COMMENT_STEPS,
    }
}

/// How a step finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    /// Did its work
    Success,
    /// Nothing to do for this event
    NoChange,
    /// Stop the pipeline; remaining steps are skipped
    Abort(String),
}

impl StepStatus {
    pub fn label(&self) -> &'static str {
        match self {
            StepStatus::Success => "success",
            StepStatus::NoChange => "no_change",
            StepStatus::Abort(_) => "aborted",
        }
    }
}

/// One pipeline step
///
/// A step receives the context by value and hands it back with its status.
/// Errors stop the pipeline; the executor never retries.
#[async_trait]
pub trait Step: Send + Sync {
    /// Name used in rule files
    fn name(&self) -> &'static str;

    async fn run(
        &self,
        ctx: ActionContext,
        trackers: &Trackers,
    ) -> Result<(ActionContext, StepStatus)>;
}

/// Named table of available steps
#[derive(Clone, Default)]
pub struct StepRegistry {
    steps: BTreeMap<&'static str, Arc<dyn Step>>,
}

impl StepRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in step
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(CreateIssue);
        registry.register(MaybeDeleteDuplicate);
        registry.register(AddLinkToBugzilla);
        registry.register(AddLinkToJira);
        registry.register(UpdateIssue);
        registry.register(SyncWhiteboardLabels);
        registry.register(AddJiraCommentsForChanges);
        registry.register(CreateComment);
        registry.register(MaybeAssignJiraUser);
        registry.register(MaybeUpdateIssueStatus);
        registry.register(MaybeUpdateIssueResolution);
        registry.register(MaybeUpdateComponents);
        registry
    }

    /// Add a step, replacing any step with the same name
    pub fn register(&mut self, step: impl Step + 'static) {
        self.steps.insert(step.name(), Arc::new(step));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Step>> {
        self.steps.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.steps.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        self.steps.keys().copied().collect()
    }
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRegistry")
            .field("steps", &self.names())
            .finish()
    }
}
