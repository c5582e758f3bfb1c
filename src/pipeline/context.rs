//! Execution context threaded through one pipeline run

use super::Phase;
use crate::rules::Rule;
use crate::tracker::Event;
use crate::{BridgeError, Result};
use std::sync::Arc;

/// Outcome flags earlier steps leave for later ones
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextFlags {
    /// `create_issue` created the issue during this run
    pub issue_created: bool,
    /// The ticket turned out to be linked to another issue already
    pub duplicate_detected: bool,
}

/// Scratch state owned by a single pipeline run.
///
/// The executor moves it into each step and takes it back from the step's
/// result; it is never shared between runs and never persisted.
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub event: Event,
    pub rule: Arc<Rule>,
    pub phase: Phase,
    pub issue_key: Option<String>,
    pub flags: ContextFlags,
}

impl ActionContext {
    pub fn new(event: Event, rule: Arc<Rule>, phase: Phase) -> Self {
        let issue_key = event.linked_issue_key();
        Self {
            event,
            rule,
            phase,
            issue_key,
            flags: ContextFlags::default(),
        }
    }

    pub fn ticket_id(&self) -> u64 {
        self.event.ticket_id()
    }

    /// Issue key, or a precondition error naming the step that needed it
    pub fn require_issue_key(&self, step: &'static str) -> Result<&str> {
        self.issue_key
            .as_deref()
            .ok_or_else(|| BridgeError::StepPrecondition {
                step,
                reason: format!("no Jira issue known for bug {}", self.ticket_id()),
            })
    }

    /// Whether a field counts as changed for this run. Every field counts on
    /// the `new` phase.
    pub fn field_changed(&self, field: &str) -> bool {
        self.phase == Phase::New || self.event.has_changed(field)
    }
}
