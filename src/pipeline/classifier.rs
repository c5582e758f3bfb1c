//! Event classifier - assigns an event to a lifecycle phase

use crate::rules::Rule;
use crate::tracker::Event;
use serde::Serialize;

/// Lifecycle phase of an event relative to its Jira issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Ticket not linked yet
    New,
    /// Linked ticket changed
    Existing,
    /// Linked ticket got a comment and nothing else
    Comment,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::New, Phase::Existing, Phase::Comment];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::New => "new",
            Phase::Existing => "existing",
            Phase::Comment => "comment",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an event was not processed. None of these are errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum IgnoreReason {
    NoMatchingRule,
    RuleDisabled { tag: String },
    PrivateNotAllowed { tag: String },
}

impl IgnoreReason {
    /// Metrics label
    pub fn label(&self) -> &'static str {
        match self {
            IgnoreReason::NoMatchingRule => "no_matching_rule",
            IgnoreReason::RuleDisabled { .. } => "rule_disabled",
            IgnoreReason::PrivateNotAllowed { .. } => "private_not_allowed",
        }
    }
}

impl std::fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IgnoreReason::NoMatchingRule => write!(f, "no rule matches the whiteboard"),
            IgnoreReason::RuleDisabled { tag } => write!(f, "rule '{}' is disabled", tag),
            IgnoreReason::PrivateNotAllowed { tag } => {
                write!(f, "rule '{}' does not allow private bugs", tag)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Ignored(IgnoreReason),
    Run(Phase),
}

/// Classify an event for a matched rule.
///
/// Linkage is checked before comment-only, so a comment on an unlinked
/// ticket starts the `new` phase. A comment that arrives together with any
/// other change is `existing`.
pub fn classify(event: &Event, rule: &Rule) -> Classification {
    if !event.is_public() && !rule.allow_private {
        return Classification::Ignored(IgnoreReason::PrivateNotAllowed {
            tag: rule.tag.clone(),
        });
    }

    if event.linked_issue_key().is_none() {
        return Classification::Run(Phase::New);
    }

    if event.is_comment_only() {
        Classification::Run(Phase::Comment)
    } else {
        Classification::Run(Phase::Existing)
    }
}
