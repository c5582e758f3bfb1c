//! Field mapper - pure translations from Bugzilla vocabulary to Jira's
//!
//! No I/O and no state: everything here is a function of its arguments.

use crate::config::{LabelsBrackets, StatusPrecedence};
use crate::tracker::Ticket;
use std::collections::{BTreeMap, BTreeSet};

/// Jira's limit for summary and description fields
pub const JIRA_TEXT_LIMIT: usize = 32_767;

/// Label every synced issue carries
pub const BUGZILLA_LABEL: &str = "bugzilla";

/// Issue type used when the bug type has no entry
pub const FALLBACK_ISSUE_TYPE: &str = "Task";

/// Look up an upstream value; unmapped or empty values map to nothing
pub fn map_value<'a>(value: &str, map: &'a BTreeMap<String, String>) -> Option<&'a str> {
    if value.is_empty() {
        return None;
    }
    map.get(value).map(String::as_str)
}

pub fn map_status<'a>(status: &str, status_map: &'a BTreeMap<String, String>) -> Option<&'a str> {
    map_value(status, status_map)
}

pub fn map_resolution<'a>(
    resolution: &str,
    resolution_map: &'a BTreeMap<String, String>,
) -> Option<&'a str> {
    map_value(resolution, resolution_map)
}

/// Upstream value the Jira status is derived from
pub fn status_lookup_key(ticket: &Ticket, precedence: StatusPrecedence) -> &str {
    let (first, second) = match precedence {
        StatusPrecedence::Resolution => (ticket.resolution_str(), ticket.status_str()),
        StatusPrecedence::Status => (ticket.status_str(), ticket.resolution_str()),
    };
    if first.is_empty() {
        second
    } else {
        first
    }
}

/// Whiteboard entries as Jira labels.
///
/// `"[devtest] [foo bar]"` yields `devtest`, `foo.bar` and/or their bracketed
/// forms depending on `brackets`. Jira labels cannot contain spaces.
pub fn whiteboard_labels(whiteboard: &str, brackets: LabelsBrackets) -> Vec<String> {
    let plain: Vec<String> = whiteboard
        .replace('[', "")
        .split(']')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.split_whitespace().collect::<Vec<_>>().join("."))
        .collect();
    let bracketed = plain.iter().map(|label| format!("[{}]", label));

    match brackets {
        LabelsBrackets::No => plain,
        LabelsBrackets::Yes => bracketed.collect(),
        LabelsBrackets::Both => {
            let bracketed: Vec<String> = bracketed.collect();
            plain.into_iter().chain(bracketed).collect()
        }
    }
}

/// Labels for a new issue: `bugzilla` plus whiteboard labels when syncing,
/// plus the rule's extra labels. Sorted and de-duplicated.
pub fn merge_labels(
    whiteboard_tags: &[String],
    extra_labels: &[String],
    sync_enabled: bool,
) -> Vec<String> {
    let mut labels: BTreeSet<String> = extra_labels.iter().cloned().collect();
    if sync_enabled {
        labels.insert(BUGZILLA_LABEL.to_string());
        labels.extend(whiteboard_tags.iter().cloned());
    }
    labels.into_iter().collect()
}

/// Jira issue type for a Bugzilla bug type
pub fn issue_type(bug_type: Option<&str>, issue_type_map: &BTreeMap<String, String>) -> String {
    bug_type
        .and_then(|t| issue_type_map.get(t))
        .map(String::as_str)
        .unwrap_or(FALLBACK_ISSUE_TYPE)
        .to_string()
}

/// Truncate to at most `max` characters (not bytes)
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Labels a synced issue carries for a whiteboard: `bugzilla` first, then
/// the whiteboard entries
pub fn synced_labels(whiteboard: &str, brackets: LabelsBrackets) -> Vec<String> {
    std::iter::once(BUGZILLA_LABEL.to_string())
        .chain(whiteboard_labels(whiteboard, brackets))
        .collect()
}

/// Label additions and removals for a whiteboard change.
///
/// `bugzilla` is always re-added and never removed.
pub fn label_changes(
    removed: &str,
    added: &str,
    brackets: LabelsBrackets,
) -> (Vec<String>, Vec<String>) {
    let after = synced_labels(added, brackets);
    let before: BTreeSet<String> = synced_labels(removed, brackets).into_iter().collect();
    let after_set: BTreeSet<&String> = after.iter().collect();
    let deleted = before
        .iter()
        .filter(|label| !after_set.contains(label))
        .cloned()
        .collect();
    (after, deleted)
}
