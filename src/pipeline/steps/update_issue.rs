//! Steps: push bug field changes to the Jira issue

use super::{Step, StepStatus};
use crate::integrations::{IssueUpdate, Trackers};
use crate::pipeline::field_map::{self, JIRA_TEXT_LIMIT};
use crate::pipeline::{ActionContext, Phase};
use crate::Result;
use async_trait::async_trait;
use tracing::{debug, info};

/// Copies the bug summary to the issue when it changed
pub struct UpdateIssue;

/// Mirrors whiteboard entries as issue labels
pub struct SyncWhiteboardLabels;

#[async_trait]
impl Step for UpdateIssue {
    fn name(&self) -> &'static str {
        "update_issue"
    }

    async fn run(
        &self,
        ctx: ActionContext,
        trackers: &Trackers,
    ) -> Result<(ActionContext, StepStatus)> {
        let key = ctx.require_issue_key(self.name())?;

        if !ctx.field_changed("summary") {
            debug!(ticket_id = ctx.ticket_id(), issue_key = %key, "Summary unchanged");
            return Ok((ctx, StepStatus::NoChange));
        }

        let summary = ctx.event.ticket.summary.as_deref().unwrap_or("");
        let update = IssueUpdate {
            summary: Some(field_map::truncate(summary, JIRA_TEXT_LIMIT)),
            ..Default::default()
        };
        trackers.downstream.update_issue(key, &update).await?;
        info!(ticket_id = ctx.ticket_id(), issue_key = %key, "Updated issue summary");
        Ok((ctx, StepStatus::Success))
    }
}

#[async_trait]
impl Step for SyncWhiteboardLabels {
    fn name(&self) -> &'static str {
        "sync_whiteboard_labels"
    }

    async fn run(
        &self,
        ctx: ActionContext,
        trackers: &Trackers,
    ) -> Result<(ActionContext, StepStatus)> {
        let key = ctx.require_issue_key(self.name())?;
        let brackets = ctx.rule.labels_brackets;

        let (labels_add, labels_remove) = if ctx.phase == Phase::New {
            let whiteboard = ctx.event.ticket.whiteboard.as_deref().unwrap_or("");
            (field_map::synced_labels(whiteboard, brackets), Vec::new())
        } else {
            match ctx.event.notice.change_for("whiteboard") {
                Some(change) => field_map::label_changes(&change.removed, &change.added, brackets),
                None => return Ok((ctx, StepStatus::NoChange)),
            }
        };

        let update = IssueUpdate {
            labels_add,
            labels_remove,
            ..Default::default()
        };
        if update.is_empty() {
            return Ok((ctx, StepStatus::NoChange));
        }

        trackers.downstream.update_issue(key, &update).await?;
        info!(
            ticket_id = ctx.ticket_id(),
            issue_key = %key,
            added = update.labels_add.len(),
            removed = update.labels_remove.len(),
            "Synced whiteboard labels"
        );
        Ok((ctx, StepStatus::Success))
    }
}
