//! Steps: forward comments and change summaries to Jira

use super::{Step, StepStatus};
use crate::integrations::Trackers;
use crate::pipeline::field_map::{self, JIRA_TEXT_LIMIT};
use crate::pipeline::ActionContext;
use crate::tracker::{FieldChange, WebhookEvent};
use crate::Result;
use async_trait::async_trait;
use tracing::{debug, info};

/// Bug fields whose changes are reported on the issue
pub const TRACKED_FIELDS: [&str; 4] = ["status", "resolution", "assigned_to", "whiteboard"];

/// Forwards a new bug comment to the issue
pub struct CreateComment;

/// Posts one comment summarizing tracked field changes
pub struct AddJiraCommentsForChanges;

/// Jira markup for a forwarded comment
pub fn format_comment(author: &str, body: &str) -> String {
    format!("*({})* commented: \n{{quote}}{}{{quote}}", author, body)
}

/// Jira markup listing tracked changes, or `None` if there are none
pub fn format_changes(notice: &WebhookEvent) -> Option<String> {
    let lines: Vec<String> = notice
        .changes
        .iter()
        .filter(|c| TRACKED_FIELDS.contains(&c.field.as_str()))
        .map(|FieldChange { field, removed, added }| format!("* {}: {} → {}", field, removed, added))
        .collect();

    if lines.is_empty() {
        return None;
    }
    Some(format!(
        "*({})* changed:\n{}",
        notice.user_login(),
        lines.join("\n")
    ))
}

#[async_trait]
impl Step for CreateComment {
    fn name(&self) -> &'static str {
        "create_comment"
    }

    async fn run(
        &self,
        ctx: ActionContext,
        trackers: &Trackers,
    ) -> Result<(ActionContext, StepStatus)> {
        let key = ctx.require_issue_key(self.name())?;

        let comment = match &ctx.event.ticket.comment {
            Some(comment) if comment.is_private != Some(true) => comment,
            _ => {
                debug!(ticket_id = ctx.ticket_id(), "No public comment in payload");
                return Ok((ctx, StepStatus::NoChange));
            }
        };
        let body = match comment.body.as_deref() {
            Some(body) if !body.trim().is_empty() => body,
            _ => return Ok((ctx, StepStatus::NoChange)),
        };

        let text = field_map::truncate(
            &format_comment(ctx.event.notice.user_login(), body),
            JIRA_TEXT_LIMIT,
        );
        trackers.downstream.add_comment(key, &text).await?;
        info!(ticket_id = ctx.ticket_id(), issue_key = %key, "Forwarded comment");
        Ok((ctx, StepStatus::Success))
    }
}

#[async_trait]
impl Step for AddJiraCommentsForChanges {
    fn name(&self) -> &'static str {
        "add_jira_comments_for_changes"
    }

    async fn run(
        &self,
        ctx: ActionContext,
        trackers: &Trackers,
    ) -> Result<(ActionContext, StepStatus)> {
        let key = ctx.require_issue_key(self.name())?;

        let text = match format_changes(&ctx.event.notice) {
            Some(text) => text,
            None => return Ok((ctx, StepStatus::NoChange)),
        };

        trackers.downstream.add_comment(key, &text).await?;
        info!(ticket_id = ctx.ticket_id(), issue_key = %key, "Commented field changes");
        Ok((ctx, StepStatus::Success))
    }
}
