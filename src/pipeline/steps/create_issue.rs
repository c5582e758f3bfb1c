//! Step: create the Jira issue for an unlinked bug

use super::{Step, StepStatus};
use crate::integrations::{NewIssue, Trackers};
use crate::pipeline::field_map::{self, JIRA_TEXT_LIMIT};
use crate::pipeline::ActionContext;
use crate::rules::Rule;
use crate::tracker::{Ticket, TicketComment};
use crate::Result;
use async_trait::async_trait;
use tracing::{debug, info};

pub struct CreateIssue;

/// Issue fields for a bug; the first comment becomes the description
pub fn build_new_issue(ticket: &Ticket, comments: &[TicketComment], rule: &Rule) -> NewIssue {
    let description = comments
        .first()
        .map(|c| field_map::truncate(&c.text, JIRA_TEXT_LIMIT))
        .unwrap_or_default();

    let whiteboard_tags = field_map::whiteboard_labels(
        ticket.whiteboard.as_deref().unwrap_or(""),
        rule.labels_brackets,
    );

    NewIssue {
        summary: field_map::truncate(ticket.summary.as_deref().unwrap_or(""), JIRA_TEXT_LIMIT),
        description,
        issue_type: field_map::issue_type(ticket.bug_type.as_deref(), &rule.issue_type_map),
        labels: field_map::merge_labels(
            &whiteboard_tags,
            &rule.extra_labels,
            rule.sync_whiteboard_labels,
        ),
    }
}

#[async_trait]
impl Step for CreateIssue {
    fn name(&self) -> &'static str {
        "create_issue"
    }

    async fn run(
        &self,
        mut ctx: ActionContext,
        trackers: &Trackers,
    ) -> Result<(ActionContext, StepStatus)> {
        if let Some(key) = &ctx.issue_key {
            debug!(ticket_id = ctx.ticket_id(), issue_key = %key, "Issue already linked, not creating");
            return Ok((ctx, StepStatus::NoChange));
        }

        let comments = trackers.upstream.get_comments(ctx.ticket_id()).await?;
        let issue = build_new_issue(&ctx.event.ticket, &comments, &ctx.rule);

        let key = trackers
            .downstream
            .create_issue(&ctx.rule.project_key, &issue)
            .await?;

        info!(
            ticket_id = ctx.ticket_id(),
            issue_key = %key,
            project = %ctx.rule.project_key,
            "Created Jira issue"
        );
        ctx.issue_key = Some(key);
        ctx.flags.issue_created = true;
        Ok((ctx, StepStatus::Success))
    }
}
