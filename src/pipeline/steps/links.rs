//! Steps: write back-references on both trackers
//!
//! Each step is named after the tracker whose record the link points to:
//! `add_link_to_jira` stores the Jira URL on the bug, `add_link_to_bugzilla`
//! stores the bug URL on the issue.

use super::{Step, StepStatus};
use crate::integrations::Trackers;
use crate::pipeline::ActionContext;
use crate::Result;
use async_trait::async_trait;
use tracing::{debug, info};

/// Adds the bug URL to the Jira issue as a remote link
pub struct AddLinkToBugzilla;

/// Adds the Jira issue URL to the bug's `see_also`
pub struct AddLinkToJira;

#[async_trait]
impl Step for AddLinkToBugzilla {
    fn name(&self) -> &'static str {
        "add_link_to_bugzilla"
    }

    async fn run(
        &self,
        ctx: ActionContext,
        trackers: &Trackers,
    ) -> Result<(ActionContext, StepStatus)> {
        let key = ctx.require_issue_key(self.name())?;
        let url = trackers.bugzilla_bug_url(ctx.ticket_id());
        let title = format!("Bugzilla Bug {}", ctx.ticket_id());

        trackers
            .downstream
            .add_remote_link(key, &url, &title)
            .await?;
        info!(ticket_id = ctx.ticket_id(), issue_key = %key, "Linked Jira issue to bug");
        Ok((ctx, StepStatus::Success))
    }
}

#[async_trait]
impl Step for AddLinkToJira {
    fn name(&self) -> &'static str {
        "add_link_to_jira"
    }

    async fn run(
        &self,
        ctx: ActionContext,
        trackers: &Trackers,
    ) -> Result<(ActionContext, StepStatus)> {
        let url = trackers.jira_issue_url(ctx.require_issue_key(self.name())?);

        if ctx.event.ticket.see_also.iter().any(|existing| existing == &url) {
            debug!(ticket_id = ctx.ticket_id(), url = %url, "Bug already links to issue");
            return Ok((ctx, StepStatus::NoChange));
        }

        trackers
            .upstream
            .set_back_reference(ctx.ticket_id(), &url)
            .await?;
        info!(ticket_id = ctx.ticket_id(), url = %url, "Linked bug to Jira issue");
        Ok((ctx, StepStatus::Success))
    }
}
