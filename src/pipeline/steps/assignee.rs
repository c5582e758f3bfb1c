//! Step: mirror the bug assignee on the Jira issue
//!
//! The Jira user is found by the Bugzilla assignee's email. An unassigned bug,
//! or an assignee with no Jira account, clears the issue assignee.

use super::{Step, StepStatus};
use crate::integrations::Trackers;
use crate::pipeline::{ActionContext, Phase};
use crate::Result;
use async_trait::async_trait;
use tracing::{debug, info};

pub struct MaybeAssignJiraUser;

#[async_trait]
impl Step for MaybeAssignJiraUser {
    fn name(&self) -> &'static str {
        "maybe_assign_jira_user"
    }

    async fn run(
        &self,
        ctx: ActionContext,
        trackers: &Trackers,
    ) -> Result<(ActionContext, StepStatus)> {
        let key = ctx.require_issue_key(self.name())?;
        let ticket = &ctx.event.ticket;

        let relevant = match ctx.phase {
            Phase::New => ticket.is_assigned(),
            Phase::Existing | Phase::Comment => ctx.event.has_changed("assigned_to"),
        };
        if !relevant {
            return Ok((ctx, StepStatus::NoChange));
        }

        let email = ticket.assigned_to.as_deref().filter(|_| ticket.is_assigned());
        let user = match email {
            Some(email) => trackers.downstream.find_user_by_email(email).await?,
            None => None,
        };

        match &user {
            Some(user) => info!(
                ticket_id = ctx.ticket_id(),
                issue_key = %key,
                account_id = %user.account_id,
                "Assigning Jira issue"
            ),
            None => debug!(
                ticket_id = ctx.ticket_id(),
                issue_key = %key,
                "No matching Jira user, clearing assignee"
            ),
        }
        trackers.downstream.set_assignee(key, user.as_ref()).await?;
        Ok((ctx, StepStatus::Success))
    }
}
