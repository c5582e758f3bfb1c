//! Step: undo a duplicate issue creation
//!
//! Two `new` events for the same bug can race and both create an issue. The
//! bug is re-fetched after creation; if it already links to a different
//! issue, the one this run created is deleted and the pipeline aborts.

use super::{Step, StepStatus};
use crate::integrations::Trackers;
use crate::pipeline::ActionContext;
use crate::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

pub struct MaybeDeleteDuplicate;

#[async_trait]
impl Step for MaybeDeleteDuplicate {
    fn name(&self) -> &'static str {
        "maybe_delete_duplicate"
    }

    async fn run(
        &self,
        mut ctx: ActionContext,
        trackers: &Trackers,
    ) -> Result<(ActionContext, StepStatus)> {
        if !ctx.flags.issue_created {
            return Ok((ctx, StepStatus::NoChange));
        }
        let created = ctx.require_issue_key(self.name())?.to_string();

        let latest = trackers.upstream.get_ticket(ctx.ticket_id()).await?;
        let linked = match latest.linked_issue_key() {
            Some(linked) if linked != created => linked,
            _ => {
                debug!(ticket_id = ctx.ticket_id(), issue_key = %created, "No duplicate issue");
                return Ok((ctx, StepStatus::NoChange));
            }
        };

        warn!(
            ticket_id = ctx.ticket_id(),
            issue_key = %created,
            linked_issue = %linked,
            "Deleting duplicate Jira issue"
        );
        trackers.downstream.delete_issue(&created).await?;

        ctx.flags.duplicate_detected = true;
        ctx.issue_key = Some(linked.clone());
        let reason = format!(
            "bug {} is already linked to {}; deleted duplicate {}",
            ctx.ticket_id(),
            linked,
            created
        );
        Ok((ctx, StepStatus::Abort(reason)))
    }
}
