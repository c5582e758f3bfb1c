//! Steps: map bug status and resolution onto the Jira issue
//!
//! Both steps are no-ops for unmapped values. On updates they only act when
//! the relevant field changed; on creation they always apply.

use super::{Step, StepStatus};
use crate::integrations::Trackers;
use crate::pipeline::field_map;
use crate::pipeline::ActionContext;
use crate::Result;
use async_trait::async_trait;
use tracing::{debug, info};

pub struct MaybeUpdateIssueStatus;

pub struct MaybeUpdateIssueResolution;

#[async_trait]
impl Step for MaybeUpdateIssueStatus {
    fn name(&self) -> &'static str {
        "maybe_update_issue_status"
    }

    async fn run(
        &self,
        ctx: ActionContext,
        trackers: &Trackers,
    ) -> Result<(ActionContext, StepStatus)> {
        let key = ctx.require_issue_key(self.name())?;
        let rule = &ctx.rule;

        if rule.status_map.is_empty()
            || !(ctx.field_changed("status") || ctx.field_changed("resolution"))
        {
            return Ok((ctx, StepStatus::NoChange));
        }

        let lookup = field_map::status_lookup_key(&ctx.event.ticket, rule.status_precedence);
        let status = match field_map::map_status(lookup, &rule.status_map) {
            Some(status) => status,
            None => {
                debug!(ticket_id = ctx.ticket_id(), value = lookup, "Unmapped status");
                return Ok((ctx, StepStatus::NoChange));
            }
        };

        trackers.downstream.set_status(key, status).await?;
        info!(
            ticket_id = ctx.ticket_id(),
            issue_key = %key,
            from = lookup,
            status,
            "Updated issue status"
        );
        Ok((ctx, StepStatus::Success))
    }
}

#[async_trait]
impl Step for MaybeUpdateIssueResolution {
    fn name(&self) -> &'static str {
        "maybe_update_issue_resolution"
    }

    async fn run(
        &self,
        ctx: ActionContext,
        trackers: &Trackers,
    ) -> Result<(ActionContext, StepStatus)> {
        let key = ctx.require_issue_key(self.name())?;
        let rule = &ctx.rule;

        if rule.resolution_map.is_empty() || !ctx.field_changed("resolution") {
            return Ok((ctx, StepStatus::NoChange));
        }

        let value = ctx.event.ticket.resolution_str();
        let resolution = match field_map::map_resolution(value, &rule.resolution_map) {
            Some(resolution) => resolution,
            None => {
                debug!(ticket_id = ctx.ticket_id(), value, "Unmapped resolution");
                return Ok((ctx, StepStatus::NoChange));
            }
        };

        trackers.downstream.set_resolution(key, resolution).await?;
        info!(
            ticket_id = ctx.ticket_id(),
            issue_key = %key,
            from = value,
            resolution,
            "Updated issue resolution"
        );
        Ok((ctx, StepStatus::Success))
    }
}
