//! Step: set Jira components from the bug's product and component

use super::{Step, StepStatus};
use crate::config::JiraComponents;
use crate::error::TrackerError;
use crate::integrations::Trackers;
use crate::pipeline::ActionContext;
use crate::tracker::Ticket;
use crate::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Sets the issue's components to the project components named by the bug
pub struct MaybeUpdateComponents;

/// Component names a bug asks for under the rule's `jira_components`
fn candidate_components(ticket: &Ticket, options: &JiraComponents) -> BTreeSet<String> {
    let mut names: BTreeSet<String> = options.set_custom_components.iter().cloned().collect();
    let non_empty = |value: &Option<String>| value.clone().filter(|v| !v.is_empty());

    if options.use_bug_component {
        names.extend(non_empty(&ticket.component));
    }
    if options.use_bug_product {
        names.extend(non_empty(&ticket.product));
    }
    if options.use_bug_component_with_product_prefix {
        names.extend(ticket.product_component());
    }
    names
}

#[async_trait]
impl Step for MaybeUpdateComponents {
    fn name(&self) -> &'static str {
        "maybe_update_components"
    }

    async fn run(
        &self,
        ctx: ActionContext,
        trackers: &Trackers,
    ) -> Result<(ActionContext, StepStatus)> {
        let key = ctx.require_issue_key(self.name())?;

        let mut wanted = candidate_components(&ctx.event.ticket, &ctx.rule.jira_components);
        if wanted.is_empty() {
            debug!(ticket_id = ctx.ticket_id(), "No components to set");
            return Ok((ctx, StepStatus::NoChange));
        }

        let available = trackers
            .downstream
            .project_components(&ctx.rule.project_key)
            .await?;
        let ids: Vec<String> = available
            .into_iter()
            .filter(|component| wanted.remove(&component.name))
            .map(|component| component.id)
            .collect();

        if !wanted.is_empty() {
            warn!(
                ticket_id = ctx.ticket_id(),
                project = %ctx.rule.project_key,
                missing = ?wanted,
                "Could not find components in project"
            );
        }
        if ids.is_empty() {
            return Ok((ctx, StepStatus::NoChange));
        }

        match trackers.downstream.set_components(key, &ids).await {
            Ok(()) => {
                info!(
                    ticket_id = ctx.ticket_id(),
                    issue_key = %key,
                    components = ids.len(),
                    "Updated issue components"
                );
                Ok((ctx, StepStatus::Success))
            }
            // `components` is not on the project's edit screen
            Err(TrackerError::Api {
                status: 400, body, ..
            }) => {
                warn!(
                    ticket_id = ctx.ticket_id(),
                    issue_key = %key,
                    error = %body,
                    "Could not set components on issue"
                );
                Ok((ctx, StepStatus::NoChange))
            }
            Err(e) => Err(e.into()),
        }
    }
}
