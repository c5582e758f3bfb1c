//! End-to-end handling of one webhook request
//!
//! event → private refresh → rule lookup → classification → pipeline run

use crate::integrations::Trackers;
use crate::metrics;
use crate::pipeline::{
    classify, Classification, IgnoreReason, Outcome, Phase, PipelineExecutor, StepRecord,
};
use crate::rules::{RegistryHandle, Resolution};
use crate::tracker::{Event, WebhookRequest};
use crate::Result;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

/// What happened to an event
#[derive(Debug)]
pub enum Disposition {
    /// Not processed; counted, not an error
    Ignored(IgnoreReason),
    /// A pipeline ran
    Processed {
        tag: String,
        phase: Phase,
        outcome: Outcome,
    },
}

impl Disposition {
    /// Metrics label
    pub fn label(&self) -> &'static str {
        match self {
            Disposition::Ignored(reason) => reason.label(),
            Disposition::Processed { outcome, .. } => outcome.label(),
        }
    }

    pub fn is_success(&self) -> bool {
        match self {
            Disposition::Ignored(_) => true,
            Disposition::Processed { outcome, .. } => outcome.is_success(),
        }
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        match self {
            Disposition::Ignored(_) => None,
            Disposition::Processed { outcome, .. } => Some(outcome),
        }
    }
}

/// JSON summary of a handled event
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub ticket_id: u64,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_key: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Report {
    pub fn new(ticket_id: u64, disposition: &Disposition) -> Self {
        let mut report = Self {
            ticket_id,
            status: "ignored",
            tag: None,
            phase: None,
            reason: None,
            issue_key: None,
            steps: Vec::new(),
            failed_step: None,
            error: None,
        };

        match disposition {
            Disposition::Ignored(reason) => {
                report.reason = Some(reason.to_string());
            }
            Disposition::Processed {
                tag,
                phase,
                outcome,
            } => {
                report.status = outcome.label();
                report.tag = Some(tag.clone());
                report.phase = Some(*phase);
                report.issue_key = outcome.issue_key().map(str::to_string);
                report.steps = outcome.steps().to_vec();
                match outcome {
                    Outcome::Completed { .. } => {}
                    Outcome::Aborted { reason, .. } => report.reason = Some(reason.clone()),
                    Outcome::Failed { step, error, .. } => {
                        report.failed_step = Some(*step);
                        report.error = Some(error.to_string());
                    }
                }
            }
        }
        report
    }
}

/// Routes webhook events through the rule registry and step pipeline
#[derive(Debug, Clone)]
pub struct Bridge {
    registry: Arc<RegistryHandle>,
    executor: PipelineExecutor,
}

impl Bridge {
    pub fn new(registry: Arc<RegistryHandle>, trackers: Trackers) -> Self {
        Self {
            registry,
            executor: PipelineExecutor::new(trackers),
        }
    }

    pub fn registry(&self) -> &Arc<RegistryHandle> {
        &self.registry
    }

    pub fn trackers(&self) -> &Trackers {
        self.executor.trackers()
    }

    /// Handle a webhook request.
    ///
    /// Returns an error only when the private-bug refresh fails; pipeline
    /// failures are reported through [`Outcome::Failed`].
    pub async fn handle(&self, request: WebhookRequest) -> Result<Disposition> {
        let span = info_span!(
            "webhook",
            webhook_id = request.webhook_id,
            ticket_id = request.bug.id,
            action = %request.event.action
        );
        self.handle_event(request.into_event()).instrument(span).await
    }

    pub async fn handle_event(&self, mut event: Event) -> Result<Disposition> {
        if !event.is_public() {
            debug!(ticket_id = event.ticket_id(), "Refreshing private bug");
            event.ticket = match self.trackers().upstream.get_ticket(event.ticket_id()).await {
                Ok(ticket) => ticket,
                Err(e) => {
                    metrics::record_event("failed");
                    warn!(ticket_id = event.ticket_id(), error = %e, "Could not fetch private bug");
                    return Err(e.into());
                }
            };
        }

        let disposition = self.dispatch(event).await;
        metrics::record_event(disposition.label());
        Ok(disposition)
    }

    async fn dispatch(&self, event: Event) -> Disposition {
        let registry = self.registry.snapshot();

        let rule = match registry.resolve(event.tag_field()) {
            Resolution::Matched(rule) => rule,
            Resolution::Disabled(tag) => {
                debug!(ticket_id = event.ticket_id(), tag = %tag, "Rule disabled, ignoring");
                return Disposition::Ignored(IgnoreReason::RuleDisabled { tag });
            }
            Resolution::NotFound => {
                debug!(
                    ticket_id = event.ticket_id(),
                    whiteboard = event.tag_field(),
                    "No matching rule, ignoring"
                );
                return Disposition::Ignored(IgnoreReason::NoMatchingRule);
            }
        };

        let phase = match classify(&event, &rule) {
            Classification::Run(phase) => phase,
            Classification::Ignored(reason) => {
                info!(ticket_id = event.ticket_id(), reason = %reason, "Event ignored");
                return Disposition::Ignored(reason);
            }
        };

        let tag = rule.tag.clone();
        let outcome = self.executor.run(phase, rule, event).await;
        Disposition::Processed {
            tag,
            phase,
            outcome,
        }
    }
}
