//! Step pipeline executor
//!
//! Runs a rule's steps for one phase strictly in order. A step that aborts
//! ends the run successfully; a step that fails ends it with the step name
//! and error. Nothing is retried and nothing already applied is rolled back.

use super::steps::StepStatus;
use super::{ActionContext, Phase};
use crate::integrations::Trackers;
use crate::metrics;
use crate::rules::Rule;
use crate::tracker::Event;
use crate::BridgeError;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};

/// Result of one executed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub step: &'static str,
    pub status: &'static str,
    pub duration_ms: u64,
}

/// How a pipeline run ended
#[derive(Debug)]
pub enum Outcome {
    /// Every step ran
    Completed {
        issue_key: Option<String>,
        steps: Vec<StepRecord>,
    },
    /// A step short-circuited the run; treated as success
    Aborted {
        step: &'static str,
        reason: String,
        issue_key: Option<String>,
        steps: Vec<StepRecord>,
    },
    /// A step failed; earlier side effects remain
    Failed {
        step: &'static str,
        error: BridgeError,
        issue_key: Option<String>,
        steps: Vec<StepRecord>,
    },
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Completed { .. } => "completed",
            Outcome::Aborted { .. } => "aborted",
            Outcome::Failed { .. } => "failed",
        }
    }

    /// Completed or aborted
    pub fn is_success(&self) -> bool {
        !matches!(self, Outcome::Failed { .. })
    }

    pub fn steps(&self) -> &[StepRecord] {
        match self {
            Outcome::Completed { steps, .. }
            | Outcome::Aborted { steps, .. }
            | Outcome::Failed { steps, .. } => steps,
        }
    }

    pub fn issue_key(&self) -> Option<&str> {
        match self {
            Outcome::Completed { issue_key, .. }
            | Outcome::Aborted { issue_key, .. }
            | Outcome::Failed { issue_key, .. } => issue_key.as_deref(),
        }
    }
}

/// Runs step pipelines against a set of tracker clients
#[derive(Debug, Clone)]
pub struct PipelineExecutor {
    trackers: Trackers,
}

impl PipelineExecutor {
    pub fn new(trackers: Trackers) -> Self {
        Self { trackers }
    }

    pub fn trackers(&self) -> &Trackers {
        &self.trackers
    }

    /// Run `rule`'s steps for `phase` against `event`
    pub async fn run(&self, phase: Phase, rule: Arc<Rule>, event: Event) -> Outcome {
        let span = info_span!(
            "pipeline",
            ticket_id = event.ticket_id(),
            tag = %rule.tag,
            phase = %phase
        );
        let tag = rule.tag.clone();
        let started = Instant::now();

        let outcome = self.run_steps(phase, rule, event).instrument(span).await;

        metrics::record_pipeline(
            &tag,
            phase.as_str(),
            outcome.label(),
            started.elapsed().as_secs_f64(),
        );
        outcome
    }

    async fn run_steps(&self, phase: Phase, rule: Arc<Rule>, event: Event) -> Outcome {
        let steps = rule.steps_for(phase).to_vec();
        let mut ctx = ActionContext::new(event, rule, phase);
        let mut records = Vec::with_capacity(steps.len());

        for step in steps {
            let name = step.name();
            let issue_key = ctx.issue_key.clone();
            let started = Instant::now();

            let result = step
                .run(ctx, &self.trackers)
                .instrument(info_span!("step", step = name))
                .await;

            let elapsed = started.elapsed();
            let (next, status) = match result {
                Ok(done) => done,
                Err(error) => {
                    metrics::record_step(name, "failed", elapsed.as_secs_f64());
                    warn!(step = name, error = %error, "Step failed");
                    return Outcome::Failed {
                        step: name,
                        error,
                        issue_key,
                        steps: records,
                    };
                }
            };

            metrics::record_step(name, status.label(), elapsed.as_secs_f64());
            records.push(StepRecord {
                step: name,
                status: status.label(),
                duration_ms: elapsed.as_millis() as u64,
            });
            ctx = next;

            if let StepStatus::Abort(reason) = status {
                info!(step = name, reason = %reason, "Pipeline aborted");
                return Outcome::Aborted {
                    step: name,
                    reason,
                    issue_key: ctx.issue_key,
                    steps: records,
                };
            }
        }

        info!(issue_key = ?ctx.issue_key, steps = records.len(), "Pipeline completed");
        Outcome::Completed {
            issue_key: ctx.issue_key,
            steps: records,
        }
    }
}
