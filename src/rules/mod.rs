//! Synchronization rules
//!
//! A [`Rule`] is the compiled, immutable form of a [`RuleConfig`]: its step
//! names are resolved against the [`StepRegistry`] once, at load time, so
//! request handling only ever walks pre-built step lists.

mod registry;

pub use registry::{RegistryHandle, Resolution, RuleRegistry};

use crate::config::{JiraComponents, LabelsBrackets, Owner, RuleConfig, StatusPrecedence};
use crate::pipeline::steps::default_step_names;
use crate::pipeline::{Phase, Step, StepRegistry};
use crate::{BridgeError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Resolved step lists for the three phases
#[derive(Clone)]
pub struct StepPlan {
    new: Vec<Arc<dyn Step>>,
    existing: Vec<Arc<dyn Step>>,
    comment: Vec<Arc<dyn Step>>,
}

impl StepPlan {
    /// Resolve configured names (or the phase default) against the registry
    pub fn resolve(config: &crate::config::StepsConfig, registry: &StepRegistry) -> Result<Self> {
        let lookup = |phase: Phase, configured: &Option<Vec<String>>| -> Result<Vec<Arc<dyn Step>>> {
            let names: Vec<&str> = match configured {
                Some(names) => names.iter().map(String::as_str).collect(),
                None => default_step_names(phase).to_vec(),
            };
            names
                .into_iter()
                .map(|name| {
                    registry.get(name).ok_or_else(|| {
                        BridgeError::Config(format!(
                            "Unknown step '{}' in phase '{}'",
                            name, phase
                        ))
                    })
                })
                .collect()
        };

        Ok(Self {
            new: lookup(Phase::New, &config.new)?,
            existing: lookup(Phase::Existing, &config.existing)?,
            comment: lookup(Phase::Comment, &config.comment)?,
        })
    }

    pub fn for_phase(&self, phase: Phase) -> &[Arc<dyn Step>] {
        match phase {
            Phase::New => &self.new,
            Phase::Existing => &self.existing,
            Phase::Comment => &self.comment,
        }
    }

    pub fn names(&self, phase: Phase) -> Vec<&'static str> {
        self.for_phase(phase).iter().map(|s| s.name()).collect()
    }
}

impl std::fmt::Debug for StepPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepPlan")
            .field("new", &self.names(Phase::New))
            .field("existing", &self.names(Phase::Existing))
            .field("comment", &self.names(Phase::Comment))
            .finish()
    }
}

/// One synchronization policy
#[derive(Debug, Clone)]
pub struct Rule {
    pub tag: String,
    pub description: String,
    pub enabled: bool,
    pub allow_private: bool,
    pub owner: Owner,
    pub project_key: String,
    pub steps: StepPlan,
    pub status_map: BTreeMap<String, String>,
    pub resolution_map: BTreeMap<String, String>,
    pub sync_whiteboard_labels: bool,
    pub extra_labels: Vec<String>,
    pub issue_type_map: BTreeMap<String, String>,
    pub labels_brackets: LabelsBrackets,
    pub status_precedence: StatusPrecedence,
    pub jira_components: JiraComponents,
}

impl Rule {
    /// Compile a (validated) rule config
    pub fn compile(config: &RuleConfig, registry: &StepRegistry) -> Result<Self> {
        Ok(Self {
            tag: config.tag.clone(),
            description: config.description.clone(),
            enabled: config.enabled,
            allow_private: config.allow_private,
            owner: config.owner.clone(),
            project_key: config.jira_project_key.clone(),
            steps: StepPlan::resolve(&config.steps, registry)?,
            status_map: config.status_map.clone(),
            resolution_map: config.resolution_map.clone(),
            sync_whiteboard_labels: config.sync_whiteboard_labels,
            extra_labels: config.extra_labels.clone(),
            issue_type_map: config.issue_type_map.clone(),
            labels_brackets: config.labels_brackets,
            status_precedence: config.status_precedence,
            jira_components: config.jira_components.clone(),
        })
    }

    /// Ordered steps for a phase
    pub fn steps_for(&self, phase: Phase) -> &[Arc<dyn Step>] {
        self.steps.for_phase(phase)
    }
}
