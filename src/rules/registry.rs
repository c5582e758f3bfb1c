//! Rule registry - resolves which rule governs an event

use super::Rule;
use crate::config::{validate_config_result, BridgeConfig};
use crate::pipeline::StepRegistry;
use crate::Result;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Result of looking up a rule for a tag field
#[derive(Debug, Clone)]
pub enum Resolution {
    /// An enabled rule matched
    Matched(Arc<Rule>),
    /// Only a disabled rule matched (carries its tag)
    Disabled(String),
    /// No rule matched
    NotFound,
}

/// Immutable collection of rules, in configuration order
#[derive(Debug, Default)]
pub struct RuleRegistry {
    rules: Vec<Arc<Rule>>,
}

impl RuleRegistry {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            rules: rules.into_iter().map(Arc::new).collect(),
        }
    }

    /// Validate and compile a rule file
    pub fn from_config(config: &BridgeConfig, steps: &StepRegistry) -> Result<Self> {
        validate_config_result(config, steps)?;
        let rules = config
            .rules
            .iter()
            .map(|rule| Rule::compile(rule, steps))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(rules))
    }

    /// Load, validate and compile a rule file from disk
    pub fn load(path: impl AsRef<Path>, steps: &StepRegistry) -> Result<Self> {
        let registry = Self::from_config(&BridgeConfig::load(path)?, steps)?;
        info!(
            rules = registry.len(),
            enabled = registry.enabled_rules().count(),
            "Rule registry ready"
        );
        Ok(registry)
    }

    /// Find the rule for a raw tag field.
    ///
    /// The first enabled rule (in configuration order) whose tag appears in
    /// the field wins. A match on a disabled rule is reported as
    /// [`Resolution::Disabled`] only when no enabled rule matches.
    pub fn resolve(&self, tag_field: &str) -> Resolution {
        let tokens = extract_tokens(tag_field);
        let mut disabled = None;

        for rule in &self.rules {
            if !tokens.iter().any(|token| token_matches(token, &rule.tag)) {
                continue;
            }
            if rule.enabled {
                debug!(tag = %rule.tag, tag_field, "Rule matched");
                return Resolution::Matched(Arc::clone(rule));
            }
            disabled.get_or_insert_with(|| rule.tag.clone());
        }

        match disabled {
            Some(tag) => Resolution::Disabled(tag),
            None => Resolution::NotFound,
        }
    }

    /// Rule by exact tag (case-insensitive)
    pub fn get(&self, tag: &str) -> Option<Arc<Rule>> {
        self.rules
            .iter()
            .find(|rule| rule.tag.eq_ignore_ascii_case(tag))
            .cloned()
    }

    pub fn rules(&self) -> &[Arc<Rule>] {
        &self.rules
    }

    pub fn enabled_rules(&self) -> impl Iterator<Item = &Arc<Rule>> {
        self.rules.iter().filter(|rule| rule.enabled)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Whitespace/bracket delimited tokens of a tag field
fn extract_tokens(tag_field: &str) -> Vec<&str> {
    tag_field
        .split(|c: char| c.is_whitespace() || c == '[' || c == ']')
        .filter(|token| !token.is_empty())
        .collect()
}

/// A token carries a tag when it is the tag itself or starts with the tag
/// and a dash (`[devtest-foo]`). `[foo-devtest]` does not.
fn token_matches(token: &str, tag: &str) -> bool {
    let token = token.to_lowercase();
    let tag = tag.to_lowercase();
    token == tag || token.starts_with(&format!("{}-", tag))
}

/// Shared, atomically replaceable registry
///
/// Readers take a snapshot per request; a reload swaps the whole registry,
/// so in-flight runs keep the rules they started with.
#[derive(Debug)]
pub struct RegistryHandle {
    current: RwLock<Arc<RuleRegistry>>,
}

impl RegistryHandle {
    pub fn new(registry: RuleRegistry) -> Self {
        crate::metrics::set_rules_loaded(registry.len());
        Self {
            current: RwLock::new(Arc::new(registry)),
        }
    }

    /// Current registry
    pub fn snapshot(&self) -> Arc<RuleRegistry> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Replace the registry as a unit
    pub fn replace(&self, registry: RuleRegistry) {
        let count = registry.len();
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(registry);
        crate::metrics::set_rules_loaded(count);
        info!(rules = count, "Rule registry replaced");
    }
}
