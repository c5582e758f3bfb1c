//! Rule file validation
//!
//! Runs at the load boundary, before any rule enters the registry:
//! - At least one rule, no duplicate tags (case-insensitive)
//! - Every configured step exists in the step registry
//! - Project keys, map entries and labels are non-empty
//! - Owners are ids or a known sentinel

use super::bridge_config::{BridgeConfig, Owner, RuleConfig, UNKNOWN_OWNER_SENTINELS};
use crate::pipeline::StepRegistry;
use crate::BridgeError;
use std::collections::{BTreeMap, HashSet};

/// Validation error details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub rule: Option<String>,
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule: None,
            field: field.into(),
            message: message.into(),
        }
    }

    fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref rule) = self.rule {
            write!(f, "[{}] {}: {}", rule, self.field, self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

/// Validation result
pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

/// Validate a rule file against the available steps
pub fn validate_config(config: &BridgeConfig, steps: &StepRegistry) -> ValidationResult {
    let mut errors = Vec::new();

    if config.rules.is_empty() {
        errors.push(ValidationError::new(
            "rules",
            "At least one rule must be defined",
        ));
    }

    let mut seen_tags = HashSet::new();
    for rule in &config.rules {
        if !rule.tag.is_empty() && !seen_tags.insert(rule.tag.to_lowercase()) {
            errors.push(ValidationError::new(
                "rules",
                format!("Duplicate rule tag: {}", rule.tag),
            ));
        }
    }

    for rule in &config.rules {
        if let Err(mut rule_errors) = validate_rule(rule, steps) {
            errors.append(&mut rule_errors);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a single rule
fn validate_rule(rule: &RuleConfig, steps: &StepRegistry) -> ValidationResult {
    let mut errors = Vec::new();
    let name = rule.tag.as_str();

    if rule.tag.trim().is_empty() {
        errors.push(ValidationError::new("tag", "Rule tag cannot be empty").with_rule(name));
    } else if rule
        .tag
        .chars()
        .any(|c| c.is_whitespace() || c == '[' || c == ']')
    {
        errors.push(
            ValidationError::new(
                "tag",
                format!("Tag '{}' cannot contain whitespace or brackets", rule.tag),
            )
            .with_rule(name),
        );
    }

    if rule.jira_project_key.trim().is_empty() {
        errors.push(
            ValidationError::new("jira_project_key", "Project key cannot be empty")
                .with_rule(name),
        );
    }

    for (phase, step) in rule.steps.configured() {
        if !steps.contains(step) {
            errors.push(
                ValidationError::new(
                    format!("steps.{}", phase),
                    format!(
                        "Unknown step '{}'. Available: {}",
                        step,
                        steps.names().join(", ")
                    ),
                )
                .with_rule(name),
            );
        }
    }

    validate_map("status_map", &rule.status_map, name, &mut errors);
    validate_map("resolution_map", &rule.resolution_map, name, &mut errors);
    validate_map("issue_type_map", &rule.issue_type_map, name, &mut errors);

    for label in &rule.extra_labels {
        if label.trim().is_empty() || label.contains(char::is_whitespace) {
            errors.push(
                ValidationError::new(
                    "extra_labels",
                    format!("Invalid label '{}': labels cannot be empty or contain spaces", label),
                )
                .with_rule(name),
            );
        }
    }

    if let Owner::Sentinel(value) = &rule.owner {
        if !UNKNOWN_OWNER_SENTINELS.contains(&value.to_lowercase().as_str()) {
            errors.push(
                ValidationError::new(
                    "owner",
                    format!(
                        "Invalid owner '{}'. Must be a user id, a list of ids, or one of: {}",
                        value,
                        UNKNOWN_OWNER_SENTINELS.join(", ")
                    ),
                )
                .with_rule(name),
            );
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_map(
    field: &str,
    map: &BTreeMap<String, String>,
    rule: &str,
    errors: &mut Vec<ValidationError>,
) {
    for (key, value) in map {
        if key.trim().is_empty() || value.trim().is_empty() {
            errors.push(
                ValidationError::new(
                    field,
                    format!("Entry '{}: {}' has an empty key or value", key, value),
                )
                .with_rule(rule),
            );
        }
    }
}

/// Non-fatal findings (rules without an accountable owner)
pub fn config_warnings(config: &BridgeConfig) -> Vec<ValidationError> {
    config
        .rules
        .iter()
        .filter(|rule| rule.owner.is_unknown())
        .map(|rule| {
            ValidationError::new("owner", "Rule has no known owner").with_rule(&rule.tag)
        })
        .collect()
}

/// Validate and convert to crate Result type, logging warnings
pub fn validate_config_result(config: &BridgeConfig, steps: &StepRegistry) -> crate::Result<()> {
    for warning in config_warnings(config) {
        tracing::warn!(%warning, "Rule configuration warning");
    }

    validate_config(config, steps).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        BridgeError::Config(format!(
            "Invalid rule configuration:\n  - {}",
            messages.join("\n  - ")
        ))
    })
}
