//! Configuration system
//!
//! - Rule file (YAML): whiteboard tag → Jira project and step pipeline
//! - Load-time validation of the rule file
//! - Process settings from CLI arguments and environment

mod bridge_config;
mod settings;
pub mod validation;

pub use bridge_config::{
    default_issue_type_map, BridgeConfig, JiraComponents, LabelsBrackets, Owner, RuleConfig,
    StatusPrecedence, StepsConfig, UNKNOWN_OWNER_SENTINELS,
};
pub use settings::Settings;
pub use validation::{config_warnings, validate_config, validate_config_result, ValidationError};
