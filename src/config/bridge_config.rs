//! Rule file handling
//!
//! Loads the YAML rule file (`config.yaml`) that binds whiteboard tags to
//! Jira projects and step pipelines.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Owner sentinel values that only produce a warning
pub const UNKNOWN_OWNER_SENTINELS: [&str; 2] = ["unknown", "tbd"];

/// Accountable human(s) for a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Owner {
    /// Single Bugzilla user id
    Id(u64),
    /// Several Bugzilla user ids
    Ids(Vec<u64>),
    /// `"unknown"` or `"tbd"`; any other string is rejected by validation
    Sentinel(String),
}

impl Owner {
    pub fn is_unknown(&self) -> bool {
        match self {
            Owner::Id(_) => false,
            Owner::Ids(ids) => ids.is_empty(),
            Owner::Sentinel(_) => true,
        }
    }

    pub fn ids(&self) -> Vec<u64> {
        match self {
            Owner::Id(id) => vec![*id],
            Owner::Ids(ids) => ids.clone(),
            Owner::Sentinel(_) => Vec::new(),
        }
    }
}

impl Default for Owner {
    fn default() -> Self {
        Owner::Sentinel("unknown".to_string())
    }
}

/// How whiteboard entries are turned into Jira labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelsBrackets {
    /// `devtest`
    No,
    /// `[devtest]`
    Yes,
    /// both of the above
    #[default]
    Both,
}

/// Which upstream field drives the Jira status when both are set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusPrecedence {
    /// Use the resolution when the bug has one, else the status
    #[default]
    Resolution,
    /// Use the status when the bug has one, else the resolution
    Status,
}

/// Per-phase step lists; an omitted phase uses the built-in default
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<Vec<String>>,
}

impl StepsConfig {
    /// Every configured step name, with the phase it was listed under
    pub fn configured(&self) -> Vec<(&'static str, &str)> {
        let phases = [
            ("new", &self.new),
            ("existing", &self.existing),
            ("comment", &self.comment),
        ];
        phases
            .into_iter()
            .flat_map(|(phase, names)| {
                names
                    .iter()
                    .flatten()
                    .map(move |name| (phase, name.as_str()))
            })
            .collect()
    }
}

/// Which bug fields `maybe_update_components` turns into Jira components
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JiraComponents {
    /// The bug's component (`General`)
    #[serde(default = "default_true")]
    pub use_bug_component: bool,
    /// The bug's product (`Core`)
    #[serde(default)]
    pub use_bug_product: bool,
    /// Product and component together (`Core::General`)
    #[serde(default)]
    pub use_bug_component_with_product_prefix: bool,
    /// Component names set on every issue
    #[serde(default)]
    pub set_custom_components: Vec<String>,
}

impl Default for JiraComponents {
    fn default() -> Self {
        Self {
            use_bug_component: true,
            use_bug_product: false,
            use_bug_component_with_product_prefix: false,
            set_custom_components: Vec::new(),
        }
    }
}

/// One rule as written in the YAML file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    /// Whiteboard tag that selects this rule
    pub tag: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub allow_private: bool,

    #[serde(default)]
    pub owner: Owner,

    #[serde(alias = "downstream_project_key")]
    pub jira_project_key: String,

    #[serde(default)]
    pub steps: StepsConfig,

    #[serde(default)]
    pub status_map: BTreeMap<String, String>,

    #[serde(default)]
    pub resolution_map: BTreeMap<String, String>,

    #[serde(default = "default_true")]
    pub sync_whiteboard_labels: bool,

    #[serde(default)]
    pub extra_labels: Vec<String>,

    #[serde(default = "default_issue_type_map")]
    pub issue_type_map: BTreeMap<String, String>,

    #[serde(default)]
    pub labels_brackets: LabelsBrackets,

    #[serde(default)]
    pub status_precedence: StatusPrecedence,

    #[serde(default)]
    pub jira_components: JiraComponents,
}

fn default_true() -> bool {
    true
}

/// Bugzilla bug type to Jira issue type
pub fn default_issue_type_map() -> BTreeMap<String, String> {
    [("defect", "Bug"), ("enhancement", "Task"), ("task", "Task")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl RuleConfig {
    /// Minimal enabled rule with default steps and maps
    pub fn new(tag: impl Into<String>, jira_project_key: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            description: String::new(),
            enabled: true,
            allow_private: false,
            owner: Owner::default(),
            jira_project_key: jira_project_key.into(),
            steps: StepsConfig::default(),
            status_map: BTreeMap::new(),
            resolution_map: BTreeMap::new(),
            sync_whiteboard_labels: true,
            extra_labels: Vec::new(),
            issue_type_map: default_issue_type_map(),
            labels_brackets: LabelsBrackets::default(),
            status_precedence: StatusPrecedence::default(),
            jira_components: JiraComponents::default(),
        }
    }
}

/// Complete rule file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub rules: Vec<RuleConfig>,
}

impl BridgeConfig {
    /// Parse a rule file from YAML text
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load the rule file from disk (unvalidated)
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            crate::BridgeError::Config(format!(
                "Failed to read rule file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config = Self::from_yaml_str(&content)?;
        tracing::info!(
            path = %path.display(),
            rules = config.rules.len(),
            "Loaded rule file"
        );
        Ok(config)
    }

    /// Tags of all rules, in file order
    pub fn tags(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.tag.as_str()).collect()
    }
}
