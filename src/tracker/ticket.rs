//! Bugzilla bug as delivered by webhooks and the REST API

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;
use url::Url;

/// Assignee value Bugzilla uses for unassigned bugs
pub const UNASSIGNED_EMAIL: &str = "nobody@mozilla.org";

/// Host labels identifying a Jira URL in `see_also`
const JIRA_HOST_LABELS: [&str; 2] = ["jira", "atlassian"];

/// Bugzilla sends `null` for several list/bool fields
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Comment attached to a webhook payload (only set for comment events)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookComment {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub number: Option<u64>,
    #[serde(default)]
    pub is_private: Option<bool>,
}

/// Comment as returned by `GET /rest/bug/{id}/comment`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketComment {
    pub id: u64,
    pub text: String,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub creator: String,
}

/// A Bugzilla bug
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_private: bool,
    #[serde(rename = "type", default)]
    pub bug_type: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default)]
    pub whiteboard: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub see_also: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub comment: Option<WebhookComment>,
}

impl Ticket {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// Whether a real user is assigned
    pub fn is_assigned(&self) -> bool {
        match self.assigned_to.as_deref() {
            Some(email) => !email.is_empty() && email != UNASSIGNED_EMAIL,
            None => false,
        }
    }

    /// Status, or the empty string when Bugzilla sent none
    pub fn status_str(&self) -> &str {
        self.status.as_deref().unwrap_or("")
    }

    /// Resolution, or the empty string while the bug is open
    pub fn resolution_str(&self) -> &str {
        self.resolution.as_deref().unwrap_or("")
    }

    /// Component prefixed with its product, as Bugzilla shows it
    /// (`Core::General`)
    pub fn product_component(&self) -> Option<String> {
        let product = self.product.as_deref().filter(|p| !p.is_empty());
        let component = self.component.as_deref().filter(|c| !c.is_empty());
        match (product, component) {
            (Some(product), Some(component)) => Some(format!("{}::{}", product, component)),
            (Some(product), None) => Some(format!("{}::", product)),
            (None, Some(component)) => Some(component.to_string()),
            (None, None) => None,
        }
    }

    /// Key of the Jira issue this bug links to, if any.
    ///
    /// The first `see_also` URL whose host has a `jira` or `atlassian` label
    /// wins; its last non-empty path segment is the key.
    pub fn linked_issue_key(&self) -> Option<String> {
        self.see_also.iter().find_map(|raw| {
            let parsed = match Url::parse(raw) {
                Ok(u) => u,
                Err(_) => {
                    debug!(ticket_id = self.id, url = %raw, "see_also entry is not a URL");
                    return None;
                }
            };
            let host = parsed.host_str()?;
            if !host.split('.').any(|label| JIRA_HOST_LABELS.contains(&label)) {
                return None;
            }
            parsed
                .path_segments()?
                .filter(|segment| !segment.is_empty())
                .last()
                .map(str::to_string)
        })
    }
}
