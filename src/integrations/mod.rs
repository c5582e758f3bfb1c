//! External integrations
//!
//! The pipeline talks to Bugzilla and Jira only through the
//! [`UpstreamTracker`] and [`DownstreamTracker`] traits. The REST adapters in
//! [`bugzilla`] and [`jira`] implement them; tests use in-memory fakes.
//!
//! Adapters own transport concerns: authentication, timeouts and retry with
//! backoff ([`retry`]). Errors surface as [`TrackerError`].

pub mod bugzilla;
pub mod jira;
pub mod retry;

pub use bugzilla::BugzillaAdapter;
pub use jira::JiraAdapter;
pub use retry::{with_retry, RetryConfig, RetryDecision, RetryableError};

use crate::error::{Tracker, TrackerError};
use crate::tracker::{Ticket, TicketComment};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result type for tracker calls
pub type TrackerResult<T> = std::result::Result<T, TrackerError>;

/// Fields for a new Jira issue
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct NewIssue {
    pub summary: String,
    pub description: String,
    pub issue_type: String,
    pub labels: Vec<String>,
}

/// Partial update of a Jira issue
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct IssueUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels_add: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels_remove: Vec<String>,
}

impl IssueUpdate {
    pub fn is_empty(&self) -> bool {
        self.summary.is_none() && self.labels_add.is_empty() && self.labels_remove.is_empty()
    }
}

/// Jira user, as found by email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownstreamUser {
    pub account_id: String,
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Component defined on a Jira project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectComponent {
    pub id: String,
    pub name: String,
}

/// Bugzilla operations the bridge needs
#[async_trait]
pub trait UpstreamTracker: Send + Sync {
    /// Fetch the current state of a bug
    async fn get_ticket(&self, id: u64) -> TrackerResult<Ticket>;

    /// Comments of a bug, oldest first
    async fn get_comments(&self, id: u64) -> TrackerResult<Vec<TicketComment>>;

    /// Add a URL to the bug's `see_also` list
    async fn set_back_reference(&self, id: u64, url: &str) -> TrackerResult<()>;

    async fn add_comment(&self, id: u64, text: &str) -> TrackerResult<()>;

    /// Cheap reachability/auth check for heartbeats
    async fn ping(&self) -> TrackerResult<()>;
}

/// Jira operations the bridge needs
#[async_trait]
pub trait DownstreamTracker: Send + Sync {
    /// Create an issue and return its key
    async fn create_issue(&self, project_key: &str, issue: &NewIssue) -> TrackerResult<String>;

    async fn update_issue(&self, issue_key: &str, update: &IssueUpdate) -> TrackerResult<()>;

    async fn delete_issue(&self, issue_key: &str) -> TrackerResult<()>;

    async fn add_comment(&self, issue_key: &str, text: &str) -> TrackerResult<()>;

    /// Attach a remote link (web link) to the issue
    async fn add_remote_link(&self, issue_key: &str, url: &str, title: &str) -> TrackerResult<()>;

    /// Set the assignee; `None` clears it
    async fn set_assignee(
        &self,
        issue_key: &str,
        user: Option<&DownstreamUser>,
    ) -> TrackerResult<()>;

    async fn find_user_by_email(&self, email: &str) -> TrackerResult<Option<DownstreamUser>>;

    /// Move the issue to the named status
    async fn set_status(&self, issue_key: &str, status: &str) -> TrackerResult<()>;

    async fn set_resolution(&self, issue_key: &str, resolution: &str) -> TrackerResult<()>;

    /// Components defined on a project
    async fn project_components(&self, project_key: &str) -> TrackerResult<Vec<ProjectComponent>>;

    /// Replace the issue's components with the given component ids
    async fn set_components(&self, issue_key: &str, component_ids: &[String]) -> TrackerResult<()>;

    async fn ping(&self) -> TrackerResult<()>;
}

/// Tracker clients plus the public URLs used for back-references
#[derive(Clone)]
pub struct Trackers {
    pub upstream: Arc<dyn UpstreamTracker>,
    pub downstream: Arc<dyn DownstreamTracker>,
    jira_base_url: String,
    bugzilla_base_url: String,
}

impl Trackers {
    pub fn new(
        upstream: Arc<dyn UpstreamTracker>,
        downstream: Arc<dyn DownstreamTracker>,
        jira_base_url: impl Into<String>,
        bugzilla_base_url: impl Into<String>,
    ) -> Self {
        Self {
            upstream,
            downstream,
            jira_base_url: jira_base_url.into().trim_end_matches('/').to_string(),
            bugzilla_base_url: bugzilla_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Jira page of an issue, stored on the bug as its back-reference
    pub fn jira_issue_url(&self, issue_key: &str) -> String {
        format!("{}/browse/{}", self.jira_base_url, issue_key)
    }

    /// Bugzilla page of a bug, attached to the issue as a remote link
    pub fn bugzilla_bug_url(&self, ticket_id: u64) -> String {
        format!("{}/show_bug.cgi?id={}", self.bugzilla_base_url, ticket_id)
    }
}

/// Seconds to wait when a 429 carries no usable `Retry-After`
const DEFAULT_RETRY_AFTER: u64 = 60;

/// Map a non-success HTTP response to a [`TrackerError`]
pub(crate) async fn check_response(
    tracker: Tracker,
    response: reqwest::Response,
    resource: &str,
) -> TrackerResult<reqwest::Response> {
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(TrackerError::Auth {
            tracker,
            message: format!("HTTP {} for {}", response.status().as_u16(), resource),
        }),
        StatusCode::NOT_FOUND => Err(TrackerError::NotFound {
            tracker,
            resource: resource.to_string(),
        }),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER);
            Err(TrackerError::RateLimited {
                tracker,
                retry_after,
            })
        }
        status => {
            let body = response.text().await.unwrap_or_default();
            Err(TrackerError::Api {
                tracker,
                status: status.as_u16(),
                body,
            })
        }
    }
}

/// Decode a JSON body, reporting shape mismatches as malformed responses
pub(crate) async fn decode_json<T: serde::de::DeserializeOwned>(
    tracker: Tracker,
    response: reqwest::Response,
) -> TrackerResult<T> {
    response
        .json()
        .await
        .map_err(|e| TrackerError::Malformed {
            tracker,
            message: e.to_string(),
        })
}

/// Run a tracker call with retry and count it
pub(crate) async fn instrumented<T, F, Fut>(
    tracker: Tracker,
    method: &'static str,
    retry: &RetryConfig,
    operation: F,
) -> TrackerResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = TrackerResult<T>>,
{
    let operation_name = format!("{}.{}", tracker, method);
    let result = with_retry(retry, &operation_name, operation).await;
    let label = match &result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    crate::metrics::record_tracker_call(tracker.as_str(), method, label);
    result
}

impl std::fmt::Debug for Trackers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trackers")
            .field("jira_base_url", &self.jira_base_url)
            .field("bugzilla_base_url", &self.bugzilla_base_url)
            .finish_non_exhaustive()
    }
}
