//! Jira REST adapter
//!
//! Implements [`DownstreamTracker`] over the Jira REST API v2 (wiki markup
//! bodies). Authenticates with basic auth when a username is configured and
//! with a bearer token otherwise.

use super::retry::RetryConfig;
use super::{
    check_response, decode_json, instrumented, DownstreamTracker, DownstreamUser, IssueUpdate,
    NewIssue, ProjectComponent, TrackerResult,
};
use crate::error::{Tracker, TrackerError};
use crate::Result;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

/// Per-request timeout for reads
const GET_TIMEOUT: Duration = Duration::from_secs(10);
/// Per-request timeout for create/update operations
const WRITE_TIMEOUT: Duration = Duration::from_secs(15);

const TRACKER: Tracker = Tracker::Jira;

/// Jira API client
pub struct JiraAdapter {
    client: Client,
    base_url: String,
    username: Option<String>,
    api_key: String,
    retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct CreatedIssue {
    key: String,
}

#[derive(Debug, Clone, Deserialize)]
struct JiraUser {
    #[serde(rename = "accountId")]
    account_id: String,
    #[serde(rename = "displayName", default)]
    display_name: String,
    #[serde(rename = "emailAddress", default)]
    email: Option<String>,
    #[serde(default = "default_active")]
    active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
struct JiraComponent {
    id: String,
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct JiraStatus {
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct JiraTransition {
    id: String,
    name: String,
    to: JiraStatus,
}

#[derive(Debug, Clone, Deserialize)]
struct JiraTransitionsResponse {
    transitions: Vec<JiraTransition>,
}

impl JiraAdapter {
    /// Create a new Jira adapter
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(
        base_url: &str,
        username: Option<String>,
        api_key: impl Into<String>,
        retry: RetryConfig,
    ) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            base_url: format!("{}/rest/api/2", base_url.trim_end_matches('/')),
            username,
            api_key: api_key.into(),
            retry,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.username {
            Some(username) => request.basic_auth(username, Some(&self.api_key)),
            None => request.bearer_auth(&self.api_key),
        }
    }

    async fn transitions(&self, issue_key: &str) -> TrackerResult<Vec<JiraTransition>> {
        let path = format!("/issue/{}/transitions", issue_key);
        let response = self
            .request(Method::GET, &path)
            .timeout(GET_TIMEOUT)
            .send()
            .await?;
        let response = check_response(TRACKER, response, &format!("issue {}", issue_key)).await?;
        let body: JiraTransitionsResponse = decode_json(TRACKER, response).await?;
        Ok(body.transitions)
    }

    async fn send_write(
        &self,
        method: Method,
        path: &str,
        body: &Value,
        resource: &str,
    ) -> TrackerResult<()> {
        let response = self
            .request(method, path)
            .json(body)
            .timeout(WRITE_TIMEOUT)
            .send()
            .await?;
        check_response(TRACKER, response, resource).await?;
        Ok(())
    }
}

/// Pick the transition leading to `status` (by target status, then by name)
fn find_transition<'a>(
    transitions: &'a [JiraTransition],
    status: &str,
) -> Option<&'a JiraTransition> {
    transitions
        .iter()
        .find(|t| t.to.name.eq_ignore_ascii_case(status))
        .or_else(|| transitions.iter().find(|t| t.name.eq_ignore_ascii_case(status)))
}

fn components_fields(component_ids: &[String]) -> Value {
    let components: Vec<Value> = component_ids.iter().map(|id| json!({ "id": id })).collect();
    json!({ "fields": { "components": components } })
}

fn labels_update(update: &IssueUpdate) -> Vec<Value> {
    update
        .labels_add
        .iter()
        .map(|label| json!({ "add": label }))
        .chain(update.labels_remove.iter().map(|label| json!({ "remove": label })))
        .collect()
}

#[async_trait]
impl DownstreamTracker for JiraAdapter {
    async fn create_issue(&self, project_key: &str, issue: &NewIssue) -> TrackerResult<String> {
        let body = json!({
            "fields": {
                "project": { "key": project_key },
                "summary": issue.summary,
                "description": issue.description,
                "issuetype": { "name": issue.issue_type },
                "labels": issue.labels,
            }
        });
        let body = &body;

        instrumented(TRACKER, "create_issue", &self.retry, || async move {
            let response = self
                .request(Method::POST, "/issue")
                .json(body)
                .timeout(WRITE_TIMEOUT)
                .send()
                .await?;
            let response = check_response(TRACKER, response, project_key).await?;
            let created: CreatedIssue = decode_json(TRACKER, response).await?;
            info!(key = %created.key, project = project_key, "Created Jira issue");
            Ok(created.key)
        })
        .await
    }

    async fn update_issue(&self, issue_key: &str, update: &IssueUpdate) -> TrackerResult<()> {
        let mut body = json!({});
        if let Some(summary) = &update.summary {
            body["fields"] = json!({ "summary": summary });
        }
        let labels = labels_update(update);
        if !labels.is_empty() {
            body["update"] = json!({ "labels": labels });
        }
        let path = format!("/issue/{}", issue_key);
        let (body, path) = (&body, path.as_str());

        instrumented(TRACKER, "update_issue", &self.retry, || async move {
            self.send_write(Method::PUT, path, body, issue_key).await
        })
        .await
    }

    async fn delete_issue(&self, issue_key: &str) -> TrackerResult<()> {
        let path = format!("/issue/{}", issue_key);
        let path = path.as_str();

        instrumented(TRACKER, "delete_issue", &self.retry, || async move {
            let response = self
                .request(Method::DELETE, path)
                .timeout(WRITE_TIMEOUT)
                .send()
                .await?;
            check_response(TRACKER, response, issue_key).await?;
            info!(key = issue_key, "Deleted Jira issue");
            Ok(())
        })
        .await
    }

    async fn add_comment(&self, issue_key: &str, text: &str) -> TrackerResult<()> {
        let path = format!("/issue/{}/comment", issue_key);
        let body = json!({ "body": text });
        let (body, path) = (&body, path.as_str());

        instrumented(TRACKER, "add_comment", &self.retry, || async move {
            self.send_write(Method::POST, path, body, issue_key).await
        })
        .await
    }

    async fn add_remote_link(&self, issue_key: &str, url: &str, title: &str) -> TrackerResult<()> {
        let path = format!("/issue/{}/remotelink", issue_key);
        let body = json!({ "globalId": url, "object": { "url": url, "title": title } });
        let (body, path) = (&body, path.as_str());

        instrumented(TRACKER, "add_remote_link", &self.retry, || async move {
            self.send_write(Method::POST, path, body, issue_key).await
        })
        .await
    }

    async fn set_assignee(
        &self,
        issue_key: &str,
        user: Option<&DownstreamUser>,
    ) -> TrackerResult<()> {
        let path = format!("/issue/{}/assignee", issue_key);
        let body = json!({ "accountId": user.map(|u| u.account_id.as_str()) });
        let (body, path) = (&body, path.as_str());

        instrumented(TRACKER, "set_assignee", &self.retry, || async move {
            self.send_write(Method::PUT, path, body, issue_key).await
        })
        .await
    }

    async fn find_user_by_email(&self, email: &str) -> TrackerResult<Option<DownstreamUser>> {
        instrumented(TRACKER, "find_user_by_email", &self.retry, || async move {
            let response = self
                .request(Method::GET, "/user/search")
                .query(&[("query", email)])
                .timeout(GET_TIMEOUT)
                .send()
                .await?;
            let response = check_response(TRACKER, response, "user search").await?;
            let users: Vec<JiraUser> = decode_json(TRACKER, response).await?;

            let found = users
                .into_iter()
                .filter(|u| u.active)
                .find(|u| {
                    u.email
                        .as_deref()
                        .map(|e| e.eq_ignore_ascii_case(email))
                        .unwrap_or(true)
                })
                .map(|u| DownstreamUser {
                    account_id: u.account_id,
                    display_name: u.display_name,
                    email: u.email,
                });
            debug!(found = found.is_some(), "Jira user lookup");
            Ok(found)
        })
        .await
    }

    async fn set_status(&self, issue_key: &str, status: &str) -> TrackerResult<()> {
        let path = format!("/issue/{}/transitions", issue_key);
        let path = path.as_str();

        instrumented(TRACKER, "set_status", &self.retry, || async move {
            let transitions = self.transitions(issue_key).await?;
            let transition = find_transition(&transitions, status).ok_or_else(|| {
                TrackerError::NotFound {
                    tracker: TRACKER,
                    resource: format!("transition to '{}' on {}", status, issue_key),
                }
            })?;
            let body = json!({ "transition": { "id": transition.id } });
            self.send_write(Method::POST, path, &body, issue_key).await?;
            info!(key = issue_key, status, "Transitioned Jira issue");
            Ok(())
        })
        .await
    }

    async fn set_resolution(&self, issue_key: &str, resolution: &str) -> TrackerResult<()> {
        let path = format!("/issue/{}", issue_key);
        let body = json!({ "fields": { "resolution": { "name": resolution } } });
        let (body, path) = (&body, path.as_str());

        instrumented(TRACKER, "set_resolution", &self.retry, || async move {
            self.send_write(Method::PUT, path, body, issue_key).await
        })
        .await
    }

    async fn project_components(&self, project_key: &str) -> TrackerResult<Vec<ProjectComponent>> {
        let path = format!("/project/{}/components", project_key);
        let path = path.as_str();

        instrumented(TRACKER, "project_components", &self.retry, || async move {
            let response = self
                .request(Method::GET, path)
                .timeout(GET_TIMEOUT)
                .send()
                .await?;
            let response =
                check_response(TRACKER, response, &format!("project {}", project_key)).await?;
            let components: Vec<JiraComponent> = decode_json(TRACKER, response).await?;
            Ok(components
                .into_iter()
                .map(|c| ProjectComponent {
                    id: c.id,
                    name: c.name,
                })
                .collect())
        })
        .await
    }

    async fn set_components(&self, issue_key: &str, component_ids: &[String]) -> TrackerResult<()> {
        let path = format!("/issue/{}", issue_key);
        let body = components_fields(component_ids);
        let (body, path) = (&body, path.as_str());

        instrumented(TRACKER, "set_components", &self.retry, || async move {
            self.send_write(Method::PUT, path, body, issue_key).await
        })
        .await
    }

    async fn ping(&self) -> TrackerResult<()> {
        instrumented(TRACKER, "ping", &RetryConfig::no_retry(), || async move {
            let response = self
                .request(Method::GET, "/myself")
                .timeout(GET_TIMEOUT)
                .send()
                .await?;
            check_response(TRACKER, response, "myself").await?;
            Ok(())
        })
        .await
    }
}
