//! Bugzilla REST adapter
//!
//! Implements [`UpstreamTracker`] over the Bugzilla REST API. The API key is
//! sent in the `X-BUGZILLA-API-KEY` header.

use super::retry::RetryConfig;
use super::{check_response, decode_json, instrumented, TrackerResult, UpstreamTracker};
use crate::error::{Tracker, TrackerError};
use crate::tracker::{Ticket, TicketComment, WebhookComment};
use crate::Result;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

/// Per-request timeout for reads
const GET_TIMEOUT: Duration = Duration::from_secs(10);
/// Per-request timeout for updates
const WRITE_TIMEOUT: Duration = Duration::from_secs(15);

const API_KEY_HEADER: &str = "X-BUGZILLA-API-KEY";

const TRACKER: Tracker = Tracker::Bugzilla;

/// Bugzilla API client
pub struct BugzillaAdapter {
    client: Client,
    base_url: String,
    api_key: String,
    retry: RetryConfig,
}

/// Bugzilla reports some failures as `200 {"error": true, "message": ...}`
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct BugsResponse {
    #[serde(default)]
    bugs: Vec<Ticket>,
}

#[derive(Debug, Deserialize)]
struct CommentsResponse {
    #[serde(default)]
    bugs: HashMap<String, BugComments>,
}

#[derive(Debug, Deserialize)]
struct BugComments {
    comments: Vec<TicketComment>,
}

#[derive(Debug, Deserialize)]
struct WhoAmI {
    id: u64,
}

impl BugzillaAdapter {
    /// Create a new Bugzilla adapter
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(base_url: &str, api_key: impl Into<String>, retry: RetryConfig) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            base_url: format!("{}/rest", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            retry,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header(API_KEY_HEADER, &self.api_key)
    }

    /// Send, check status, and decode, surfacing in-body errors
    async fn call<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        resource: &str,
    ) -> TrackerResult<T> {
        let response = request.send().await?;
        let response = check_response(TRACKER, response, resource).await?;
        let value: Value = decode_json(TRACKER, response).await?;
        reject_error_body(&value)?;
        serde_json::from_value(value).map_err(|e| TrackerError::Malformed {
            tracker: TRACKER,
            message: format!("{}: {}", resource, e),
        })
    }

    async fn fetch_comments(&self, id: u64) -> TrackerResult<Vec<TicketComment>> {
        let resource = format!("bug {} comments", id);
        let request = self
            .request(Method::GET, &format!("/bug/{}/comment", id))
            .timeout(GET_TIMEOUT);
        let mut parsed: CommentsResponse = self.call(request, &resource).await?;
        parsed
            .bugs
            .remove(&id.to_string())
            .map(|bug| bug.comments)
            .ok_or_else(|| TrackerError::Malformed {
                tracker: TRACKER,
                message: format!("no comments entry for bug {}", id),
            })
    }
}

fn reject_error_body(value: &Value) -> TrackerResult<()> {
    let body: ErrorBody = match serde_json::from_value(value.clone()) {
        Ok(body) => body,
        Err(_) => return Ok(()),
    };
    if !body.error {
        return Ok(());
    }
    Err(TrackerError::Api {
        tracker: TRACKER,
        status: 200,
        body: format!(
            "{} (code {})",
            body.message.unwrap_or_else(|| "unknown error".to_string()),
            body.code.unwrap_or_default()
        ),
    })
}

#[async_trait]
impl UpstreamTracker for BugzillaAdapter {
    async fn get_ticket(&self, id: u64) -> TrackerResult<Ticket> {
        let mut ticket = instrumented(TRACKER, "get_ticket", &self.retry, || async move {
            let request = self
                .request(Method::GET, &format!("/bug/{}", id))
                .timeout(GET_TIMEOUT);
            let parsed: BugsResponse = self.call(request, &format!("bug {}", id)).await?;
            parsed
                .bugs
                .into_iter()
                .next()
                .ok_or_else(|| TrackerError::NotFound {
                    tracker: TRACKER,
                    resource: format!("bug {}", id),
                })
        })
        .await?;

        // Private comment bodies are redacted; fetch the real one
        let private_comment_id = ticket
            .comment
            .as_ref()
            .filter(|c| c.is_private == Some(true))
            .and_then(|c| c.id);
        if let Some(comment_id) = private_comment_id {
            let comments = self.get_comments(id).await?;
            ticket.comment = comments
                .into_iter()
                .find(|c| c.id == comment_id)
                .map(|c| WebhookComment {
                    id: Some(c.id),
                    body: Some(c.text),
                    number: None,
                    is_private: Some(c.is_private),
                });
            debug!(ticket_id = id, found = ticket.comment.is_some(), "Fetched private comment");
        }
        Ok(ticket)
    }

    async fn get_comments(&self, id: u64) -> TrackerResult<Vec<TicketComment>> {
        instrumented(TRACKER, "get_comments", &self.retry, || async move {
            self.fetch_comments(id).await
        })
        .await
    }

    async fn set_back_reference(&self, id: u64, url: &str) -> TrackerResult<()> {
        let body = json!({ "see_also": { "add": [url] } });
        let body = &body;

        instrumented(TRACKER, "set_back_reference", &self.retry, || async move {
            let request = self
                .request(Method::PUT, &format!("/bug/{}", id))
                .json(body)
                .timeout(WRITE_TIMEOUT);
            let _: Value = self.call(request, &format!("bug {}", id)).await?;
            info!(ticket_id = id, url, "Added see_also link");
            Ok(())
        })
        .await
    }

    async fn add_comment(&self, id: u64, text: &str) -> TrackerResult<()> {
        let body = json!({ "comment": text });
        let body = &body;

        instrumented(TRACKER, "add_comment", &self.retry, || async move {
            let request = self
                .request(Method::POST, &format!("/bug/{}/comment", id))
                .json(body)
                .timeout(WRITE_TIMEOUT);
            let _: Value = self.call(request, &format!("bug {}", id)).await?;
            Ok(())
        })
        .await
    }

    async fn ping(&self) -> TrackerResult<()> {
        instrumented(TRACKER, "ping", &RetryConfig::no_retry(), || async move {
            let request = self.request(Method::GET, "/whoami").timeout(GET_TIMEOUT);
            let me: WhoAmI = self.call(request, "whoami").await?;
            debug!(user_id = me.id, "Bugzilla API key is valid");
            Ok(())
        })
        .await
    }
}
