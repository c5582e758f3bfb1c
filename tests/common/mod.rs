//! In-memory Bugzilla and Jira stand-ins shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bugbridge::config::{BridgeConfig, RuleConfig};
use bugbridge::integrations::{
    DownstreamTracker, DownstreamUser, IssueUpdate, NewIssue, ProjectComponent, TrackerResult,
    Trackers, UpstreamTracker,
};
use bugbridge::rules::{RegistryHandle, RuleRegistry};
use bugbridge::runner::{Bridge, Disposition};
use bugbridge::tracker::{
    EventTarget, FieldChange, Ticket, TicketComment, WebhookEvent, WebhookRequest, WebhookUser,
};
use bugbridge::{StepRegistry, Tracker, TrackerError};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

pub const JIRA_URL: &str = "https://mozilla.atlassian.net";
pub const BUGZILLA_URL: &str = "https://bugzilla.mozilla.org";

fn unavailable(tracker: Tracker) -> TrackerError {
    TrackerError::Api {
        tracker,
        status: 503,
        body: "unavailable".to_string(),
    }
}

// ============================================================================
// Bugzilla
// ============================================================================

#[derive(Default)]
struct BugzillaState {
    tickets: HashMap<u64, Ticket>,
    comments: HashMap<u64, Vec<TicketComment>>,
    calls: Vec<String>,
    down: bool,
}

#[derive(Default)]
pub struct FakeBugzilla {
    state: Mutex<BugzillaState>,
}

impl FakeBugzilla {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the server-side view of a bug
    pub fn put_ticket(&self, ticket: Ticket) {
        self.state.lock().unwrap().tickets.insert(ticket.id, ticket);
    }

    /// Store a bug unless the fake already knows it
    pub fn ensure_ticket(&self, ticket: Ticket) {
        self.state
            .lock()
            .unwrap()
            .tickets
            .entry(ticket.id)
            .or_insert(ticket);
    }

    pub fn put_comments(&self, id: u64, comments: Vec<TicketComment>) {
        self.state.lock().unwrap().comments.insert(id, comments);
    }

    pub fn see_also(&self, id: u64) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .tickets
            .get(&id)
            .map(|t| t.see_also.clone())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Make every call fail with a 503
    pub fn set_down(&self, down: bool) {
        self.state.lock().unwrap().down = down;
    }

    fn record(&self, call: String) -> TrackerResult<std::sync::MutexGuard<'_, BugzillaState>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if state.down {
            return Err(unavailable(Tracker::Bugzilla));
        }
        Ok(state)
    }
}

#[async_trait]
impl UpstreamTracker for FakeBugzilla {
    async fn get_ticket(&self, id: u64) -> TrackerResult<Ticket> {
        let state = self.record(format!("get_ticket {}", id))?;
        state
            .tickets
            .get(&id)
            .cloned()
            .ok_or_else(|| TrackerError::NotFound {
                tracker: Tracker::Bugzilla,
                resource: format!("bug {}", id),
            })
    }

    async fn get_comments(&self, id: u64) -> TrackerResult<Vec<TicketComment>> {
        let state = self.record(format!("get_comments {}", id))?;
        Ok(state.comments.get(&id).cloned().unwrap_or_default())
    }

    async fn set_back_reference(&self, id: u64, url: &str) -> TrackerResult<()> {
        let mut state = self.record(format!("set_back_reference {} {}", id, url))?;
        let ticket = state.tickets.entry(id).or_insert_with(|| Ticket::new(id));
        if !ticket.see_also.iter().any(|u| u == url) {
            ticket.see_also.push(url.to_string());
        }
        Ok(())
    }

    async fn add_comment(&self, id: u64, text: &str) -> TrackerResult<()> {
        self.record(format!("add_comment {} {}", id, text))?;
        Ok(())
    }

    async fn ping(&self) -> TrackerResult<()> {
        self.record("ping".to_string())?;
        Ok(())
    }
}

// ============================================================================
// Jira
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FakeIssue {
    pub project: String,
    pub summary: String,
    pub description: String,
    pub issue_type: String,
    pub labels: BTreeSet<String>,
    pub status: Option<String>,
    pub resolution: Option<String>,
    pub assignee: Option<String>,
    pub comments: Vec<String>,
    pub remote_links: Vec<(String, String)>,
    pub components: Vec<String>,
}

#[derive(Default)]
struct JiraState {
    issues: BTreeMap<String, FakeIssue>,
    next_id: u64,
    users: HashMap<String, DownstreamUser>,
    components: HashMap<String, Vec<ProjectComponent>>,
    components_field_missing: bool,
    calls: Vec<String>,
    fail_method: Option<&'static str>,
}

#[derive(Default)]
pub struct FakeJira {
    state: Mutex<JiraState>,
}

impl FakeJira {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing issue
    pub fn put_issue(&self, key: &str, issue: FakeIssue) {
        self.state
            .lock()
            .unwrap()
            .issues
            .insert(key.to_string(), issue);
    }

    pub fn add_user(&self, email: &str, account_id: &str) {
        self.state.lock().unwrap().users.insert(
            email.to_string(),
            DownstreamUser {
                account_id: account_id.to_string(),
                display_name: email.to_string(),
                email: Some(email.to_string()),
            },
        );
    }

    /// Define a project's components as `(id, name)` pairs
    pub fn put_components(&self, project_key: &str, components: &[(&str, &str)]) {
        self.state.lock().unwrap().components.insert(
            project_key.to_string(),
            components
                .iter()
                .map(|(id, name)| ProjectComponent {
                    id: id.to_string(),
                    name: name.to_string(),
                })
                .collect(),
        );
    }

    /// Answer component updates with a 400, as Jira does when the field is
    /// not on the edit screen
    pub fn reject_components(&self) {
        self.state.lock().unwrap().components_field_missing = true;
    }

    /// Make calls to one method fail with a 503
    pub fn fail_on(&self, method: &'static str) {
        self.state.lock().unwrap().fail_method = Some(method);
    }

    pub fn issue(&self, key: &str) -> Option<FakeIssue> {
        self.state.lock().unwrap().issues.get(key).cloned()
    }

    pub fn issue_keys(&self) -> Vec<String> {
        self.state.lock().unwrap().issues.keys().cloned().collect()
    }

    /// Recorded calls, `"method args"`
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Recorded method names only
    pub fn methods(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|c| c.split(' ').next().unwrap_or_default().to_string())
            .collect()
    }

    fn record(
        &self,
        method: &'static str,
        args: String,
    ) -> TrackerResult<std::sync::MutexGuard<'_, JiraState>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("{} {}", method, args));
        if state.fail_method == Some(method) {
            return Err(unavailable(Tracker::Jira));
        }
        Ok(state)
    }
}

fn issue_mut<'a>(state: &'a mut JiraState, key: &str) -> TrackerResult<&'a mut FakeIssue> {
    state
        .issues
        .get_mut(key)
        .ok_or_else(|| TrackerError::NotFound {
            tracker: Tracker::Jira,
            resource: key.to_string(),
        })
}

#[async_trait]
impl DownstreamTracker for FakeJira {
    async fn create_issue(&self, project_key: &str, issue: &NewIssue) -> TrackerResult<String> {
        let mut state = self.record("create_issue", project_key.to_string())?;
        state.next_id += 1;
        let key = format!("{}-{}", project_key, state.next_id);
        state.issues.insert(
            key.clone(),
            FakeIssue {
                project: project_key.to_string(),
                summary: issue.summary.clone(),
                description: issue.description.clone(),
                issue_type: issue.issue_type.clone(),
                labels: issue.labels.iter().cloned().collect(),
                ..Default::default()
            },
        );
        Ok(key)
    }

    async fn update_issue(&self, issue_key: &str, update: &IssueUpdate) -> TrackerResult<()> {
        let mut state = self.record("update_issue", issue_key.to_string())?;
        let issue = issue_mut(&mut state, issue_key)?;
        if let Some(summary) = &update.summary {
            issue.summary = summary.clone();
        }
        for label in &update.labels_add {
            issue.labels.insert(label.clone());
        }
        for label in &update.labels_remove {
            issue.labels.remove(label);
        }
        Ok(())
    }

    async fn delete_issue(&self, issue_key: &str) -> TrackerResult<()> {
        let mut state = self.record("delete_issue", issue_key.to_string())?;
        state.issues.remove(issue_key);
        Ok(())
    }

    async fn add_comment(&self, issue_key: &str, text: &str) -> TrackerResult<()> {
        let mut state = self.record("add_comment", issue_key.to_string())?;
        issue_mut(&mut state, issue_key)?.comments.push(text.to_string());
        Ok(())
    }

    async fn add_remote_link(&self, issue_key: &str, url: &str, title: &str) -> TrackerResult<()> {
        let mut state = self.record("add_remote_link", issue_key.to_string())?;
        issue_mut(&mut state, issue_key)?
            .remote_links
            .push((url.to_string(), title.to_string()));
        Ok(())
    }

    async fn set_assignee(
        &self,
        issue_key: &str,
        user: Option<&DownstreamUser>,
    ) -> TrackerResult<()> {
        let mut state = self.record("set_assignee", issue_key.to_string())?;
        issue_mut(&mut state, issue_key)?.assignee = user.map(|u| u.account_id.clone());
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> TrackerResult<Option<DownstreamUser>> {
        let state = self.record("find_user_by_email", email.to_string())?;
        Ok(state.users.get(email).cloned())
    }

    async fn set_status(&self, issue_key: &str, status: &str) -> TrackerResult<()> {
        let mut state = self.record("set_status", format!("{} {}", issue_key, status))?;
        issue_mut(&mut state, issue_key)?.status = Some(status.to_string());
        Ok(())
    }

    async fn set_resolution(&self, issue_key: &str, resolution: &str) -> TrackerResult<()> {
        let mut state = self.record("set_resolution", format!("{} {}", issue_key, resolution))?;
        issue_mut(&mut state, issue_key)?.resolution = Some(resolution.to_string());
        Ok(())
    }

    async fn project_components(&self, project_key: &str) -> TrackerResult<Vec<ProjectComponent>> {
        let state = self.record("project_components", project_key.to_string())?;
        Ok(state.components.get(project_key).cloned().unwrap_or_default())
    }

    async fn set_components(&self, issue_key: &str, component_ids: &[String]) -> TrackerResult<()> {
        let mut state = self.record(
            "set_components",
            format!("{} {}", issue_key, component_ids.join(",")),
        )?;
        if state.components_field_missing {
            return Err(TrackerError::Api {
                tracker: Tracker::Jira,
                status: 400,
                body: "Field 'components' cannot be set".to_string(),
            });
        }
        issue_mut(&mut state, issue_key)?.components = component_ids.to_vec();
        Ok(())
    }

    async fn ping(&self) -> TrackerResult<()> {
        self.record("ping", String::new())?;
        Ok(())
    }
}

// ============================================================================
// Wiring and payload builders
// ============================================================================

pub struct Harness {
    pub bugzilla: Arc<FakeBugzilla>,
    pub jira: Arc<FakeJira>,
    pub bridge: Bridge,
}

impl Harness {
    pub fn new(rules: Vec<RuleConfig>) -> Self {
        Self::with_steps(rules, &StepRegistry::builtin())
    }

    pub fn with_steps(rules: Vec<RuleConfig>, steps: &StepRegistry) -> Self {
        let registry = RuleRegistry::from_config(&BridgeConfig { rules }, steps)
            .expect("test rules are valid");
        let bugzilla = Arc::new(FakeBugzilla::new());
        let jira = Arc::new(FakeJira::new());
        let trackers = Trackers::new(bugzilla.clone(), jira.clone(), JIRA_URL, BUGZILLA_URL);
        let bridge = Bridge::new(Arc::new(RegistryHandle::new(registry)), trackers);
        Self {
            bugzilla,
            jira,
            bridge,
        }
    }

    /// Handle a webhook whose bug Bugzilla also knows about
    pub async fn deliver(&self, request: WebhookRequest) -> Disposition {
        self.bugzilla.ensure_ticket(request.bug.clone());
        self.bridge
            .handle(request)
            .await
            .expect("webhook handling returns a disposition")
    }
}

/// Public, unassigned bug carrying `whiteboard`
pub fn ticket(id: u64, whiteboard: &str) -> Ticket {
    Ticket {
        summary: Some(format!("Bug {} summary", id)),
        whiteboard: Some(whiteboard.to_string()),
        status: Some("NEW".to_string()),
        bug_type: Some("defect".to_string()),
        assigned_to: Some("nobody@mozilla.org".to_string()),
        ..Ticket::new(id)
    }
}

/// `ticket` already linked to `issue_key`
pub fn linked_ticket(id: u64, whiteboard: &str, issue_key: &str) -> Ticket {
    Ticket {
        see_also: vec![format!("{}/browse/{}", JIRA_URL, issue_key)],
        ..ticket(id, whiteboard)
    }
}

pub fn request(bug: Ticket, target: EventTarget, changes: Vec<FieldChange>) -> WebhookRequest {
    WebhookRequest {
        webhook_id: 1,
        webhook_name: "test".to_string(),
        event: WebhookEvent {
            action: if changes.is_empty() { "create" } else { "modify" }.to_string(),
            user: Some(WebhookUser {
                id: 1,
                login: "dev@example.com".to_string(),
                real_name: "Dev".to_string(),
            }),
            changes,
            target,
            ..Default::default()
        },
        bug,
    }
}

pub fn comment(id: u64, text: &str) -> TicketComment {
    TicketComment {
        id,
        text: text.to_string(),
        is_private: false,
        creator: "dev@example.com".to_string(),
    }
}
