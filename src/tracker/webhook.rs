//! Bugzilla webhook payloads
//!
//! A webhook request carries the bug (possibly redacted for private bugs)
//! and a description of what changed. [`Event`] pairs them and is what the
//! classifier and the step pipeline work on.

use super::ticket::{null_as_default, Ticket};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Change-field name Bugzilla uses for a new comment
pub const COMMENT_FIELD: &str = "comment";

/// User who triggered the webhook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookUser {
    pub id: u64,
    pub login: String,
    #[serde(default)]
    pub real_name: String,
}

/// One changed field with its previous and new values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    #[serde(default)]
    pub removed: String,
    #[serde(default)]
    pub added: String,
}

impl FieldChange {
    pub fn new(
        field: impl Into<String>,
        removed: impl Into<String>,
        added: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            removed: removed.into(),
            added: added.into(),
        }
    }
}

/// What the webhook is about
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventTarget {
    #[default]
    Bug,
    Comment,
    Attachment,
    #[serde(other)]
    Other,
}

/// Change notification part of the webhook payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user: Option<WebhookUser>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub changes: Vec<FieldChange>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub target: EventTarget,
    #[serde(default)]
    pub routing_key: Option<String>,
}

impl WebhookEvent {
    /// Names of the changed fields, in payload order
    pub fn changed_fields(&self) -> Vec<&str> {
        self.changes.iter().map(|c| c.field.as_str()).collect()
    }

    /// Login of the acting user, or "unknown"
    pub fn user_login(&self) -> &str {
        self.user.as_ref().map(|u| u.login.as_str()).unwrap_or("unknown")
    }

    /// Change record for a field, if that field changed
    pub fn change_for(&self, field: &str) -> Option<&FieldChange> {
        self.changes.iter().find(|c| c.field == field)
    }
}

/// Body of `POST /bugzilla_webhook`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookRequest {
    pub webhook_id: u64,
    #[serde(default)]
    pub webhook_name: String,
    pub event: WebhookEvent,
    pub bug: Ticket,
}

impl WebhookRequest {
    pub fn into_event(self) -> Event {
        Event::new(self.bug, self.event)
    }
}

/// One change notification for one ticket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub ticket: Ticket,
    pub notice: WebhookEvent,
}

impl Event {
    pub fn new(ticket: Ticket, notice: WebhookEvent) -> Self {
        Self { ticket, notice }
    }

    pub fn ticket_id(&self) -> u64 {
        self.ticket.id
    }

    pub fn is_public(&self) -> bool {
        !self.ticket.is_private
    }

    /// Raw field rule tags are extracted from
    pub fn tag_field(&self) -> &str {
        self.ticket.whiteboard.as_deref().unwrap_or("")
    }

    pub fn changed_fields(&self) -> Vec<&str> {
        self.notice.changed_fields()
    }

    pub fn has_changed(&self, field: &str) -> bool {
        self.notice.change_for(field).is_some()
    }

    /// Whether the event is nothing but a comment addition
    pub fn is_comment_only(&self) -> bool {
        match self.notice.target {
            EventTarget::Comment => self.notice.changes.iter().all(|c| c.field == COMMENT_FIELD),
            _ => {
                !self.notice.changes.is_empty()
                    && self.notice.changes.iter().all(|c| c.field == COMMENT_FIELD)
            }
        }
    }

    pub fn linked_issue_key(&self) -> Option<String> {
        self.ticket.linked_issue_key()
    }
}
