//! Upstream (Bugzilla) data model
//!
//! Tickets, webhook payloads and the [`Event`] view the pipeline consumes.

mod ticket;
mod webhook;

pub use ticket::{Ticket, TicketComment, WebhookComment, UNASSIGNED_EMAIL};
pub use webhook::{
    Event, EventTarget, FieldChange, WebhookEvent, WebhookRequest, WebhookUser, COMMENT_FIELD,
};
