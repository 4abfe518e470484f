use std::{future::Future, sync::Arc};

use serde::Serialize;
use serde_json::{Map, Value};
use shared::{domain::UserId, error::ErrorEvent};
use storage::{InsertOutcome, Storage};

pub mod auth;
pub mod bug_reports;
pub mod courses;
pub mod events;
pub mod exams;
pub mod questions;
pub mod response;
pub mod semesters;
pub mod users;

pub use auth::TokenIssuer;
pub use events::{ErrorEventSink, EventBus};
pub use response::{send_data_response, send_message_response, Reply};

use response::found;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub events: Arc<dyn ErrorEventSink>,
}

/// An unexpected failure. `reply` has already been shaped for the client;
/// `source` still has to reach process-level error handling.
#[derive(Debug)]
pub struct Unhandled {
    pub event: ErrorEvent,
    pub reply: Reply,
    pub source: anyhow::Error,
}

pub type Handled = Result<Reply, Unhandled>;

pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password";

/// Naming for one entity family: labels, payload keys, messages.
#[derive(Debug, Clone, Copy)]
pub struct Topic {
    pub entity: &'static str,
    pub label: &'static str,
    pub key: &'static str,
    pub collection: &'static str,
    pub found_key: &'static str,
}

impl Topic {
    pub fn not_found_message(&self) -> String {
        format!("{} not found", self.entity)
    }

    pub fn already_exists_message(&self) -> String {
        format!("{} already exists", self.entity)
    }

    pub fn missing_field_message(&self) -> String {
        format!("Create {}: Missing Field/s event", self.label)
    }

    pub fn create_failed_message(&self) -> String {
        format!("Failed to create {}", self.label)
    }
}

pub const USER: Topic = Topic {
    entity: "User",
    label: "user",
    key: "user",
    collection: "users",
    found_key: "foundUser",
};

pub const COURSE: Topic = Topic {
    entity: "Course",
    label: "course",
    key: "course",
    collection: "courses",
    found_key: "foundCourse",
};

pub const SEMESTER: Topic = Topic {
    entity: "Semester",
    label: "semester",
    key: "semester",
    collection: "semesters",
    found_key: "foundSemester",
};

pub const EXAM: Topic = Topic {
    entity: "Exam",
    label: "exam",
    key: "exam",
    collection: "exams",
    found_key: "foundExam",
};

pub const QUESTION: Topic = Topic {
    entity: "Question",
    label: "question",
    key: "question",
    collection: "questions",
    found_key: "foundQuestion",
};

pub const BUG_REPORT: Topic = Topic {
    entity: "Bug report",
    label: "bug report",
    key: "bugReport",
    collection: "bugReports",
    found_key: "foundBugReport",
};

pub const SESSION: Topic = Topic {
    entity: "Session",
    label: "session",
    key: "session",
    collection: "sessions",
    found_key: "foundSession",
};

impl ApiContext {
    pub fn new(storage: Storage, events: Arc<dyn ErrorEventSink>) -> Self {
        Self { storage, events }
    }

    /// Emits `event` and answers with its code and message.
    pub fn fail(&self, event: ErrorEvent) -> Reply {
        self.events.emit(&event);
        send_message_response(event.code(), event.message)
    }

    pub fn not_found(&self, actor: Option<UserId>, topic: &Topic) -> Reply {
        self.fail(ErrorEvent::not_found(
            actor,
            topic.not_found_message(),
            topic.entity,
        ))
    }

    pub fn missing_field(&self, actor: Option<UserId>, topic: &Topic) -> Reply {
        self.fail(ErrorEvent::missing_field(actor, topic.missing_field_message()))
    }

    pub fn bad_request(&self, actor: Option<UserId>, topic: &Topic) -> Reply {
        self.fail(ErrorEvent::bad_request(actor, topic.create_failed_message()))
    }

    pub fn unauthorized(&self, actor: Option<UserId>, topic: &Topic) -> Reply {
        self.fail(ErrorEvent::unauthorized(
            actor,
            INVALID_CREDENTIALS_MESSAGE,
            topic.entity,
        ))
    }

    /// Duplicate submission: the existing record goes back alongside the
    /// event's message.
    pub fn conflict(
        &self,
        actor: Option<UserId>,
        topic: &Topic,
        existing: &impl Serialize,
    ) -> anyhow::Result<Reply> {
        let event = ErrorEvent::conflict(actor, topic.already_exists_message(), topic.entity);
        let mut payload = Map::new();
        payload.insert(topic.key.to_string(), Value::String(event.message.clone()));
        payload.insert(topic.found_key.to_string(), serde_json::to_value(existing)?);
        self.events.emit(&event);
        Ok(send_data_response(event.code(), Value::Object(payload)))
    }
}

/// Runs a controller body; any error becomes a server error event, a 500
/// reply, and an `Unhandled` carrying the source error.
pub async fn guarded<F>(
    ctx: &ApiContext,
    actor: Option<UserId>,
    operation: &str,
    work: F,
) -> Handled
where
    F: Future<Output = anyhow::Result<Reply>>,
{
    match work.await {
        Ok(reply) => Ok(reply),
        Err(source) => {
            let event = ErrorEvent::server_error(actor, operation);
            ctx.events.emit(&event);
            let reply = send_message_response(event.code(), event.message.clone());
            Err(Unhandled {
                event,
                reply,
                source,
            })
        }
    }
}

/// Maps an insert outcome onto the create contract. `existing` is only
/// polled when the store reported a unique violation.
pub(crate) async fn settle_insert<T, F>(
    ctx: &ApiContext,
    actor: Option<UserId>,
    topic: &Topic,
    outcome: InsertOutcome<T>,
    existing: F,
) -> anyhow::Result<Reply>
where
    T: Serialize,
    F: Future<Output = anyhow::Result<Option<T>>>,
{
    match outcome {
        InsertOutcome::Created(record) => found(topic.key, &record),
        InsertOutcome::Duplicate => match existing.await? {
            Some(record) => ctx.conflict(actor, topic, &record),
            None => Ok(ctx.bad_request(actor, topic)),
        },
        InsertOutcome::Rejected => Ok(ctx.bad_request(actor, topic)),
    }
}

pub(crate) fn found_or_missing<T: Serialize>(
    ctx: &ApiContext,
    actor: Option<UserId>,
    topic: &Topic,
    record: Option<T>,
) -> anyhow::Result<Reply> {
    match record {
        Some(record) => found(topic.key, &record),
        None => Ok(ctx.not_found(actor, topic)),
    }
}

/// Blank strings count as missing.
pub(crate) fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Emails are compared case-insensitively by lowercasing before storage.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
