use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::UserId;

pub const SERVER_ERROR_MESSAGE: &str = "Internal server error";
pub const BAD_REQUEST_MESSAGE: &str = "Bad request";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    ServerError,
    MissingField,
    BadRequest,
    Conflict,
    Unauthorized,
}

impl ErrorKind {
    /// HTTP status fixed per kind. Conflict answers 400 to stay wire compatible
    /// with clients that treat a duplicate submission as a bad request.
    pub fn code(self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::ServerError => 500,
            ErrorKind::MissingField | ErrorKind::BadRequest | ErrorKind::Conflict => 400,
            ErrorKind::Unauthorized => 401,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::ServerError => "server_error",
            ErrorKind::MissingField => "missing_field",
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Unauthorized => "unauthorized",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tagged failure descriptor. Building one has no side effects; emitting it
/// is the caller's job.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ErrorEvent {
    pub kind: ErrorKind,
    pub actor: Option<UserId>,
    pub message: String,
    pub topic: Option<String>,
}

impl ErrorEvent {
    fn new(
        kind: ErrorKind,
        actor: Option<UserId>,
        message: impl Into<String>,
        topic: Option<String>,
    ) -> Self {
        Self {
            kind,
            actor,
            message: message.into(),
            topic,
        }
    }

    pub fn not_found(
        actor: Option<UserId>,
        message: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self::new(ErrorKind::NotFound, actor, message, Some(topic.into()))
    }

    /// `operation` names what was being attempted, e.g. "Get all semesters".
    pub fn server_error(actor: Option<UserId>, operation: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::ServerError,
            actor,
            SERVER_ERROR_MESSAGE,
            Some(operation.into()),
        )
    }

    pub fn missing_field(actor: Option<UserId>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MissingField, actor, message, None)
    }

    pub fn bad_request(actor: Option<UserId>, topic: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::BadRequest,
            actor,
            BAD_REQUEST_MESSAGE,
            Some(topic.into()),
        )
    }

    pub fn conflict(
        actor: Option<UserId>,
        message: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self::new(ErrorKind::Conflict, actor, message, Some(topic.into()))
    }

    /// Credentials that do not match a known user.
    pub fn unauthorized(
        actor: Option<UserId>,
        message: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self::new(ErrorKind::Unauthorized, actor, message, Some(topic.into()))
    }

    pub fn code(&self) -> u16 {
        self.kind.code()
    }
}

#[cfg(test)]
#[path = "tests/error_tests.rs"]
mod tests;
