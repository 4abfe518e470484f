use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{CourseId, ExamId, Role, SemesterId, User, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    Fail,
    Error,
}

impl ResponseStatus {
    pub fn for_code(code: u16) -> Self {
        if code >= 500 {
            ResponseStatus::Error
        } else if code >= 400 {
            ResponseStatus::Fail
        } else {
            ResponseStatus::Success
        }
    }
}

/// Uniform JSON wrapper. Exactly one of `data` or `message` is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Envelope {
    pub fn data(code: u16, payload: Value) -> Self {
        Self {
            status: ResponseStatus::for_code(code),
            data: Some(payload),
            message: None,
        }
    }

    pub fn message(code: u16, message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::for_code(code),
            data: None,
            message: Some(message.into()),
        }
    }
}

// Create bodies keep every field optional so that absent fields surface as a
// missing-field event rather than a deserialization failure.

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCourseRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSemesterRequest {
    pub title: Option<String>,
    pub course_id: Option<CourseId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExamRequest {
    pub title: Option<String>,
    pub semester_id: Option<SemesterId>,
    pub duration_minutes: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuestionRequest {
    pub exam_id: Option<ExamId>,
    pub content: Option<String>,
    pub answers: Option<Vec<String>>,
    pub correct_answer: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBugReportRequest {
    pub user_id: Option<UserId>,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Data payload of a successful register or login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
