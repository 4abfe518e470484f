use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use shared::{
    domain::{
        BugReport, BugReportId, Course, CourseId, Exam, ExamId, Question, QuestionId, Semester,
        SemesterId, User, UserId,
    },
    protocol::{
        CreateBugReportRequest, CreateCourseRequest, CreateExamRequest, CreateQuestionRequest,
        AuthSession, CreateSemesterRequest, CreateUserRequest, Envelope, LoginRequest,
        RegisterRequest,
    },
};
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server url: {0}")]
    Url(#[from] url::ParseError),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server answered {status}: {message}")]
    Api { status: u16, message: String },

    /// The server refused to create a record because an equal one exists.
    #[error("{message}")]
    Duplicate { message: String, existing: Value },

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Path and payload keys of one REST collection.
#[derive(Debug, Clone, Copy)]
struct Resource {
    path: &'static str,
    key: &'static str,
    collection: &'static str,
    found_key: &'static str,
}

const USERS: Resource = Resource {
    path: "users",
    key: "user",
    collection: "users",
    found_key: "foundUser",
};

const COURSES: Resource = Resource {
    path: "courses",
    key: "course",
    collection: "courses",
    found_key: "foundCourse",
};

const SEMESTERS: Resource = Resource {
    path: "semesters",
    key: "semester",
    collection: "semesters",
    found_key: "foundSemester",
};

const EXAMS: Resource = Resource {
    path: "exams",
    key: "exam",
    collection: "exams",
    found_key: "foundExam",
};

const QUESTIONS: Resource = Resource {
    path: "questions",
    key: "question",
    collection: "questions",
    found_key: "foundQuestion",
};

const REGISTER: Resource = Resource {
    path: "register",
    key: "user",
    collection: "users",
    found_key: "foundUser",
};

const LOGIN: &str = "login";

/// Which part of a success payload an endpoint answers with.
#[derive(Debug, Clone, Copy)]
enum Payload<'a> {
    Field(&'a str),
    /// The whole `data` object; failures still carry their message under the key.
    Whole { message_key: &'a str },
}

impl<'a> Payload<'a> {
    fn message_key(self) -> &'a str {
        match self {
            Payload::Field(key) | Payload::Whole { message_key: key } => key,
        }
    }
}

const BUG_REPORTS: Resource = Resource {
    path: "bug-reports",
    key: "bugReport",
    collection: "bugReports",
    found_key: "foundBugReport",
};

pub struct QuizClient {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

impl QuizClient {
    pub fn new(server_url: &str) -> Result<Self, ClientError> {
        let mut base_url = Url::parse(server_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http: Client::new(),
            base_url,
            token: None,
        })
    }

    /// Sends every following request with `token` as its bearer credential.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub async fn register(&self, req: &RegisterRequest) -> Result<AuthSession, ClientError> {
        let payload = Payload::Whole {
            message_key: REGISTER.key,
        };
        self.post(REGISTER.path, req, payload, Some(REGISTER.found_key))
            .await
    }

    /// Wrong credentials come back as `ClientError::Api` with status 401.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, ClientError> {
        let req = LoginRequest {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        };
        let payload = Payload::Whole {
            message_key: "session",
        };
        self.post(LOGIN, &req, payload, None).await
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn list_users(&self) -> Result<Vec<User>, ClientError> {
        self.get(USERS.path, USERS.collection).await
    }

    pub async fn get_user(&self, id: UserId) -> Result<User, ClientError> {
        self.get(&format!("{}/{id}", USERS.path), USERS.key).await
    }

    pub async fn create_user(&self, req: &CreateUserRequest) -> Result<User, ClientError> {
        self.create(USERS, req).await
    }

    pub async fn list_courses(&self) -> Result<Vec<Course>, ClientError> {
        self.get(COURSES.path, COURSES.collection).await
    }

    pub async fn get_course(&self, id: CourseId) -> Result<Course, ClientError> {
        self.get(&format!("{}/{id}", COURSES.path), COURSES.key).await
    }

    pub async fn create_course(&self, req: &CreateCourseRequest) -> Result<Course, ClientError> {
        self.create(COURSES, req).await
    }

    pub async fn list_semesters(&self) -> Result<Vec<Semester>, ClientError> {
        self.get(SEMESTERS.path, SEMESTERS.collection).await
    }

    pub async fn current_semester(&self) -> Result<Semester, ClientError> {
        self.get(&format!("{}/current", SEMESTERS.path), SEMESTERS.key)
            .await
    }

    pub async fn get_semester(&self, id: SemesterId) -> Result<Semester, ClientError> {
        self.get(&format!("{}/{id}", SEMESTERS.path), SEMESTERS.key)
            .await
    }

    pub async fn semesters_for_course(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<Semester>, ClientError> {
        self.get(
            &format!("{}/course/{course_id}", SEMESTERS.path),
            SEMESTERS.collection,
        )
        .await
    }

    pub async fn create_semester(
        &self,
        req: &CreateSemesterRequest,
    ) -> Result<Semester, ClientError> {
        self.create(SEMESTERS, req).await
    }

    pub async fn list_exams(&self) -> Result<Vec<Exam>, ClientError> {
        self.get(EXAMS.path, EXAMS.collection).await
    }

    pub async fn get_exam(&self, id: ExamId) -> Result<Exam, ClientError> {
        self.get(&format!("{}/{id}", EXAMS.path), EXAMS.key).await
    }

    pub async fn exams_for_semester(
        &self,
        semester_id: SemesterId,
    ) -> Result<Vec<Exam>, ClientError> {
        self.get(
            &format!("{}/semester/{semester_id}", EXAMS.path),
            EXAMS.collection,
        )
        .await
    }

    pub async fn create_exam(&self, req: &CreateExamRequest) -> Result<Exam, ClientError> {
        self.create(EXAMS, req).await
    }

    pub async fn list_questions(&self) -> Result<Vec<Question>, ClientError> {
        self.get(QUESTIONS.path, QUESTIONS.collection).await
    }

    pub async fn get_question(&self, id: QuestionId) -> Result<Question, ClientError> {
        self.get(&format!("{}/{id}", QUESTIONS.path), QUESTIONS.key)
            .await
    }

    pub async fn questions_for_exam(&self, exam_id: ExamId) -> Result<Vec<Question>, ClientError> {
        self.get(
            &format!("{}/exam/{exam_id}", QUESTIONS.path),
            QUESTIONS.collection,
        )
        .await
    }

    pub async fn create_question(
        &self,
        req: &CreateQuestionRequest,
    ) -> Result<Question, ClientError> {
        self.create(QUESTIONS, req).await
    }

    pub async fn list_bug_reports(&self) -> Result<Vec<BugReport>, ClientError> {
        self.get(BUG_REPORTS.path, BUG_REPORTS.collection).await
    }

    pub async fn get_bug_report(&self, id: BugReportId) -> Result<BugReport, ClientError> {
        self.get(&format!("{}/{id}", BUG_REPORTS.path), BUG_REPORTS.key)
            .await
    }

    pub async fn create_bug_report(
        &self,
        req: &CreateBugReportRequest,
    ) -> Result<BugReport, ClientError> {
        self.create(BUG_REPORTS, req).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, key: &str) -> Result<T, ClientError> {
        let url = self.base_url.join(path)?;
        debug!(%url, "GET");
        let response = self.authorize(self.http.get(url)).send().await?;
        read_envelope(response, Payload::Field(key), None).await
    }

    async fn create<B, T>(&self, resource: Resource, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.post(
            resource.path,
            body,
            Payload::Field(resource.key),
            Some(resource.found_key),
        )
        .await
    }

    async fn post<B, T>(
        &self,
        path: &str,
        body: &B,
        payload: Payload<'_>,
        found_key: Option<&str>,
    ) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.base_url.join(path)?;
        debug!(%url, "POST");
        let response = self.authorize(self.http.post(url).json(body)).send().await?;
        read_envelope(response, payload, found_key).await
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

async fn read_envelope<T: DeserializeOwned>(
    response: reqwest::Response,
    payload: Payload<'_>,
    found_key: Option<&str>,
) -> Result<T, ClientError> {
    let status = response.status();
    let bytes = response.bytes().await?;
    let envelope: Envelope = match serde_json::from_slice(&bytes) {
        Ok(envelope) => envelope,
        Err(source) if status.is_success() => return Err(ClientError::Decode(source)),
        Err(_) => {
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: String::from_utf8_lossy(&bytes).into_owned(),
            })
        }
    };
    interpret(status, envelope, payload, found_key)
}

fn interpret<T: DeserializeOwned>(
    status: StatusCode,
    envelope: Envelope,
    payload: Payload<'_>,
    found_key: Option<&str>,
) -> Result<T, ClientError> {
    let Envelope { data, message, .. } = envelope;
    let Some(mut data) = data else {
        return Err(ClientError::Api {
            status: status.as_u16(),
            message: message.unwrap_or_default(),
        });
    };

    if status.is_success() {
        let value = match payload {
            Payload::Field(key) => data.get_mut(key).map(Value::take).unwrap_or(Value::Null),
            Payload::Whole { .. } => data,
        };
        return Ok(serde_json::from_value(value)?);
    }

    let message = data
        .get(payload.message_key())
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    match found_key.and_then(|found| data.get_mut(found)) {
        Some(existing) => Err(ClientError::Duplicate {
            message,
            existing: existing.take(),
        }),
        None => Err(ClientError::Api {
            status: status.as_u16(),
            message,
        }),
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
