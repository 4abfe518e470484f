use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use server_api::{
    auth, bug_reports, courses, exams, questions, semesters, users, ApiContext, Handled, Reply,
    Topic, TokenIssuer, Unhandled, BUG_REPORT, COURSE, EXAM, QUESTION, SEMESTER, SESSION, USER,
};
use shared::{
    domain::{BugReportId, CourseId, ExamId, QuestionId, SemesterId, UserId},
    protocol::{
        CreateBugReportRequest, CreateCourseRequest, CreateExamRequest, CreateQuestionRequest,
        CreateSemesterRequest, CreateUserRequest, LoginRequest, RegisterRequest,
    },
};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::{error, warn};

pub mod config;
pub mod error;
pub mod extract;
pub mod pages;

use error::AppError;
use extract::{Actor, CreateBody, PathId};

const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub api: ApiContext,
    pub tokens: TokenIssuer,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(pages::index))
        .route("/healthz", get(healthz))
        .route("/register", post(http_register))
        .route("/login", post(http_login))
        .route("/users", get(http_list_users).post(http_create_user))
        .route("/users/:id", get(http_get_user))
        .route("/courses", get(http_list_courses).post(http_create_course))
        .route("/courses/:id", get(http_get_course))
        .route(
            "/semesters",
            get(http_list_semesters).post(http_create_semester),
        )
        .route("/semesters/current", get(http_current_semester))
        .route("/semesters/course/:id", get(http_course_semesters))
        .route("/semesters/:id", get(http_get_semester))
        .route("/exams", get(http_list_exams).post(http_create_exam))
        .route("/exams/semester/:id", get(http_semester_exams))
        .route("/exams/:id", get(http_get_exam))
        .route(
            "/questions",
            get(http_list_questions).post(http_create_question),
        )
        .route("/questions/exam/:id", get(http_exam_questions))
        .route("/questions/:id", get(http_get_question))
        .route(
            "/bug-reports",
            get(http_list_bug_reports).post(http_create_bug_report),
        )
        .route("/bug-reports/:id", get(http_get_bug_report))
        .fallback(pages::handle_404)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Writes the controller's reply. Unhandled errors are logged here, after
/// the client has its answer.
pub fn dispatch(handled: Handled) -> Response {
    match handled {
        Ok(reply) => into_response(reply),
        Err(unhandled) => {
            report_unhandled(&unhandled);
            into_response(unhandled.reply)
        }
    }
}

fn into_response(reply: Reply) -> Response {
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(reply.body)).into_response()
}

/// A create body that is JSON but does not fit the request shape goes through
/// the controller's bad-request event like any other rejected create.
fn reject_malformed(
    state: &AppState,
    actor: Option<UserId>,
    topic: &Topic,
    err: &serde_json::Error,
) -> Response {
    warn!(entity = topic.entity, error = %err, "malformed create body");
    dispatch(Ok(state.api.bad_request(actor, topic)))
}

fn report_unhandled(unhandled: &Unhandled) {
    error!(
        operation = unhandled.event.topic.as_deref().unwrap_or_default(),
        actor = ?unhandled.event.actor.map(|id| id.0),
        record_missing = storage::is_record_missing(&unhandled.source),
        error = ?unhandled.source,
        "unhandled controller error"
    );
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, AppError> {
    state.api.storage.health_check().await?;
    Ok("ok")
}

// auth

async fn http_register(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: CreateBody<RegisterRequest>,
) -> Response {
    match body {
        CreateBody::Parsed(req) => {
            dispatch(auth::register(&state.api, &state.tokens, actor, req).await)
        }
        CreateBody::Malformed(err) => reject_malformed(&state, actor, &USER, &err),
    }
}

async fn http_login(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: CreateBody<LoginRequest>,
) -> Response {
    match body {
        CreateBody::Parsed(req) => {
            dispatch(auth::login(&state.api, &state.tokens, actor, req).await)
        }
        CreateBody::Malformed(err) => reject_malformed(&state, actor, &SESSION, &err),
    }
}

// users

async fn http_list_users(State(state): State<Arc<AppState>>, Actor(actor): Actor) -> Response {
    dispatch(users::get_all_users(&state.api, actor).await)
}

async fn http_get_user(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    PathId(id): PathId<i64>,
) -> Response {
    dispatch(users::get_user_by_id(&state.api, actor, UserId(id)).await)
}

async fn http_create_user(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: CreateBody<CreateUserRequest>,
) -> Response {
    match body {
        CreateBody::Parsed(req) => dispatch(users::create_new_user(&state.api, actor, req).await),
        CreateBody::Malformed(err) => reject_malformed(&state, actor, &USER, &err),
    }
}

// courses

async fn http_list_courses(State(state): State<Arc<AppState>>, Actor(actor): Actor) -> Response {
    dispatch(courses::get_all_courses(&state.api, actor).await)
}

async fn http_get_course(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    PathId(id): PathId<i64>,
) -> Response {
    dispatch(courses::get_course_by_id(&state.api, actor, CourseId(id)).await)
}

async fn http_create_course(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: CreateBody<CreateCourseRequest>,
) -> Response {
    match body {
        CreateBody::Parsed(req) => dispatch(courses::create_new_course(&state.api, actor, req).await),
        CreateBody::Malformed(err) => reject_malformed(&state, actor, &COURSE, &err),
    }
}

// semesters

async fn http_list_semesters(State(state): State<Arc<AppState>>, Actor(actor): Actor) -> Response {
    dispatch(semesters::get_all_semesters(&state.api, actor).await)
}

async fn http_current_semester(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
) -> Response {
    dispatch(semesters::get_current_semester(&state.api, actor).await)
}

async fn http_get_semester(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    PathId(id): PathId<i64>,
) -> Response {
    dispatch(semesters::get_semester_by_id(&state.api, actor, SemesterId(id)).await)
}

async fn http_course_semesters(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    PathId(id): PathId<i64>,
) -> Response {
    dispatch(semesters::get_yearly_semesters(&state.api, actor, CourseId(id)).await)
}

async fn http_create_semester(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: CreateBody<CreateSemesterRequest>,
) -> Response {
    match body {
        CreateBody::Parsed(req) => dispatch(semesters::create_new_semester(&state.api, actor, req).await),
        CreateBody::Malformed(err) => reject_malformed(&state, actor, &SEMESTER, &err),
    }
}

// exams

async fn http_list_exams(State(state): State<Arc<AppState>>, Actor(actor): Actor) -> Response {
    dispatch(exams::get_all_exams(&state.api, actor).await)
}

async fn http_get_exam(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    PathId(id): PathId<i64>,
) -> Response {
    dispatch(exams::get_exam_by_id(&state.api, actor, ExamId(id)).await)
}

async fn http_semester_exams(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    PathId(id): PathId<i64>,
) -> Response {
    dispatch(exams::get_exams_by_semester(&state.api, actor, SemesterId(id)).await)
}

async fn http_create_exam(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: CreateBody<CreateExamRequest>,
) -> Response {
    match body {
        CreateBody::Parsed(req) => dispatch(exams::create_new_exam(&state.api, actor, req).await),
        CreateBody::Malformed(err) => reject_malformed(&state, actor, &EXAM, &err),
    }
}

// questions

async fn http_list_questions(State(state): State<Arc<AppState>>, Actor(actor): Actor) -> Response {
    dispatch(questions::get_all_questions(&state.api, actor).await)
}

async fn http_get_question(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    PathId(id): PathId<i64>,
) -> Response {
    dispatch(questions::get_question_by_id(&state.api, actor, QuestionId(id)).await)
}

async fn http_exam_questions(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    PathId(id): PathId<i64>,
) -> Response {
    dispatch(questions::get_questions_by_exam(&state.api, actor, ExamId(id)).await)
}

async fn http_create_question(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: CreateBody<CreateQuestionRequest>,
) -> Response {
    match body {
        CreateBody::Parsed(req) => dispatch(questions::create_new_question(&state.api, actor, req).await),
        CreateBody::Malformed(err) => reject_malformed(&state, actor, &QUESTION, &err),
    }
}

// bug reports

async fn http_list_bug_reports(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
) -> Response {
    dispatch(bug_reports::get_all_bug_reports(&state.api, actor).await)
}

async fn http_get_bug_report(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    PathId(id): PathId<i64>,
) -> Response {
    dispatch(bug_reports::get_bug_report_by_id(&state.api, actor, BugReportId(id)).await)
}

async fn http_create_bug_report(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    body: CreateBody<CreateBugReportRequest>,
) -> Response {
    match body {
        CreateBody::Parsed(req) => dispatch(bug_reports::create_new_bug_report(&state.api, actor, req).await),
        CreateBody::Malformed(err) => reject_malformed(&state, actor, &BUG_REPORT, &err),
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
