use std::sync::Mutex;

use serde_json::json;
use shared::{
    domain::{Course, CourseId, ExamId, Semester, SemesterId},
    error::ErrorKind,
    protocol::{
        CreateBugReportRequest, CreateCourseRequest, CreateExamRequest, CreateQuestionRequest,
        CreateSemesterRequest, CreateUserRequest, ResponseStatus,
    },
};

use super::*;

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<ErrorEvent>>,
}

impl RecordingSink {
    fn kinds(&self) -> Vec<ErrorKind> {
        self.events
            .lock()
            .expect("sink lock")
            .iter()
            .map(|event| event.kind)
            .collect()
    }
}

impl ErrorEventSink for RecordingSink {
    fn emit(&self, event: &ErrorEvent) {
        self.events.lock().expect("sink lock").push(event.clone());
    }
}

async fn setup() -> (ApiContext, Arc<RecordingSink>) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let sink = Arc::new(RecordingSink::default());
    (ApiContext::new(storage, sink.clone()), sink)
}

async fn seed_course(ctx: &ApiContext) -> Course {
    ctx.storage
        .create_course("Physics", None)
        .await
        .expect("course")
        .created()
        .expect("created")
}

async fn seed_semester(ctx: &ApiContext, course: CourseId) -> Semester {
    ctx.storage
        .create_semester("Fall 2024", course)
        .await
        .expect("semester")
        .created()
        .expect("created")
}

fn semester_request(title: Option<&str>, course_id: Option<i64>) -> CreateSemesterRequest {
    CreateSemesterRequest {
        title: title.map(str::to_string),
        course_id: course_id.map(CourseId),
    }
}

fn data(reply: &Reply) -> &serde_json::Value {
    reply.body.data.as_ref().expect("data payload")
}

#[tokio::test]
async fn missing_semester_answers_not_found_and_emits_once() {
    let (ctx, sink) = setup().await;
    let reply = semesters::get_semester_by_id(&ctx, None, SemesterId(42))
        .await
        .expect("handled");

    assert_eq!(reply.status, 404);
    assert_eq!(reply.body.status, ResponseStatus::Fail);
    assert_eq!(reply.body.message.as_deref(), Some("Semester not found"));
    assert!(reply.body.data.is_none());
    assert_eq!(sink.kinds(), vec![ErrorKind::NotFound]);
}

#[tokio::test]
async fn current_semester_is_not_found_on_empty_store() {
    let (ctx, sink) = setup().await;
    let reply = semesters::get_current_semester(&ctx, None)
        .await
        .expect("handled");
    assert_eq!(reply.status, 404);
    assert_eq!(sink.kinds(), vec![ErrorKind::NotFound]);
}

#[tokio::test]
async fn empty_semester_list_is_still_found() {
    let (ctx, sink) = setup().await;
    let reply = semesters::get_all_semesters(&ctx, None)
        .await
        .expect("handled");
    assert_eq!(reply.status, 200);
    assert_eq!(data(&reply), &json!({ "semesters": [] }));
    assert!(sink.kinds().is_empty());
}

#[tokio::test]
async fn create_semester_without_course_id_writes_nothing() {
    let (ctx, sink) = setup().await;
    let reply = semesters::create_new_semester(&ctx, None, semester_request(Some("Fall 2024"), None))
        .await
        .expect("handled");

    assert_eq!(reply.status, 400);
    assert_eq!(
        reply.body.message.as_deref(),
        Some("Create semester: Missing Field/s event")
    );
    assert_eq!(sink.kinds(), vec![ErrorKind::MissingField]);
    assert!(ctx.storage.find_all_semesters().await.expect("list").is_empty());
}

#[tokio::test]
async fn blank_title_counts_as_missing() {
    let (ctx, sink) = setup().await;
    let course = seed_course(&ctx).await;
    let reply = semesters::create_new_semester(&ctx, None, semester_request(Some("  "), Some(course.id.0)))
        .await
        .expect("handled");
    assert_eq!(reply.status, 400);
    assert_eq!(sink.kinds(), vec![ErrorKind::MissingField]);
}

#[tokio::test]
async fn creating_the_same_semester_twice_echoes_the_first() {
    let (ctx, sink) = setup().await;
    let course = seed_course(&ctx).await;

    let first = semesters::create_new_semester(
        &ctx,
        None,
        semester_request(Some("Fall 2024"), Some(course.id.0)),
    )
    .await
    .expect("first");
    assert_eq!(first.status, 200);
    let created: Semester =
        serde_json::from_value(data(&first)["semester"].clone()).expect("semester json");
    assert_eq!(created.title, "Fall 2024");
    assert_eq!(created.course_id, course.id);

    let second = semesters::create_new_semester(
        &ctx,
        None,
        semester_request(Some("Fall 2024"), Some(course.id.0)),
    )
    .await
    .expect("second");
    assert_eq!(second.status, 400);
    assert_eq!(data(&second)["semester"], json!("Semester already exists"));
    let echoed: Semester =
        serde_json::from_value(data(&second)["foundSemester"].clone()).expect("found json");
    assert_eq!(echoed, created);

    assert_eq!(sink.kinds(), vec![ErrorKind::Conflict]);
    assert_eq!(ctx.storage.find_all_semesters().await.expect("list").len(), 1);
}

#[tokio::test]
async fn semester_for_unknown_course_is_a_bad_request() {
    let (ctx, sink) = setup().await;
    let reply = semesters::create_new_semester(&ctx, None, semester_request(Some("Fall 2024"), Some(9)))
        .await
        .expect("handled");
    assert_eq!(reply.status, 400);
    assert_eq!(reply.body.message.as_deref(), Some("Bad request"));

    let events = sink.events.lock().expect("sink lock");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, ErrorKind::BadRequest);
    assert_eq!(events[0].topic.as_deref(), Some("Failed to create semester"));
}

#[tokio::test]
async fn store_failure_is_a_server_error_that_keeps_the_source() {
    let (ctx, sink) = setup().await;
    ctx.storage.pool().close().await;

    let unhandled = semesters::get_all_semesters(&ctx, Some(UserId(5)))
        .await
        .expect_err("store is closed");
    assert_eq!(unhandled.reply.status, 500);
    assert_eq!(unhandled.reply.body.status, ResponseStatus::Error);
    assert_eq!(unhandled.event.topic.as_deref(), Some("Get all semesters"));
    assert_eq!(unhandled.event.actor, Some(UserId(5)));
    assert!(matches!(
        unhandled.source.downcast_ref::<sqlx::Error>(),
        Some(sqlx::Error::PoolClosed)
    ));
    assert_eq!(sink.kinds(), vec![ErrorKind::ServerError]);
}

#[tokio::test]
async fn yearly_semesters_name_the_missing_course() {
    let (ctx, sink) = setup().await;
    let reply = semesters::get_yearly_semesters(&ctx, None, CourseId(3))
        .await
        .expect("handled");
    assert_eq!(reply.status, 404);
    assert_eq!(reply.body.message.as_deref(), Some("Course not found"));
    assert_eq!(sink.kinds(), vec![ErrorKind::NotFound]);

    let course = seed_course(&ctx).await;
    seed_semester(&ctx, course.id).await;
    let reply = semesters::get_yearly_semesters(&ctx, None, course.id)
        .await
        .expect("handled");
    assert_eq!(reply.status, 200);
    assert_eq!(data(&reply)["semesters"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn duplicate_course_title_is_a_conflict() {
    let (ctx, sink) = setup().await;
    let request = CreateCourseRequest {
        title: Some("Chemistry".into()),
        description: Some("Organic".into()),
    };
    let first = courses::create_new_course(&ctx, None, request.clone())
        .await
        .expect("first");
    assert_eq!(first.status, 200);
    assert_eq!(data(&first)["course"]["description"], json!("Organic"));

    let second = courses::create_new_course(&ctx, None, request)
        .await
        .expect("second");
    assert_eq!(second.status, 400);
    assert_eq!(data(&second)["foundCourse"], data(&first)["course"]);
    assert_eq!(sink.kinds(), vec![ErrorKind::Conflict]);
}

#[tokio::test]
async fn user_email_is_normalized_before_duplicate_check() {
    let (ctx, sink) = setup().await;
    let first = users::create_new_user(
        &ctx,
        None,
        CreateUserRequest {
            email: Some("Ada@Example.com".into()),
            username: Some("ada".into()),
            role: None,
        },
    )
    .await
    .expect("first");
    assert_eq!(first.status, 200);
    assert_eq!(data(&first)["user"]["email"], json!("ada@example.com"));
    assert_eq!(data(&first)["user"]["role"], json!("student"));

    let second = users::create_new_user(
        &ctx,
        None,
        CreateUserRequest {
            email: Some("ada@example.com".into()),
            username: Some("other".into()),
            role: None,
        },
    )
    .await
    .expect("second");
    assert_eq!(second.status, 400);
    assert_eq!(sink.kinds(), vec![ErrorKind::Conflict]);

    let missing = users::get_user_by_id(&ctx, None, UserId(99))
        .await
        .expect("handled");
    assert_eq!(missing.body.message.as_deref(), Some("User not found"));
}

#[tokio::test]
async fn exams_are_scoped_to_their_semester() {
    let (ctx, sink) = setup().await;
    let course = seed_course(&ctx).await;
    let semester = seed_semester(&ctx, course.id).await;

    let created = exams::create_new_exam(
        &ctx,
        None,
        CreateExamRequest {
            title: Some("Midterm".into()),
            semester_id: Some(semester.id),
            duration_minutes: Some(60),
        },
    )
    .await
    .expect("create");
    assert_eq!(created.status, 200);
    assert_eq!(data(&created)["exam"]["durationMinutes"], json!(60));

    let listed = exams::get_exams_by_semester(&ctx, None, semester.id)
        .await
        .expect("list");
    assert_eq!(data(&listed)["exams"].as_array().map(Vec::len), Some(1));

    let unknown = exams::get_exams_by_semester(&ctx, None, SemesterId(999))
        .await
        .expect("handled");
    assert_eq!(unknown.body.message.as_deref(), Some("Semester not found"));

    let negative = exams::create_new_exam(
        &ctx,
        None,
        CreateExamRequest {
            title: Some("Final".into()),
            semester_id: Some(semester.id),
            duration_minutes: Some(0),
        },
    )
    .await
    .expect("handled");
    assert_eq!(negative.status, 400);
    assert_eq!(sink.kinds(), vec![ErrorKind::NotFound, ErrorKind::BadRequest]);
}

#[tokio::test]
async fn question_answer_index_must_be_in_range() {
    let (ctx, sink) = setup().await;
    let course = seed_course(&ctx).await;
    let semester = seed_semester(&ctx, course.id).await;
    let exam = ctx
        .storage
        .create_exam("Quiz 1", semester.id, None)
        .await
        .expect("exam")
        .created()
        .expect("created");

    let request = |correct_answer| CreateQuestionRequest {
        exam_id: Some(exam.id),
        content: Some("2 + 2?".into()),
        answers: Some(vec!["3".into(), "4".into()]),
        correct_answer,
    };

    let out_of_range = questions::create_new_question(&ctx, None, request(Some(2)))
        .await
        .expect("handled");
    assert_eq!(out_of_range.status, 400);

    let created = questions::create_new_question(&ctx, None, request(Some(1)))
        .await
        .expect("handled");
    assert_eq!(created.status, 200);
    assert_eq!(data(&created)["question"]["answers"], json!(["3", "4"]));
    assert_eq!(data(&created)["question"]["correctAnswer"], json!(1));

    let no_answers = questions::create_new_question(
        &ctx,
        None,
        CreateQuestionRequest {
            answers: Some(Vec::new()),
            ..request(None)
        },
    )
    .await
    .expect("handled");
    assert_eq!(no_answers.status, 400);

    let by_unknown_exam = questions::get_questions_by_exam(&ctx, None, ExamId(77))
        .await
        .expect("handled");
    assert_eq!(by_unknown_exam.status, 404);

    assert_eq!(
        sink.kinds(),
        vec![
            ErrorKind::BadRequest,
            ErrorKind::MissingField,
            ErrorKind::NotFound
        ]
    );
}

#[tokio::test]
async fn bug_report_defaults_reporter_to_actor() {
    let (ctx, sink) = setup().await;
    let user = ctx
        .storage
        .create_user("reporter@example.com", "reporter", shared::domain::Role::Student)
        .await
        .expect("user")
        .created()
        .expect("created");

    let reply = bug_reports::create_new_bug_report(
        &ctx,
        Some(user.id),
        CreateBugReportRequest {
            user_id: None,
            title: Some("Timer".into()),
            description: Some("Timer does not stop".into()),
        },
    )
    .await
    .expect("handled");
    assert_eq!(reply.status, 200);
    assert_eq!(data(&reply)["bugReport"]["userId"], json!(user.id.0));

    let missing = bug_reports::create_new_bug_report(&ctx, None, CreateBugReportRequest::default())
        .await
        .expect("handled");
    assert_eq!(
        missing.body.message.as_deref(),
        Some("Create bug report: Missing Field/s event")
    );
    assert_eq!(sink.kinds(), vec![ErrorKind::MissingField]);
}

#[tokio::test]
async fn unknown_actor_files_an_anonymous_bug_report() {
    let (ctx, sink) = setup().await;

    let reply = bug_reports::create_new_bug_report(
        &ctx,
        Some(UserId(999)),
        CreateBugReportRequest {
            user_id: None,
            title: Some("Timer".into()),
            description: Some("broken".into()),
        },
    )
    .await
    .expect("handled");
    assert_eq!(reply.status, 200);
    assert_eq!(data(&reply)["bugReport"]["userId"], json!(null));
    assert!(sink.kinds().is_empty());

    let explicit = bug_reports::create_new_bug_report(
        &ctx,
        None,
        CreateBugReportRequest {
            user_id: Some(UserId(999)),
            title: Some("Timer".into()),
            description: Some("broken".into()),
        },
    )
    .await
    .expect("handled");
    assert_eq!(explicit.status, 400);
    assert_eq!(sink.kinds(), vec![ErrorKind::BadRequest]);
}

#[tokio::test]
async fn lost_insert_race_rereads_the_winner() {
    let (ctx, sink) = setup().await;
    let course = seed_course(&ctx).await;
    let winner = seed_semester(&ctx, course.id).await;

    let reply = settle_insert(
        &ctx,
        None,
        &SEMESTER,
        InsertOutcome::<Semester>::Duplicate,
        ctx.storage.find_semester_by_data("Fall 2024", course.id),
    )
    .await
    .expect("settled");

    assert_eq!(reply.status, 400);
    assert_eq!(data(&reply)["semester"], json!("Semester already exists"));
    assert_eq!(
        data(&reply)["foundSemester"],
        serde_json::to_value(&winner).expect("json")
    );
    assert_eq!(sink.kinds(), vec![ErrorKind::Conflict]);
}

#[tokio::test]
async fn lost_insert_race_without_winner_is_a_bad_request() {
    let (ctx, sink) = setup().await;
    let course = seed_course(&ctx).await;

    let reply = settle_insert(
        &ctx,
        None,
        &SEMESTER,
        InsertOutcome::<Semester>::Duplicate,
        ctx.storage.find_semester_by_data("Spring 2025", course.id),
    )
    .await
    .expect("settled");

    assert_eq!(reply.status, 400);
    assert_eq!(reply.body.message.as_deref(), Some("Bad request"));
    assert!(reply.body.data.is_none());
    assert_eq!(sink.kinds(), vec![ErrorKind::BadRequest]);
}

#[tokio::test]
async fn event_bus_delivers_to_subscribers() {
    let bus = EventBus::new(8);
    let mut rx = bus.subscribe();
    bus.emit(&ErrorEvent::not_found(None, "Exam not found", "Exam"));
    let event = rx.recv().await.expect("event");
    assert_eq!(event.kind, ErrorKind::NotFound);

    // Emitting without subscribers must not fail.
    drop(rx);
    bus.emit(&ErrorEvent::server_error(None, "Get all exams"));
}
