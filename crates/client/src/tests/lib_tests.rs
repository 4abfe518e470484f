use std::sync::Arc;

use super::*;
use server::{build_router, AppState};
use server_api::{ApiContext, EventBus, TokenIssuer};
use storage::Storage;
use tokio::net::TcpListener;

async fn spawn_quiz_server() -> anyhow::Result<(String, Storage)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let storage = Storage::new("sqlite::memory:").await?;
    let state = AppState {
        api: ApiContext::new(storage.clone(), Arc::new(EventBus::new(16))),
        tokens: TokenIssuer::new("client-test-secret", 3600),
    };
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = build_router(Arc::new(state));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), storage))
}

fn register_request(email: &str, password: &str) -> RegisterRequest {
    RegisterRequest {
        email: Some(email.to_string()),
        username: Some("ada".to_string()),
        password: Some(password.to_string()),
    }
}

fn course_request(title: &str) -> CreateCourseRequest {
    CreateCourseRequest {
        title: Some(title.to_string()),
        description: None,
    }
}

#[test]
fn base_url_gains_trailing_slash() {
    let client = QuizClient::new("http://localhost:4000/api").expect("client");
    assert_eq!(client.base_url().as_str(), "http://localhost:4000/api/");
    assert!(matches!(
        QuizClient::new("not a url"),
        Err(ClientError::Url(_))
    ));
}

#[tokio::test]
async fn creates_and_reads_back_a_semester() {
    let (server_url, _storage) = spawn_quiz_server().await.expect("spawn server");
    let client = QuizClient::new(&server_url).expect("client");

    let course = client
        .create_course(&course_request("Physics"))
        .await
        .expect("course");
    let semester = client
        .create_semester(&CreateSemesterRequest {
            title: Some("Fall 2024".into()),
            course_id: Some(course.id),
        })
        .await
        .expect("semester");
    assert_eq!(semester.title, "Fall 2024");
    assert_eq!(semester.course_id, course.id);

    assert_eq!(client.get_semester(semester.id).await.expect("get"), semester);
    assert_eq!(client.current_semester().await.expect("current"), semester);
    assert_eq!(
        client.semesters_for_course(course.id).await.expect("by course"),
        vec![semester]
    );
}

#[tokio::test]
async fn duplicate_create_surfaces_existing_record() {
    let (server_url, _storage) = spawn_quiz_server().await.expect("spawn server");
    let client = QuizClient::new(&server_url).expect("client");

    let first = client
        .create_course(&course_request("Chemistry"))
        .await
        .expect("first");
    let err = client
        .create_course(&course_request("Chemistry"))
        .await
        .expect_err("duplicate");

    match err {
        ClientError::Duplicate { message, existing } => {
            assert_eq!(message, "Course already exists");
            let existing: Course = serde_json::from_value(existing).expect("course");
            assert_eq!(existing, first);
        }
        other => panic!("expected duplicate, got {other:?}"),
    }
    assert_eq!(client.list_courses().await.expect("list").len(), 1);
}

#[tokio::test]
async fn missing_records_and_fields_map_to_api_errors() {
    let (server_url, _storage) = spawn_quiz_server().await.expect("spawn server");
    let client = QuizClient::new(&server_url).expect("client");

    match client.get_exam(ExamId(404)).await {
        Err(ClientError::Api { status, message }) => {
            assert_eq!(status, 404);
            assert_eq!(message, "Exam not found");
        }
        other => panic!("expected 404, got {other:?}"),
    }

    match client.create_semester(&CreateSemesterRequest::default()).await {
        Err(ClientError::Api { status, message }) => {
            assert_eq!(status, 400);
            assert_eq!(message, "Create semester: Missing Field/s event");
        }
        other => panic!("expected missing field, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_collections_decode_as_empty_lists() {
    let (server_url, _storage) = spawn_quiz_server().await.expect("spawn server");
    let client = QuizClient::new(&server_url).expect("client");

    assert!(client.list_users().await.expect("users").is_empty());
    assert!(client.list_exams().await.expect("exams").is_empty());
    assert!(client.list_bug_reports().await.expect("reports").is_empty());
}

#[tokio::test]
async fn bug_report_defaults_reporter_to_logged_in_user() {
    let (server_url, _storage) = spawn_quiz_server().await.expect("spawn server");
    let anonymous = QuizClient::new(&server_url).expect("client");
    let registered = anonymous
        .register(&register_request("ada@example.com", "hunter22"))
        .await
        .expect("register");
    let session = anonymous
        .login("ada@example.com", "hunter22")
        .await
        .expect("login");
    assert_eq!(session.user, registered.user);

    let client = QuizClient::new(&server_url)
        .expect("client")
        .with_token(session.token);
    let report = client
        .create_bug_report(&CreateBugReportRequest {
            user_id: None,
            title: Some("Timer".into()),
            description: Some("Timer keeps running after submit".into()),
        })
        .await
        .expect("report");
    assert_eq!(report.user_id, Some(registered.user.id));
    assert_eq!(
        client.get_bug_report(report.id).await.expect("get").title,
        "Timer"
    );
}

#[tokio::test]
async fn rejected_logins_and_taken_emails_surface_as_errors() {
    let (server_url, _storage) = spawn_quiz_server().await.expect("spawn server");
    let client = QuizClient::new(&server_url).expect("client");
    let first = client
        .register(&register_request("ada@example.com", "hunter22"))
        .await
        .expect("register");

    match client.login("ada@example.com", "wrong").await {
        Err(ClientError::Api { status, message }) => {
            assert_eq!(status, 401);
            assert_eq!(message, "Invalid email or password");
        }
        other => panic!("expected 401, got {other:?}"),
    }

    match client
        .register(&register_request("ada@example.com", "other"))
        .await
    {
        Err(ClientError::Duplicate { message, existing }) => {
            assert_eq!(message, "User already exists");
            let existing: User = serde_json::from_value(existing).expect("user");
            assert_eq!(existing, first.user);
        }
        other => panic!("expected duplicate, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_route_is_reported_with_raw_body() {
    let (server_url, _storage) = spawn_quiz_server().await.expect("spawn server");
    let client = QuizClient::new(&server_url).expect("client");

    match client.get::<Value>("nowhere", "anything").await {
        Err(ClientError::Api { status, .. }) => assert_eq!(status, 404),
        other => panic!("expected 404, got {other:?}"),
    }
}
