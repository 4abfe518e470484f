use super::{build_settings, prepare_database_url, Settings};

use config::Environment;

fn environment(vars: &[(&str, &str)]) -> Environment {
    Environment::default().try_parsing(true).source(Some(
        vars.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    ))
}

#[test]
fn defaults_apply_without_environment() {
    let settings = build_settings(environment(&[])).expect("settings");
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.port, 4000);
    assert_eq!(settings.public_url(), "http://localhost:4000");
    assert!(settings.uses_dev_secret());
}

#[test]
fn environment_overrides_token_settings() {
    let settings = build_settings(environment(&[
        ("JWT_SECRET", "s3cret"),
        ("TOKEN_TTL_SECONDS", "600"),
    ]))
    .expect("settings");
    assert_eq!(settings.jwt_secret, "s3cret");
    assert_eq!(settings.token_ttl_seconds, 600);
    assert!(!settings.uses_dev_secret());
}

#[test]
fn environment_overrides_port_and_url() {
    let settings = build_settings(environment(&[
        ("PORT", "8080"),
        ("HTTP_URL", "https://quiz.example.com:"),
        ("DATABASE_URL", "sqlite::memory:"),
    ]))
    .expect("settings");
    assert_eq!(settings.port, 8080);
    assert_eq!(settings.bind_addr(), "0.0.0.0:8080");
    assert_eq!(settings.public_url(), "https://quiz.example.com:8080");
    assert_eq!(settings.database_url, "sqlite::memory:");
}

#[test]
fn invalid_port_is_rejected() {
    assert!(build_settings(environment(&[("PORT", "not-a-port")])).is_err());
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        prepare_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
}

#[test]
fn keeps_sqlite_urls_untouched() {
    assert_eq!(prepare_database_url("sqlite::memory:"), "sqlite::memory:");
    assert_eq!(
        prepare_database_url("sqlite://./data/quiz.db"),
        "sqlite://./data/quiz.db"
    );
}

#[test]
fn windows_drive_paths_use_single_colon_form() {
    assert_eq!(
        prepare_database_url("C:\\Users\\alice\\quiz.db"),
        "sqlite:C:/Users/alice/quiz.db"
    );
    assert_eq!(
        prepare_database_url("sqlite:C:\\Users\\alice\\quiz.db"),
        "sqlite:C:/Users/alice/quiz.db"
    );
    assert_eq!(
        prepare_database_url("sqlite://C:/Users/alice/quiz.db"),
        "sqlite:C:/Users/alice/quiz.db"
    );
}

#[test]
fn blank_url_falls_back_to_default() {
    assert_eq!(prepare_database_url("  "), Settings::default().database_url);
}

#[tokio::test]
async fn prepared_database_url_creates_openable_sqlite_file() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("server.db");

    let prepared = prepare_database_url(db_path.to_string_lossy().as_ref());
    let storage = storage::Storage::new(&prepared).await.expect("open sqlite");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should be created: {}",
        db_path.display()
    );
}
