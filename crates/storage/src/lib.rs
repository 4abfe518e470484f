use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{
    BugReport, BugReportId, Course, CourseId, Exam, ExamId, Question, QuestionId, Role, Semester,
    SemesterId, User, UserId,
};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// Result of an insert guarded by store constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome<T> {
    Created(T),
    /// A unique index already holds a row with the same natural key.
    Duplicate,
    /// The row references a parent that does not exist.
    Rejected,
}

impl<T> InsertOutcome<T> {
    pub fn created(self) -> Option<T> {
        match self {
            InsertOutcome::Created(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewQuestion<'a> {
    pub exam_id: ExamId,
    pub content: &'a str,
    pub answers: &'a [String],
    pub correct_answer: u32,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    // users

    pub async fn find_all_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query("SELECT id, email, username, role, created_at FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(user_from_row).collect())
    }

    pub async fn find_user_by_id(&self, user_id: UserId) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, email, username, role, created_at FROM users WHERE id = ?")
            .bind(user_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(user_from_row))
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row =
            sqlx::query("SELECT id, email, username, role, created_at FROM users WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.as_ref().map(user_from_row))
    }

    pub async fn create_user(
        &self,
        email: &str,
        username: &str,
        role: Role,
    ) -> Result<InsertOutcome<User>> {
        self.insert_user(email, username, role, None).await
    }

    /// Same as `create_user`, storing an already hashed password.
    pub async fn create_user_with_password(
        &self,
        email: &str,
        username: &str,
        role: Role,
        password_hash: &str,
    ) -> Result<InsertOutcome<User>> {
        self.insert_user(email, username, role, Some(password_hash))
            .await
    }

    /// The user registered under `email` and their password hash, if any.
    pub async fn find_user_credentials(
        &self,
        email: &str,
    ) -> Result<Option<(User, Option<String>)>> {
        let row = sqlx::query(
            "SELECT id, email, username, role, created_at, password_hash FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row
            .as_ref()
            .map(|r| (user_from_row(r), r.get::<Option<String>, _>(5))))
    }

    async fn insert_user(
        &self,
        email: &str,
        username: &str,
        role: Role,
        password_hash: Option<&str>,
    ) -> Result<InsertOutcome<User>> {
        let inserted = sqlx::query(
            "INSERT INTO users (email, username, role, password_hash, created_at) VALUES (?, ?, ?, ?, ?)
             RETURNING id, email, username, role, created_at",
        )
        .bind(email)
        .bind(username)
        .bind(role.as_str())
        .bind(password_hash)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await;
        classify_insert(inserted, |row| Ok(user_from_row(row)))
    }

    // courses

    pub async fn find_all_courses(&self) -> Result<Vec<Course>> {
        let rows = sqlx::query("SELECT id, title, description, created_at FROM courses ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(course_from_row).collect())
    }

    pub async fn find_course_by_id(&self, course_id: CourseId) -> Result<Option<Course>> {
        let row = sqlx::query("SELECT id, title, description, created_at FROM courses WHERE id = ?")
            .bind(course_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(course_from_row))
    }

    pub async fn find_course_by_title(&self, title: &str) -> Result<Option<Course>> {
        let row =
            sqlx::query("SELECT id, title, description, created_at FROM courses WHERE title = ?")
                .bind(title)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.as_ref().map(course_from_row))
    }

    pub async fn create_course(
        &self,
        title: &str,
        description: Option<&str>,
    ) -> Result<InsertOutcome<Course>> {
        let inserted = sqlx::query(
            "INSERT INTO courses (title, description, created_at) VALUES (?, ?, ?)
             RETURNING id, title, description, created_at",
        )
        .bind(title)
        .bind(description)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await;
        classify_insert(inserted, |row| Ok(course_from_row(row)))
    }

    // semesters

    pub async fn find_all_semesters(&self) -> Result<Vec<Semester>> {
        let rows = sqlx::query("SELECT id, title, course_id, created_at FROM semesters ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(semester_from_row).collect())
    }

    /// The most recently created semester across all courses.
    pub async fn find_current_semester(&self) -> Result<Option<Semester>> {
        let row = sqlx::query(
            "SELECT id, title, course_id, created_at FROM semesters
             ORDER BY created_at DESC, id DESC
             LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(semester_from_row))
    }

    pub async fn find_semester_by_id(&self, semester_id: SemesterId) -> Result<Option<Semester>> {
        let row = sqlx::query("SELECT id, title, course_id, created_at FROM semesters WHERE id = ?")
            .bind(semester_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(semester_from_row))
    }

    pub async fn find_semesters_by_course(&self, course_id: CourseId) -> Result<Vec<Semester>> {
        let rows = sqlx::query(
            "SELECT id, title, course_id, created_at FROM semesters WHERE course_id = ? ORDER BY id",
        )
        .bind(course_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(semester_from_row).collect())
    }

    pub async fn find_semester_by_data(
        &self,
        title: &str,
        course_id: CourseId,
    ) -> Result<Option<Semester>> {
        let row = sqlx::query(
            "SELECT id, title, course_id, created_at FROM semesters WHERE title = ? AND course_id = ?",
        )
        .bind(title)
        .bind(course_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(semester_from_row))
    }

    pub async fn create_semester(
        &self,
        title: &str,
        course_id: CourseId,
    ) -> Result<InsertOutcome<Semester>> {
        let inserted = sqlx::query(
            "INSERT INTO semesters (title, course_id, created_at) VALUES (?, ?, ?)
             RETURNING id, title, course_id, created_at",
        )
        .bind(title)
        .bind(course_id.0)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await;
        classify_insert(inserted, |row| Ok(semester_from_row(row)))
    }

    // exams

    pub async fn find_all_exams(&self) -> Result<Vec<Exam>> {
        let rows = sqlx::query(
            "SELECT id, title, semester_id, duration_minutes, created_at FROM exams ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(exam_from_row).collect())
    }

    pub async fn find_exam_by_id(&self, exam_id: ExamId) -> Result<Option<Exam>> {
        let row = sqlx::query(
            "SELECT id, title, semester_id, duration_minutes, created_at FROM exams WHERE id = ?",
        )
        .bind(exam_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(exam_from_row))
    }

    pub async fn find_exams_by_semester(&self, semester_id: SemesterId) -> Result<Vec<Exam>> {
        let rows = sqlx::query(
            "SELECT id, title, semester_id, duration_minutes, created_at FROM exams
             WHERE semester_id = ?
             ORDER BY id",
        )
        .bind(semester_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(exam_from_row).collect())
    }

    pub async fn find_exam_by_data(
        &self,
        title: &str,
        semester_id: SemesterId,
    ) -> Result<Option<Exam>> {
        let row = sqlx::query(
            "SELECT id, title, semester_id, duration_minutes, created_at FROM exams
             WHERE title = ? AND semester_id = ?",
        )
        .bind(title)
        .bind(semester_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(exam_from_row))
    }

    pub async fn create_exam(
        &self,
        title: &str,
        semester_id: SemesterId,
        duration_minutes: Option<i64>,
    ) -> Result<InsertOutcome<Exam>> {
        let inserted = sqlx::query(
            "INSERT INTO exams (title, semester_id, duration_minutes, created_at) VALUES (?, ?, ?, ?)
             RETURNING id, title, semester_id, duration_minutes, created_at",
        )
        .bind(title)
        .bind(semester_id.0)
        .bind(duration_minutes)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await;
        classify_insert(inserted, |row| Ok(exam_from_row(row)))
    }

    // questions

    pub async fn find_all_questions(&self) -> Result<Vec<Question>> {
        let rows = sqlx::query(
            "SELECT id, exam_id, content, answers, correct_answer, created_at FROM questions ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(question_from_row).collect()
    }

    pub async fn find_question_by_id(&self, question_id: QuestionId) -> Result<Option<Question>> {
        let row = sqlx::query(
            "SELECT id, exam_id, content, answers, correct_answer, created_at FROM questions WHERE id = ?",
        )
        .bind(question_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(question_from_row).transpose()
    }

    pub async fn find_questions_by_exam(&self, exam_id: ExamId) -> Result<Vec<Question>> {
        let rows = sqlx::query(
            "SELECT id, exam_id, content, answers, correct_answer, created_at FROM questions
             WHERE exam_id = ?
             ORDER BY id",
        )
        .bind(exam_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(question_from_row).collect()
    }

    pub async fn find_question_by_data(
        &self,
        exam_id: ExamId,
        content: &str,
    ) -> Result<Option<Question>> {
        let row = sqlx::query(
            "SELECT id, exam_id, content, answers, correct_answer, created_at FROM questions
             WHERE exam_id = ? AND content = ?",
        )
        .bind(exam_id.0)
        .bind(content)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(question_from_row).transpose()
    }

    pub async fn create_question(&self, question: NewQuestion<'_>) -> Result<InsertOutcome<Question>> {
        let answers =
            serde_json::to_string(question.answers).context("failed to encode question answers")?;
        let inserted = sqlx::query(
            "INSERT INTO questions (exam_id, content, answers, correct_answer, created_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id, exam_id, content, answers, correct_answer, created_at",
        )
        .bind(question.exam_id.0)
        .bind(question.content)
        .bind(answers)
        .bind(i64::from(question.correct_answer))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await;
        classify_insert(inserted, question_from_row)
    }

    // bug reports

    pub async fn find_all_bug_reports(&self) -> Result<Vec<BugReport>> {
        let rows = sqlx::query(
            "SELECT id, user_id, title, description, created_at FROM bug_reports ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(bug_report_from_row).collect())
    }

    pub async fn find_bug_report_by_id(&self, report_id: BugReportId) -> Result<Option<BugReport>> {
        let row = sqlx::query(
            "SELECT id, user_id, title, description, created_at FROM bug_reports WHERE id = ?",
        )
        .bind(report_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(bug_report_from_row))
    }

    pub async fn create_bug_report(
        &self,
        user_id: Option<UserId>,
        title: &str,
        description: &str,
    ) -> Result<InsertOutcome<BugReport>> {
        let inserted = sqlx::query(
            "INSERT INTO bug_reports (user_id, title, description, created_at) VALUES (?, ?, ?, ?)
             RETURNING id, user_id, title, description, created_at",
        )
        .bind(user_id.map(|id| id.0))
        .bind(title)
        .bind(description)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await;
        classify_insert(inserted, |row| Ok(bug_report_from_row(row)))
    }
}

/// True when `err` is the store's "record does not exist" failure.
pub fn is_record_missing(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<sqlx::Error>(),
        Some(sqlx::Error::RowNotFound)
    )
}

fn classify_insert<T>(
    inserted: std::result::Result<SqliteRow, sqlx::Error>,
    map: impl FnOnce(&SqliteRow) -> Result<T>,
) -> Result<InsertOutcome<T>> {
    match inserted {
        Ok(row) => Ok(InsertOutcome::Created(map(&row)?)),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Ok(InsertOutcome::Duplicate),
        Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
            Ok(InsertOutcome::Rejected)
        }
        Err(err) => Err(err.into()),
    }
}

fn user_from_row(r: &SqliteRow) -> User {
    User {
        id: UserId(r.get::<i64, _>(0)),
        email: r.get::<String, _>(1),
        username: r.get::<String, _>(2),
        role: Role::parse(&r.get::<String, _>(3)),
        created_at: r.get::<DateTime<Utc>, _>(4),
    }
}

fn course_from_row(r: &SqliteRow) -> Course {
    Course {
        id: CourseId(r.get::<i64, _>(0)),
        title: r.get::<String, _>(1),
        description: r.get::<Option<String>, _>(2),
        created_at: r.get::<DateTime<Utc>, _>(3),
    }
}

fn semester_from_row(r: &SqliteRow) -> Semester {
    Semester {
        id: SemesterId(r.get::<i64, _>(0)),
        title: r.get::<String, _>(1),
        course_id: CourseId(r.get::<i64, _>(2)),
        created_at: r.get::<DateTime<Utc>, _>(3),
    }
}

fn exam_from_row(r: &SqliteRow) -> Exam {
    Exam {
        id: ExamId(r.get::<i64, _>(0)),
        title: r.get::<String, _>(1),
        semester_id: SemesterId(r.get::<i64, _>(2)),
        duration_minutes: r.get::<Option<i64>, _>(3),
        created_at: r.get::<DateTime<Utc>, _>(4),
    }
}

fn question_from_row(r: &SqliteRow) -> Result<Question> {
    let id = QuestionId(r.try_get::<i64, _>(0)?);
    let answers: Vec<String> = serde_json::from_str(&r.try_get::<String, _>(3)?)
        .with_context(|| format!("question {id} has malformed answers"))?;
    let correct_answer = u32::try_from(r.try_get::<i64, _>(4)?)
        .with_context(|| format!("question {id} has an out of range correct answer"))?;
    Ok(Question {
        id,
        exam_id: ExamId(r.try_get::<i64, _>(1)?),
        content: r.try_get::<String, _>(2)?,
        answers,
        correct_answer,
        created_at: r.try_get::<DateTime<Utc>, _>(5)?,
    })
}

fn bug_report_from_row(r: &SqliteRow) -> BugReport {
    BugReport {
        id: BugReportId(r.get::<i64, _>(0)),
        user_id: r.get::<Option<i64>, _>(1).map(UserId),
        title: r.get::<String, _>(2),
        description: r.get::<String, _>(3),
        created_at: r.get::<DateTime<Utc>, _>(4),
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() || path == ":memory:" {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
