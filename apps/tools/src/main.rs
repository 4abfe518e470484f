use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use shared::domain::CourseId;
use storage::{InsertOutcome, Storage};

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://./data/quiz.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    CreateCourse {
        title: String,
        #[arg(long)]
        description: Option<String>,
    },
    CreateSemester {
        course_id: i64,
        title: String,
    },
    ListSemesters {
        #[arg(long)]
        course_id: Option<i64>,
    },
    CurrentSemester,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::CreateCourse { title, description } => {
            let outcome = storage
                .create_course(&title, description.as_deref())
                .await?;
            report_insert("course", outcome)?;
        }
        Command::CreateSemester { course_id, title } => {
            let outcome = storage.create_semester(&title, CourseId(course_id)).await?;
            report_insert("semester", outcome)?;
        }
        Command::ListSemesters { course_id } => {
            let semesters = match course_id {
                Some(course_id) => storage.find_semesters_by_course(CourseId(course_id)).await?,
                None => storage.find_all_semesters().await?,
            };
            print_json(&semesters)?;
        }
        Command::CurrentSemester => match storage.find_current_semester().await? {
            Some(semester) => print_json(&semester)?,
            None => println!("no semesters yet"),
        },
    }

    Ok(())
}

fn report_insert<T: Serialize>(entity: &str, outcome: InsertOutcome<T>) -> Result<()> {
    match outcome {
        InsertOutcome::Created(record) => print_json(&record),
        InsertOutcome::Duplicate => bail!("{entity} already exists"),
        InsertOutcome::Rejected => bail!("{entity} references a record that does not exist"),
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
