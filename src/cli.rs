//! Command-line surface. With no subcommand the terminal UI starts; the other
//! subcommands run one store or export operation and exit, which makes the
//! records scriptable.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tracing::warn;

use crate::config::Config;
use crate::db::{
    create_student, delete_student, fetch_all_students, find_students_by_name, open_store,
    update_student,
};
use crate::export::{export, suggested_file_name, with_extension, ExportFormat};
use crate::logging;
use crate::models::{Student, StudentDraft, StudentPatch};
use crate::ui::{run_app, App};

#[derive(Debug, Parser)]
#[command(name = "student-records", version, about = "Manage student records from the terminal")]
pub struct Cli {
    /// SQLite database file (overrides the config file)
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Config file (default: ~/.student-records/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Open the interactive table (default)
    Tui,

    /// Print students, optionally filtered by name
    List {
        /// Case-insensitive name substring
        #[arg(long, short)]
        search: Option<String>,
    },

    /// Add a student and print the new id
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        age: u32,
        #[arg(long = "class")]
        class_name: String,
        #[arg(long)]
        score: f64,
    },

    /// Change some fields of a student; omitted fields are kept
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        age: Option<u32>,
        #[arg(long = "class")]
        class_name: Option<String>,
        #[arg(long)]
        score: Option<f64>,
    },

    /// Delete a student
    Delete { id: i64 },

    /// Write every student to a CSV or PDF file
    Export {
        #[arg(value_enum)]
        format: ExportFormat,

        /// Output file (default: timestamped name in the export directory)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

/// Execute the parsed command line.
pub fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let command = cli.command.unwrap_or(Command::Tui);

    if matches!(command, Command::Tui) {
        init_tui_logging(&config);
    } else {
        logging::init_stderr();
    }

    let db_path = config.database_path(cli.db.as_deref())?;
    let conn = open_store(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;

    match command {
        Command::Tui => {
            let students = fetch_all_students(&conn)?;
            let mut app = App::new(conn, students, config.export_dir());
            run_app(&mut app)
        }
        Command::List { search } => list(&conn, search.as_deref()),
        Command::Add {
            name,
            age,
            class_name,
            score,
        } => {
            let student = create_student(&conn, &StudentDraft::new(name, age, class_name, score))?;
            println!("{}", student.id);
            Ok(())
        }
        Command::Update {
            id,
            name,
            age,
            class_name,
            score,
        } => {
            let patch = StudentPatch {
                name,
                age,
                class_name,
                score,
            };
            let student = update_student(&conn, id, &patch)?;
            println!("Updated {student}.");
            Ok(())
        }
        Command::Delete { id } => {
            delete_student(&conn, id)?;
            println!("Deleted student {id}.");
            Ok(())
        }
        Command::Export { format, output } => {
            let path = match output {
                Some(path) => with_extension(&path, format),
                None => config
                    .export_dir()
                    .join(suggested_file_name(format, Local::now().naive_local())),
            };
            let students = fetch_all_students(&conn)?;
            let written = export(format, &students, &path)?;
            println!("Exported {written} students to {}", path.display());
            Ok(())
        }
    }
}

/// A broken log file should not keep the user out of their records.
fn init_tui_logging(config: &Config) {
    let outcome = config
        .log_file()
        .and_then(|path| logging::init_file(&config.logging.level, &path));
    if let Err(err) = outcome {
        eprintln!("warning: logging disabled: {err:#}");
    }
}

fn list(conn: &Connection, search: Option<&str>) -> Result<()> {
    let students = match search {
        Some(needle) => find_students_by_name(conn, needle)?,
        None => fetch_all_students(conn)?,
    };

    if students.is_empty() {
        if let Some(needle) = search {
            warn!(needle, "search matched no students");
        }
        println!("No students found.");
        return Ok(());
    }

    println!("{}", format_row(["ID", "Name", "Age", "Class", "Score", "Date Added"]));
    for student in &students {
        println!("{}", format_student(student));
    }
    Ok(())
}

fn format_student(student: &Student) -> String {
    format_row([
        student.id.to_string().as_str(),
        student.name.as_str(),
        student.age.to_string().as_str(),
        student.class_name.as_str(),
        student.score_display().as_str(),
        student.date_added_display(),
    ])
}

fn format_row(cells: [&str; 6]) -> String {
    format!(
        "{:>5}  {:<28}  {:>3}  {:<10}  {:>7}  {}",
        cells[0], cells[1], cells[2], cells[3], cells[4], cells[5]
    )
    .trim_end()
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_tui() {
        let cli = Cli::try_parse_from(["student-records"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn update_flags_are_optional() {
        let cli =
            Cli::try_parse_from(["student-records", "update", "4", "--score", "77.5"]).unwrap();
        match cli.command {
            Some(Command::Update {
                id,
                name,
                score,
                class_name,
                age,
            }) => {
                assert_eq!(id, 4);
                assert_eq!(score, Some(77.5));
                assert!(name.is_none() && class_name.is_none() && age.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn export_format_is_parsed() {
        let cli =
            Cli::try_parse_from(["student-records", "--db", "x.db", "export", "pdf"]).unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("x.db")));
        assert!(matches!(
            cli.command,
            Some(Command::Export {
                format: ExportFormat::Pdf,
                output: None
            })
        ));
    }

    #[test]
    fn rows_align_into_columns() {
        let student = Student {
            id: 12,
            name: "Ada Lovelace".into(),
            age: 17,
            class_name: "11B".into(),
            score: 91.5,
            date_added: None,
        };
        let line = format_student(&student);
        assert!(line.starts_with("   12  Ada Lovelace"));
        assert!(line.ends_with("91.50"));
    }
}
