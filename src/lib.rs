//! Core library surface for the student records manager.
//!
//! The store (`db`), the exporters (`export`), and the terminal UI (`ui`) are
//! public so the `bin` target and the integration tests drive the same code.
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod logging;
pub mod models;
pub mod ui;

/// Persistence entry points most callers need.
pub use db::{
    create_student, delete_student, fetch_all_students, find_students_by_name, open_store,
    update_student,
};

pub use error::RecordError;
pub use export::{export_csv, export_pdf, ExportFormat};
pub use models::{Student, StudentDraft, StudentPatch};

/// The interactive application entry point and state container.
pub use ui::{run_app, App};
