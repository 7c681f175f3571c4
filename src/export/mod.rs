//! Writers that turn the full student list into files the user can share.
//! Both formats use the same column set so a CSV and a PDF taken at the same
//! moment line up row for row.

mod csv_file;
mod pdf_report;

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use clap::ValueEnum;
use tempfile::NamedTempFile;

use crate::error::{RecordError, Result};
use crate::models::Student;

pub use csv_file::export_csv;
pub use pdf_report::{export_pdf, ReportLayout, REPORT_TITLE};

/// Column headings shared by every export format.
pub const COLUMN_HEADERS: [&str; 6] = ["ID", "Name", "Age", "Class", "Score", "Date Added"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Pdf,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Pdf => "pdf",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ExportFormat::Csv => "CSV",
            ExportFormat::Pdf => "PDF",
        }
    }

    fn file_stem(self) -> &'static str {
        match self {
            ExportFormat::Csv => "students",
            ExportFormat::Pdf => "students_report",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Default file name for an export taken at `now`, e.g.
/// `students_20240301_081500.csv`.
pub fn suggested_file_name(format: ExportFormat, now: NaiveDateTime) -> String {
    format!(
        "{}_{}.{}",
        format.file_stem(),
        now.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

/// Append the format's extension when the user typed a bare name.
pub fn with_extension(path: &Path, format: ExportFormat) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(format.extension())
    }
}

/// Write `students` to `path` in the requested format and return the number
/// of records written.
pub fn export(format: ExportFormat, students: &[Student], path: &Path) -> Result<usize> {
    match format {
        ExportFormat::Csv => export_csv(students, path),
        ExportFormat::Pdf => export_pdf(students, path),
    }
}

/// Run `write` against a temporary file next to `path` and move it into
/// place only once it succeeds. On any failure the temporary file is removed
/// and whatever was at `path` before stays as it was.
pub(crate) fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(dir).map_err(|err| RecordError::io(path, err))?;
    write(staged.as_file_mut())?;
    staged
        .persist(path)
        .map_err(|err| RecordError::io(path, err.error))?;
    Ok(())
}

/// Cell values for one student, in [`COLUMN_HEADERS`] order.
pub(crate) fn student_cells(student: &Student, score: String) -> [String; 6] {
    [
        student.id.to_string(),
        student.name.clone(),
        student.age.to_string(),
        student.class_name.clone(),
        score,
        student.date_added_display().to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn suggested_names_carry_timestamp_and_extension() {
        let now = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(8, 15, 0)
            .unwrap();
        assert_eq!(
            suggested_file_name(ExportFormat::Csv, now),
            "students_20240301_081500.csv"
        );
        assert_eq!(
            suggested_file_name(ExportFormat::Pdf, now),
            "students_report_20240301_081500.pdf"
        );
    }

    #[test]
    fn failed_write_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("students.csv");

        let err = write_atomically(&path, |file| {
            use std::io::Write;
            file.write_all(b"ID,Name\n1,Ada")
                .map_err(|err| RecordError::io("staged", err))?;
            Err(RecordError::Render {
                format: "CSV",
                message: "encoder gave up".into(),
            })
        })
        .unwrap_err();

        assert!(matches!(err, RecordError::Render { .. }));
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn failed_write_keeps_the_previous_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("students.csv");
        std::fs::write(&path, "previous").unwrap();

        let result = write_atomically(&path, |_| {
            Err(RecordError::Validation("stop".into()))
        });

        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "previous");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn bare_names_gain_the_format_extension() {
        assert_eq!(
            with_extension(Path::new("out/roster"), ExportFormat::Pdf),
            PathBuf::from("out/roster.pdf")
        );
        assert_eq!(
            with_extension(Path::new("roster.txt"), ExportFormat::Csv),
            PathBuf::from("roster.txt")
        );
    }
}
