use std::path::Path;

use csv::WriterBuilder;
use tracing::info;

use super::{student_cells, write_atomically, COLUMN_HEADERS};
use crate::error::{RecordError, Result};
use crate::models::Student;

/// Write a header row plus one row per student. Quoting follows RFC 4180, so
/// names containing commas or quotes survive a round trip through a
/// spreadsheet.
pub fn export_csv(students: &[Student], path: &Path) -> Result<usize> {
    write_atomically(path, |file| {
        let mut writer = WriterBuilder::new().from_writer(file);
        writer
            .write_record(COLUMN_HEADERS)
            .map_err(|err| csv_error(path, err))?;
        for student in students {
            writer
                .write_record(student_cells(student, student.score.to_string()))
                .map_err(|err| csv_error(path, err))?;
        }
        writer.flush().map_err(|err| RecordError::io(path, err))
    })?;

    info!(path = %path.display(), rows = students.len(), "exported CSV");
    Ok(students.len())
}

fn csv_error(path: &Path, err: csv::Error) -> RecordError {
    if err.is_io_error() {
        match err.into_kind() {
            csv::ErrorKind::Io(source) => RecordError::io(path, source),
            other => RecordError::Render {
                format: "CSV",
                message: format!("{other:?}"),
            },
        }
    } else {
        RecordError::Render {
            format: "CSV",
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn students() -> Vec<Student> {
        vec![
            Student {
                id: 1,
                name: "Ada Lovelace".into(),
                age: 17,
                class_name: "11B".into(),
                score: 91.5,
                date_added: Some("2024-03-01 08:00:00".into()),
            },
            Student {
                id: 2,
                name: "Turing, Alan".into(),
                age: 18,
                class_name: "12A".into(),
                score: 88.0,
                date_added: None,
            },
        ]
    }

    #[test]
    fn writes_header_plus_one_line_per_student() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("students.csv");

        let written = export_csv(&students(), &path).unwrap();
        assert_eq!(written, 2);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "ID,Name,Age,Class,Score,Date Added");
        assert_eq!(lines[1], "1,Ada Lovelace,17,11B,91.5,2024-03-01 08:00:00");
        assert_eq!(lines[2], "2,\"Turing, Alan\",18,12A,88,");
    }

    #[test]
    fn empty_store_still_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        export_csv(&[], &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 1);
    }

    #[test]
    fn unwritable_path_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("students.csv");
        let err = export_csv(&students(), &path).unwrap_err();
        assert!(matches!(err, RecordError::Io { .. }));
    }

    #[test]
    fn directory_in_the_way_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("students.csv");
        std::fs::create_dir(&path).unwrap();

        let err = export_csv(&students(), &path).unwrap_err();
        assert!(matches!(err, RecordError::Io { .. }));
        assert!(path.is_dir());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
