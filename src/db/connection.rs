use std::fs;
use std::path::Path;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{RecordError, Result};

/// Open (or create) the SQLite file at `path`, run lazy migrations, and return
/// a live connection. Missing parent directories are created first so a fresh
/// install works without any setup.
pub fn open_store(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| RecordError::io(parent, err))?;
    }

    let conn = Connection::open(path)?;
    ensure_schema(&conn)?;
    info!(path = %path.display(), "opened student store");
    Ok(conn)
}

/// Throwaway store used by tests and dry runs.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    ensure_schema(&conn)?;
    Ok(conn)
}

/// Create the `students` table when missing and bring older databases up to
/// date. Safe to call on every startup.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS students (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            age INTEGER NOT NULL,
            class TEXT NOT NULL,
            score REAL NOT NULL
        )",
        [],
    )?;

    ensure_date_column(conn)
}

/// Databases created before `date_added` existed get the column appended.
/// Existing rows keep a NULL date.
fn ensure_date_column(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare("PRAGMA table_info(students)")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;

    if !columns.iter().any(|column| column == "date_added") {
        debug!("adding date_added column to students table");
        conn.execute("ALTER TABLE students ADD COLUMN date_added TEXT", [])?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fetch_all_students;

    #[test]
    fn legacy_table_gains_date_column_and_keeps_rows() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE students (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                age INTEGER NOT NULL,
                class TEXT NOT NULL,
                score REAL NOT NULL
            )",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO students (name, age, class, score) VALUES ('Old Timer', 18, '12C', 70.0)",
            [],
        )
        .unwrap();

        ensure_schema(&conn).unwrap();
        ensure_schema(&conn).unwrap();

        let students = fetch_all_students(&conn).unwrap();
        assert_eq!(students.len(), 1);
        assert_eq!(students[0].name, "Old Timer");
        assert_eq!(students[0].date_added, None);
    }

    #[test]
    fn open_store_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("students.db");
        let conn = open_store(&path).unwrap();
        drop(conn);
        assert!(path.exists());
    }
}
