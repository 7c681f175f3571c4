use chrono::Local;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info, warn};

use crate::error::{RecordError, Result};
use crate::models::{Student, StudentDraft, StudentPatch, DATE_FORMAT};

const SELECT_COLUMNS: &str = "SELECT id, name, age, class, score, date_added FROM students";

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    let id = row.get(0)?;
    Ok(Student {
        id,
        name: row.get(1)?,
        age: age_from_column(id, row.get(2)?),
        class_name: row.get(3)?,
        score: row.get(4)?,
        date_added: row.get(5)?,
    })
}

/// Databases written by older versions never range-checked ages. Values that
/// do not fit are pinned to the nearest valid age so one bad row cannot keep
/// the rest of the table from loading.
fn age_from_column(id: i64, stored: i64) -> u32 {
    u32::try_from(stored).unwrap_or_else(|_| {
        warn!(id, stored, "stored age out of range");
        if stored < 0 {
            0
        } else {
            u32::MAX
        }
    })
}

/// Every stored student in id order. This is the single source of truth for
/// both the table view and the exporters.
pub fn fetch_all_students(conn: &Connection) -> Result<Vec<Student>> {
    let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY id"))?;
    let students = stmt
        .query_map([], student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    debug!(count = students.len(), "loaded students");
    Ok(students)
}

/// Students whose name contains `needle`, ignoring case. The match runs in
/// Rust rather than through `LIKE` because SQLite only folds ASCII letters.
pub fn find_students_by_name(conn: &Connection, needle: &str) -> Result<Vec<Student>> {
    let students = fetch_all_students(conn)?
        .into_iter()
        .filter(|student| student.name_matches(needle))
        .collect::<Vec<_>>();

    debug!(needle, matches = students.len(), "searched students by name");
    Ok(students)
}

pub fn fetch_student(conn: &Connection, id: i64) -> Result<Student> {
    conn.query_row(
        &format!("{SELECT_COLUMNS} WHERE id = ?1"),
        params![id],
        student_from_row,
    )
    .optional()?
    .ok_or(RecordError::NotFound(id))
}

pub fn count_students(conn: &Connection) -> Result<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM students", [], |row| row.get(0))?;
    Ok(count as usize)
}

/// Insert a new student stamped with the current local time. The hydrated row
/// is returned so callers get the new id without re-querying.
pub fn create_student(conn: &Connection, draft: &StudentDraft) -> Result<Student> {
    let draft = draft.validated()?;
    let date_added = Local::now().format(DATE_FORMAT).to_string();

    conn.execute(
        "INSERT INTO students (name, age, class, score, date_added) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![draft.name, draft.age, draft.class_name, draft.score, date_added],
    )?;

    let student = Student {
        id: conn.last_insert_rowid(),
        name: draft.name,
        age: draft.age,
        class_name: draft.class_name,
        score: draft.score,
        date_added: Some(date_added),
    };
    info!(id = student.id, name = %student.name, "created student");
    Ok(student)
}

/// Apply `patch` to an existing student. Fields the patch leaves out keep
/// their stored values and the id never changes.
pub fn update_student(conn: &Connection, id: i64, patch: &StudentPatch) -> Result<Student> {
    let patch = patch.validated()?;
    let mut student = fetch_student(conn, id)?;
    if patch.is_empty() {
        return Ok(student);
    }
    patch.apply_to(&mut student);

    let updated = conn.execute(
        "UPDATE students SET name = ?1, age = ?2, class = ?3, score = ?4 WHERE id = ?5",
        params![student.name, student.age, student.class_name, student.score, id],
    )?;
    if updated == 0 {
        return Err(RecordError::NotFound(id));
    }

    info!(id, "updated student");
    Ok(student)
}

/// Remove a student. A missing id is reported rather than silently ignored so
/// the UI can tell the user the row was already gone.
pub fn delete_student(conn: &Connection, id: i64) -> Result<()> {
    let deleted = conn.execute("DELETE FROM students WHERE id = ?1", params![id])?;

    if deleted == 0 {
        Err(RecordError::NotFound(id))
    } else {
        info!(id, "deleted student");
        Ok(())
    }
}
