//! Domain models that mirror the SQLite schema and get passed throughout the
//! TUI, the exporters, and the command line. The stored [`Student`] stays a
//! light-weight data holder; the create and update inputs carry their own
//! validation so every entry point (forms, CLI flags, tests) applies the same
//! rules before anything reaches the database.

use std::fmt;
use std::num::IntErrorKind;

use crate::error::{RecordError, Result};

/// Timestamp layout used for the `date_added` column.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq)]
/// One row of the `students` table.
pub struct Student {
    /// Primary key assigned by SQLite. Edit and delete flows hand it back to
    /// the persistence layer, so it is kept even where only display data is
    /// needed.
    pub id: i64,
    pub name: String,
    pub age: u32,
    /// Class or grade label. Stored in the `class` column.
    pub class_name: String,
    pub score: f64,
    /// Creation timestamp in [`DATE_FORMAT`]. Rows written before the column
    /// existed have none.
    pub date_added: Option<String>,
}

impl Student {
    /// Case-insensitive substring match on the name. A blank needle matches
    /// every student so an empty search box shows the whole table.
    pub fn name_matches(&self, needle: &str) -> bool {
        let needle = needle.trim();
        if needle.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&needle.to_lowercase())
    }

    /// Score rendered the way tables and reports show it.
    pub fn score_display(&self) -> String {
        format!("{:.2}", self.score)
    }

    pub fn date_added_display(&self) -> &str {
        self.date_added.as_deref().unwrap_or("")
    }
}

impl fmt::Display for Student {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.id, self.name)
    }
}

/// Input for creating a student. Every field is required.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentDraft {
    pub name: String,
    pub age: u32,
    pub class_name: String,
    pub score: f64,
}

impl StudentDraft {
    pub fn new(
        name: impl Into<String>,
        age: u32,
        class_name: impl Into<String>,
        score: f64,
    ) -> Self {
        Self {
            name: name.into(),
            age,
            class_name: class_name.into(),
            score,
        }
    }

    /// Check the draft and return a copy with text fields trimmed, ready to be
    /// written as-is.
    pub fn validated(&self) -> Result<Self> {
        Ok(Self {
            name: required_text("Name", &self.name)?,
            age: self.age,
            class_name: required_text("Class", &self.class_name)?,
            score: valid_score(self.score)?,
        })
    }
}

/// Partial update. `None` fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentPatch {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub class_name: Option<String>,
    pub score: Option<f64>,
}

impl StudentPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.age.is_none()
            && self.class_name.is_none()
            && self.score.is_none()
    }

    /// Same checks as [`StudentDraft::validated`], applied to present fields
    /// only.
    pub fn validated(&self) -> Result<Self> {
        Ok(Self {
            name: self
                .name
                .as_deref()
                .map(|name| required_text("Name", name))
                .transpose()?,
            age: self.age,
            class_name: self
                .class_name
                .as_deref()
                .map(|class_name| required_text("Class", class_name))
                .transpose()?,
            score: self.score.map(valid_score).transpose()?,
        })
    }

    /// Write the present fields over `student`. The id and creation date are
    /// never touched.
    pub fn apply_to(&self, student: &mut Student) {
        if let Some(name) = &self.name {
            student.name = name.clone();
        }
        if let Some(age) = self.age {
            student.age = age;
        }
        if let Some(class_name) = &self.class_name {
            student.class_name = class_name.clone();
        }
        if let Some(score) = self.score {
            student.score = score;
        }
    }
}

/// Parse a user-typed age. Shared by the TUI form and the CLI.
pub fn parse_age(raw: &str) -> Result<u32> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(RecordError::Validation("Age is required.".into()));
    }
    raw.parse::<u32>().map_err(|err| {
        let message = match err.kind() {
            IntErrorKind::PosOverflow => format!("Age must be at most {}.", u32::MAX),
            _ => "Age must be a non-negative integer.".to_string(),
        };
        RecordError::Validation(message)
    })
}

/// Parse a user-typed score. Shared by the TUI form and the CLI.
pub fn parse_score(raw: &str) -> Result<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(RecordError::Validation("Score is required.".into()));
    }
    let score = raw
        .parse::<f64>()
        .map_err(|_| RecordError::Validation("Score must be a number.".into()))?;
    valid_score(score)
}

/// Trimmed text, or a validation error naming `field` when blank.
pub(crate) fn required_text(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(RecordError::Validation(format!("{field} is required.")))
    } else {
        Ok(trimmed.to_string())
    }
}

fn valid_score(score: f64) -> Result<f64> {
    if !score.is_finite() || score < 0.0 {
        Err(RecordError::Validation(
            "Score must be zero or greater.".into(),
        ))
    } else {
        Ok(score)
    }
}
