use std::path::PathBuf;

use anyhow::{anyhow, Result};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

use crate::export::{with_extension, ExportFormat};
use crate::models::{
    parse_age, parse_score, required_text, Student, StudentDraft, StudentPatch,
};

/// Fields of the student form, in focus order.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) enum StudentField {
    #[default]
    Name,
    Age,
    Class,
    Score,
}

impl StudentField {
    pub(crate) const ALL: [StudentField; 4] = [
        StudentField::Name,
        StudentField::Age,
        StudentField::Class,
        StudentField::Score,
    ];

    pub(crate) fn label(self) -> &'static str {
        match self {
            StudentField::Name => "Name",
            StudentField::Age => "Age",
            StudentField::Class => "Class",
            StudentField::Score => "Score",
        }
    }

    fn next(self) -> Self {
        match self {
            StudentField::Name => StudentField::Age,
            StudentField::Age => StudentField::Class,
            StudentField::Class => StudentField::Score,
            StudentField::Score => StudentField::Name,
        }
    }

    fn previous(self) -> Self {
        match self {
            StudentField::Name => StudentField::Score,
            StudentField::Age => StudentField::Name,
            StudentField::Class => StudentField::Age,
            StudentField::Score => StudentField::Class,
        }
    }
}

/// Raw text of the add/edit form. Values stay strings until submit so the
/// user can type freely; parsing happens in one place.
#[derive(Default, Clone, Debug)]
pub(crate) struct StudentForm {
    pub(crate) name: String,
    pub(crate) age: String,
    pub(crate) class_name: String,
    pub(crate) score: String,
    pub(crate) active: StudentField,
    pub(crate) error: Option<String>,
}

impl StudentForm {
    /// Populate the form from an existing student when editing.
    pub(crate) fn from_student(student: &Student) -> Self {
        Self {
            name: student.name.clone(),
            age: student.age.to_string(),
            class_name: student.class_name.clone(),
            score: student.score.to_string(),
            active: StudentField::Name,
            error: None,
        }
    }

    pub(crate) fn next_field(&mut self) {
        self.active = self.active.next();
    }

    pub(crate) fn previous_field(&mut self) {
        self.active = self.active.previous();
    }

    fn value(&self, field: StudentField) -> &String {
        match field {
            StudentField::Name => &self.name,
            StudentField::Age => &self.age,
            StudentField::Class => &self.class_name,
            StudentField::Score => &self.score,
        }
    }

    fn value_mut(&mut self, field: StudentField) -> &mut String {
        match field {
            StudentField::Name => &mut self.name,
            StudentField::Age => &mut self.age,
            StudentField::Class => &mut self.class_name,
            StudentField::Score => &mut self.score,
        }
    }

    /// Append a character to the active field. Age takes digits only and
    /// score takes digits plus a single decimal point.
    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        let accepted = match self.active {
            StudentField::Age => ch.is_ascii_digit(),
            StudentField::Score => ch.is_ascii_digit() || (ch == '.' && !self.score.contains('.')),
            StudentField::Name | StudentField::Class => true,
        };
        if accepted {
            self.value_mut(self.active).push(ch);
        }
        accepted
    }

    pub(crate) fn backspace(&mut self) {
        self.value_mut(self.active).pop();
    }

    /// Wipe every input and return focus to the name field.
    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }

    /// Validate the inputs top to bottom and return a draft ready for
    /// persistence.
    pub(crate) fn parse_draft(&self) -> Result<StudentDraft> {
        let draft = StudentDraft {
            name: required_text("Name", &self.name)?,
            age: parse_age(&self.age)?,
            class_name: required_text("Class", &self.class_name)?,
            score: parse_score(&self.score)?,
        };
        Ok(draft.validated()?)
    }

    /// Validate the inputs and keep only the fields that differ from
    /// `original`, so an edit never rewrites values the user left alone.
    pub(crate) fn patch_against(&self, original: &Student) -> Result<StudentPatch> {
        let draft = self.parse_draft()?;
        Ok(StudentPatch {
            name: (draft.name != original.name).then_some(draft.name),
            age: (draft.age != original.age).then_some(draft.age),
            class_name: (draft.class_name != original.class_name).then_some(draft.class_name),
            score: (draft.score != original.score).then_some(draft.score),
        })
    }

    /// Render a single line for the form widget.
    pub(crate) fn build_line(&self, field: StudentField) -> Line<'static> {
        let value = self.value(field);
        let is_active = self.active == field;

        let display = if value.is_empty() {
            "<required>".to_string()
        } else {
            value.clone()
        };

        let style = if is_active {
            Style::default().fg(Color::Yellow)
        } else if value.is_empty() {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };

        Line::from(vec![
            Span::raw(format!("{}: ", field.label())),
            Span::styled(display, style),
        ])
    }

    /// Character count of the requested field, used to place the cursor.
    pub(crate) fn value_len(&self, field: StudentField) -> usize {
        self.value(field).chars().count()
    }
}

/// Pending deletion awaiting a yes/no answer.
#[derive(Clone, Debug)]
pub(crate) struct ConfirmStudentDelete {
    pub(crate) id: i64,
    pub(crate) name: String,
}

impl ConfirmStudentDelete {
    pub(crate) fn for_student(student: &Student) -> Self {
        Self {
            id: student.id,
            name: student.name.clone(),
        }
    }
}

/// Destination prompt shown before writing an export.
#[derive(Clone, Debug)]
pub(crate) struct ExportForm {
    pub(crate) format: ExportFormat,
    pub(crate) path: String,
    pub(crate) error: Option<String>,
}

impl ExportForm {
    pub(crate) fn new(format: ExportFormat, suggested: PathBuf) -> Self {
        Self {
            format,
            path: suggested.to_string_lossy().into_owned(),
            error: None,
        }
    }

    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        self.path.push(ch);
        true
    }

    pub(crate) fn backspace(&mut self) {
        self.path.pop();
    }

    /// The typed path with the format's extension filled in.
    pub(crate) fn target_path(&self) -> Result<PathBuf> {
        let raw = self.path.trim();
        if raw.is_empty() {
            return Err(anyhow!("Export path is required."));
        }
        Ok(with_extension(&PathBuf::from(raw), self.format))
    }
}
