use std::mem;
use std::path::PathBuf;

use anyhow::Result;
use chrono::Local;
use crossterm::event::KeyCode;
use open::that as open_path;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap};
use ratatui::Frame;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::db::{create_student, delete_student, fetch_all_students, update_student};
use crate::export::{export, suggested_file_name, ExportFormat, COLUMN_HEADERS};
use crate::models::Student;

use super::forms::{ConfirmStudentDelete, ExportForm, StudentField, StudentForm};
use super::helpers::{centered_rect, loaded_summary, row_style, surface_error};
use super::screens::StudentTable;

/// Footer space reserved for status messages and instructions.
const FOOTER_HEIGHT: u16 = 3;
/// Height of the search bar above the table.
const SEARCH_HEIGHT: u16 = 3;
/// Rows skipped by PageUp/PageDown.
const PAGE_STEP: isize = 10;

/// What the keyboard is currently driving. Modal states own their form data
/// so cancelling simply drops it.
enum Mode {
    Normal,
    Adding(StudentForm),
    Editing { original: Student, form: StudentForm },
    ConfirmDelete(ConfirmStudentDelete),
    Searching(SearchState),
    Exporting(ExportForm),
}

/// Text typed into the search bar. The table filter follows it live.
struct SearchState {
    query: String,
}

/// Holds the footer message text plus its severity.
struct StatusMessage {
    text: String,
    kind: StatusKind,
}

/// Severity levels shown in the footer.
enum StatusKind {
    Info,
    Error,
}

impl StatusKind {
    fn style(&self) -> Style {
        match self {
            StatusKind::Info => Style::default().fg(Color::Green),
            StatusKind::Error => Style::default().fg(Color::Red),
        }
    }
}

/// Central application state shared across the TUI.
pub struct App {
    conn: Connection,
    table: StudentTable,
    export_dir: PathBuf,
    mode: Mode,
    status: Option<StatusMessage>,
    last_export: Option<PathBuf>,
}

impl App {
    pub fn new(conn: Connection, students: Vec<Student>, export_dir: PathBuf) -> Self {
        let table = StudentTable::new(students);
        let summary = loaded_summary(table.students.len(), table.average_score());
        Self {
            conn,
            table,
            export_dir,
            mode: Mode::Normal,
            status: Some(StatusMessage {
                text: summary,
                kind: StatusKind::Info,
            }),
            last_export: None,
        }
    }

    /// Route one key press to the active mode. Returns `true` when the user
    /// asked to quit.
    pub fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        let mut exit = false;
        let mode = mem::replace(&mut self.mode, Mode::Normal);

        self.mode = match mode {
            Mode::Normal => self.handle_normal_key(code, &mut exit)?,
            Mode::Adding(form) => self.handle_add(code, form)?,
            Mode::Editing { original, form } => self.handle_edit(code, original, form)?,
            Mode::ConfirmDelete(confirm) => self.handle_confirm_delete(code, confirm)?,
            Mode::Searching(state) => self.handle_search(code, state),
            Mode::Exporting(form) => self.handle_export(code, form),
        };

        Ok(exit)
    }

    /// Ctrl-modified keys. Ctrl-C always quits; Ctrl-U clears the open form.
    pub fn handle_ctrl_key(&mut self, code: KeyCode) -> Result<bool> {
        match code {
            KeyCode::Char('c') => return Ok(true),
            KeyCode::Char('u') => match &mut self.mode {
                Mode::Adding(form) | Mode::Editing { form, .. } => form.clear(),
                Mode::Searching(state) => {
                    state.query.clear();
                    self.table.set_filter(None);
                }
                Mode::Exporting(form) => form.path.clear(),
                _ => {}
            },
            _ => {}
        }
        Ok(false)
    }

    fn handle_normal_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => {
                *exit = true;
            }
            KeyCode::Up => self.table.move_selection(-1),
            KeyCode::Down => self.table.move_selection(1),
            KeyCode::PageUp => self.table.move_selection(-PAGE_STEP),
            KeyCode::PageDown => self.table.move_selection(PAGE_STEP),
            KeyCode::Home => self.table.select_first(),
            KeyCode::End => self.table.select_last(),
            KeyCode::Char('a') | KeyCode::Char('A') | KeyCode::Char('+') => {
                self.clear_status();
                return Ok(Mode::Adding(StudentForm::default()));
            }
            KeyCode::Char('e') | KeyCode::Char('E') | KeyCode::Enter => {
                if let Some(student) = self.table.current_student().cloned() {
                    self.set_status(
                        format!("Editing student ID {}.", student.id),
                        StatusKind::Info,
                    );
                    let form = StudentForm::from_student(&student);
                    return Ok(Mode::Editing {
                        original: student,
                        form,
                    });
                }
                self.set_status("Select a student to edit.", StatusKind::Error);
            }
            KeyCode::Char('d') | KeyCode::Char('D') | KeyCode::Char('-') | KeyCode::Delete => {
                if let Some(student) = self.table.current_student() {
                    let confirm = ConfirmStudentDelete::for_student(student);
                    self.clear_status();
                    return Ok(Mode::ConfirmDelete(confirm));
                }
                self.set_status("Select a student to delete.", StatusKind::Error);
            }
            KeyCode::Char('/') | KeyCode::Char('f') | KeyCode::Char('F') => {
                let query = self.table.filter.clone().unwrap_or_default();
                return Ok(Mode::Searching(SearchState { query }));
            }
            KeyCode::Char('r') | KeyCode::Char('R') => {
                self.table.set_filter(None);
                if self.reload(None) {
                    self.show_loaded_summary();
                }
            }
            KeyCode::Char('c') | KeyCode::Char('C') => {
                return Ok(self.start_export(ExportFormat::Csv));
            }
            KeyCode::Char('p') | KeyCode::Char('P') => {
                return Ok(self.start_export(ExportFormat::Pdf));
            }
            KeyCode::Char('o') | KeyCode::Char('O') => self.open_last_export(),
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_add(&mut self, code: KeyCode, mut form: StudentForm) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status("Add student cancelled.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.previous_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.save_new_student(&form) {
                Ok(()) => return Ok(Mode::Normal),
                Err(err) => self.reject_form(&mut form.error, &err),
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }
        Ok(Mode::Adding(form))
    }

    fn handle_edit(
        &mut self,
        code: KeyCode,
        original: Student,
        mut form: StudentForm,
    ) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status("Edit cancelled.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.previous_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.save_existing_student(&original, &form) {
                Ok(()) => return Ok(Mode::Normal),
                Err(err) => self.reject_form(&mut form.error, &err),
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }
        Ok(Mode::Editing { original, form })
    }

    fn handle_confirm_delete(
        &mut self,
        code: KeyCode,
        confirm: ConfirmStudentDelete,
    ) -> Result<Mode> {
        match code {
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.set_status("Deletion cancelled.", StatusKind::Info);
                Ok(Mode::Normal)
            }
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                match delete_student(&self.conn, confirm.id) {
                    Ok(()) => {
                        if self.reload(None) {
                            self.set_status(
                                format!("Deleted student ID {}.", confirm.id),
                                StatusKind::Info,
                            );
                        }
                        Ok(Mode::Normal)
                    }
                    Err(err) => {
                        // Row vanished underneath us; resync so the table stops showing it.
                        self.reload(None);
                        self.set_status(err.to_string(), StatusKind::Error);
                        Ok(Mode::Normal)
                    }
                }
            }
            _ => Ok(Mode::ConfirmDelete(confirm)),
        }
    }

    fn handle_search(&mut self, code: KeyCode, mut state: SearchState) -> Mode {
        match code {
            KeyCode::Esc => {
                self.table.set_filter(None);
                self.show_loaded_summary();
                return Mode::Normal;
            }
            KeyCode::Enter => {
                let query = state.query.trim();
                if query.is_empty() {
                    self.table.set_filter(None);
                    self.show_loaded_summary();
                } else {
                    self.set_status(
                        format!(
                            "Search: '{query}' ({} of {} students).",
                            self.table.filtered.len(),
                            self.table.students.len()
                        ),
                        StatusKind::Info,
                    );
                }
                return Mode::Normal;
            }
            KeyCode::Up => {
                self.table.move_selection(-1);
                return Mode::Searching(state);
            }
            KeyCode::Down => {
                self.table.move_selection(1);
                return Mode::Searching(state);
            }
            KeyCode::Backspace => {
                state.query.pop();
            }
            KeyCode::Char(ch) if !ch.is_control() => state.query.push(ch),
            _ => return Mode::Searching(state),
        }

        if state.query.trim().is_empty() {
            self.table.set_filter(None);
        } else {
            self.table.set_filter(Some(state.query.clone()));
        }
        Mode::Searching(state)
    }

    fn handle_export(&mut self, code: KeyCode, mut form: ExportForm) -> Mode {
        match code {
            KeyCode::Esc => {
                self.set_status("Export cancelled.", StatusKind::Info);
                return Mode::Normal;
            }
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.write_export(&form) {
                Ok(()) => return Mode::Normal,
                Err(err) => self.reject_form(&mut form.error, &err),
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }
        Mode::Exporting(form)
    }

    pub(crate) fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(SEARCH_HEIGHT),
                Constraint::Min(0),
                Constraint::Length(FOOTER_HEIGHT),
            ])
            .split(area);

        self.draw_search_bar(frame, chunks[0]);
        self.draw_table(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);

        match &self.mode {
            Mode::Adding(form) => self.draw_student_form(frame, area, "Add Student", form),
            Mode::Editing { original, form } => {
                let title = format!("Edit Student {}", original.id);
                self.draw_student_form(frame, area, &title, form)
            }
            Mode::ConfirmDelete(confirm) => self.draw_confirm_delete(frame, area, confirm),
            Mode::Exporting(form) => self.draw_export_form(frame, area, form),
            Mode::Searching(_) | Mode::Normal => {}
        }
    }

    fn draw_search_bar(&self, frame: &mut Frame, area: Rect) {
        let searching = match &self.mode {
            Mode::Searching(state) => Some(state),
            _ => None,
        };

        let (text, style) = match (searching, self.table.active_filter()) {
            (Some(state), _) => (state.query.clone(), Style::default().fg(Color::Yellow)),
            (None, Some(filter)) => (filter.to_string(), Style::default()),
            (None, None) => (
                "press / to search by name".to_string(),
                Style::default().fg(Color::DarkGray),
            ),
        };

        let block = Block::default().borders(Borders::ALL).title("Search");
        let paragraph = Paragraph::new(Line::from(vec![
            Span::raw("Name: "),
            Span::styled(text, style),
        ]))
        .block(block.clone());
        frame.render_widget(paragraph, area);

        if let Some(state) = searching {
            let inner = block.inner(area);
            let cursor_x = inner.x + "Name: ".len() as u16 + state.query.chars().count() as u16;
            frame.set_cursor_position((cursor_x, inner.y));
        }
    }

    fn draw_table(&self, frame: &mut Frame, area: Rect) {
        let title = match self.table.active_filter() {
            Some(_) => format!(
                "Students ({} of {})",
                self.table.filtered.len(),
                self.table.students.len()
            ),
            None => format!("Students ({})", self.table.students.len()),
        };
        let block = Block::default().borders(Borders::ALL).title(title);

        if self.table.filtered.is_empty() {
            let message = if self.table.students.is_empty() {
                "No students yet. Press 'a' to add one."
            } else {
                "No students match the current search."
            };
            let paragraph = Paragraph::new(message)
                .alignment(Alignment::Center)
                .block(block);
            frame.render_widget(paragraph, area);
            return;
        }

        let header = Row::new(COLUMN_HEADERS.iter().map(|heading| Cell::from(*heading))).style(
            Style::default()
                .fg(Color::White)
                .bg(Color::Blue)
                .add_modifier(Modifier::BOLD),
        );

        let rows = self
            .table
            .filtered
            .iter()
            .enumerate()
            .map(|(index, student)| {
                Row::new(vec![
                    student.id.to_string(),
                    student.name.clone(),
                    student.age.to_string(),
                    student.class_name.clone(),
                    student.score_display(),
                    student.date_added_display().to_string(),
                ])
                .style(row_style(index))
            });

        let widths = [
            Constraint::Length(6),
            Constraint::Min(16),
            Constraint::Length(5),
            Constraint::Length(10),
            Constraint::Length(8),
            Constraint::Length(20),
        ];

        let table = Table::new(rows, widths)
            .header(header)
            .block(block)
            .row_highlight_style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("▶ ");

        let mut state = TableState::default();
        state.select(Some(self.table.selected));
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let status_line = if let Some(status) = &self.status {
            Line::from(vec![Span::styled(status.text.clone(), status.kind.style())])
        } else {
            Line::from("")
        };

        let paragraph = Paragraph::new(vec![status_line, self.footer_instructions()])
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn footer_instructions(&self) -> Line<'static> {
        let key_style = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
        let hints: &[(&str, &str)] = match &self.mode {
            Mode::Adding(_) | Mode::Editing { .. } => &[
                ("[Tab]", " Next Field   "),
                ("[Enter]", " Save   "),
                ("[Ctrl-U]", " Clear   "),
                ("[Esc]", " Cancel"),
            ],
            Mode::ConfirmDelete(_) => &[("[y]", " Delete   "), ("[n]", " Keep")],
            Mode::Searching(_) => &[
                ("[↑↓]", " Select   "),
                ("[Enter]", " Apply   "),
                ("[Esc]", " Clear Search"),
            ],
            Mode::Exporting(_) => &[("[Enter]", " Export   "), ("[Esc]", " Cancel")],
            Mode::Normal => &[
                ("[↑↓]", " Select   "),
                ("[a]", " Add   "),
                ("[e]", " Edit   "),
                ("[d]", " Delete   "),
                ("[/]", " Search   "),
                ("[r]", " Show All   "),
                ("[c]", " CSV   "),
                ("[p]", " PDF   "),
                ("[o]", " Open Export   "),
                ("[q]", " Quit"),
            ],
        };

        let spans: Vec<Span<'static>> = hints
            .iter()
            .flat_map(|(key, action)| {
                [
                    Span::styled(key.to_string(), key_style),
                    Span::raw(action.to_string()),
                ]
            })
            .collect();
        Line::from(spans)
    }

    fn draw_student_form(&self, frame: &mut Frame, area: Rect, title: &str, form: &StudentForm) {
        let popup_area = centered_rect(60, 50, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title(title.to_string()).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines: Vec<Line> = StudentField::ALL
            .iter()
            .map(|field| form.build_line(*field))
            .collect();
        lines.push(Line::from(""));

        if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )));
        } else {
            lines.push(Line::from(Span::styled(
                "Enter to save • Tab to switch • Esc to cancel",
                Style::default().fg(Color::Gray),
            )));
        }

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);

        let row = StudentField::ALL
            .iter()
            .position(|field| *field == form.active)
            .unwrap_or(0) as u16;
        let prefix = form.active.label().len() as u16 + 2;
        frame.set_cursor_position((
            inner.x + prefix + form.value_len(form.active) as u16,
            inner.y + row,
        ));
    }

    fn draw_confirm_delete(&self, frame: &mut Frame, area: Rect, confirm: &ConfirmStudentDelete) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title("Confirm Delete")
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let lines = vec![
            Line::from(format!(
                "Delete student {} ({})?",
                confirm.id, confirm.name
            )),
            Line::from(""),
            Line::from(Span::styled(
                "Press Y to confirm or N / Esc to cancel.",
                Style::default().fg(Color::Gray),
            )),
        ];

        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn draw_export_form(&self, frame: &mut Frame, area: Rect, form: &ExportForm) {
        let popup_area = centered_rect(70, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title(format!("Export {}", form.format))
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines = vec![
            Line::from(vec![
                Span::raw("File: "),
                Span::styled(form.path.clone(), Style::default().fg(Color::Yellow)),
            ]),
            Line::from(""),
        ];
        if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )));
        } else {
            lines.push(Line::from(Span::styled(
                format!(
                    "All {} students will be written. Enter to export • Esc to cancel",
                    self.table.students.len()
                ),
                Style::default().fg(Color::Gray),
            )));
        }

        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
        frame.set_cursor_position((
            inner.x + "File: ".len() as u16 + form.path.chars().count() as u16,
            inner.y,
        ));
    }

    fn set_status<S: Into<String>>(&mut self, text: S, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    fn clear_status(&mut self) {
        self.status = None;
    }

    fn show_loaded_summary(&mut self) {
        let summary = loaded_summary(self.table.students.len(), self.table.average_score());
        self.set_status(summary, StatusKind::Info);
    }

    /// Show a failed submit both inside the open dialog and in the footer.
    fn reject_form(&mut self, slot: &mut Option<String>, err: &anyhow::Error) {
        let message = surface_error(err);
        warn!(error = %message, "rejected input");
        *slot = Some(message.clone());
        self.set_status(message, StatusKind::Error);
    }

    fn save_new_student(&mut self, form: &StudentForm) -> Result<()> {
        let draft = form.parse_draft()?;
        let student = create_student(&self.conn, &draft)?;
        // The row is stored from here on, so the form closes even if the
        // refresh fails.
        if self.reload(Some(student.id)) {
            self.set_status(
                format!("Added student '{}' (ID {}).", student.name, student.id),
                StatusKind::Info,
            );
        }
        Ok(())
    }

    fn save_existing_student(&mut self, original: &Student, form: &StudentForm) -> Result<()> {
        let patch = form.patch_against(original)?;
        if patch.is_empty() {
            self.set_status("Nothing changed.", StatusKind::Info);
            return Ok(());
        }
        update_student(&self.conn, original.id, &patch)?;
        if self.reload(Some(original.id)) {
            self.set_status(
                format!("Updated student ID {}.", original.id),
                StatusKind::Info,
            );
        }
        Ok(())
    }

    fn start_export(&mut self, format: ExportFormat) -> Mode {
        let name = suggested_file_name(format, Local::now().naive_local());
        self.clear_status();
        Mode::Exporting(ExportForm::new(format, self.export_dir.join(name)))
    }

    /// Exports always cover the whole store, not the filtered view.
    fn write_export(&mut self, form: &ExportForm) -> Result<()> {
        let path = form.target_path()?;
        let students = fetch_all_students(&self.conn)?;
        let written = export(form.format, &students, &path)?;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.set_status(
            format!(
                "Exported {}: {file_name} ({written} students). Press o to open.",
                form.format
            ),
            StatusKind::Info,
        );
        self.last_export = Some(path);
        Ok(())
    }

    fn open_last_export(&mut self) {
        let Some(path) = self.last_export.clone() else {
            self.set_status("Nothing exported yet.", StatusKind::Error);
            return;
        };
        match open_path(&path) {
            Ok(()) => {
                info!(path = %path.display(), "opened export");
                self.set_status(format!("Opened {}.", path.display()), StatusKind::Info);
            }
            Err(err) => self.set_status(format!("Failed to open export: {err}"), StatusKind::Error),
        }
    }

    /// Refresh the display cache from the store, keeping the selection on
    /// `focus_id` when it is still visible. A failed read leaves the cache
    /// untouched, puts the error in the footer and returns `false`.
    fn reload(&mut self, focus_id: Option<i64>) -> bool {
        match fetch_all_students(&self.conn) {
            Ok(students) => {
                self.table.set_students(students);
                if let Some(id) = focus_id {
                    self.table.select_id(id);
                }
                true
            }
            Err(err) => {
                let message = surface_error(&err.into());
                warn!(error = %message, "failed to reload students");
                self.set_status(message, StatusKind::Error);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{count_students, fetch_student, open_in_memory};
    use crate::models::StudentDraft;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn app_with(drafts: &[StudentDraft], export_dir: PathBuf) -> App {
        let conn = open_in_memory().unwrap();
        for draft in drafts {
            create_student(&conn, draft).unwrap();
        }
        let students = fetch_all_students(&conn).unwrap();
        App::new(conn, students, export_dir)
    }

    fn roster() -> Vec<StudentDraft> {
        vec![
            StudentDraft::new("Ada Lovelace", 17, "11B", 91.5),
            StudentDraft::new("Alan Turing", 18, "12A", 88.0),
        ]
    }

    fn press(app: &mut App, codes: &[KeyCode]) {
        for code in codes {
            app.handle_key(*code).unwrap();
        }
    }

    fn type_text(app: &mut App, text: &str) {
        for ch in text.chars() {
            app.handle_key(KeyCode::Char(ch)).unwrap();
        }
    }

    fn status_text(app: &App) -> &str {
        app.status.as_ref().map(|s| s.text.as_str()).unwrap_or("")
    }

    fn render(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(110, 30)).unwrap();
        terminal.draw(|frame| app.draw(frame)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn startup_status_summarises_the_roster() {
        let app = app_with(&roster(), PathBuf::from("."));
        assert_eq!(status_text(&app), "Loaded 2 students (average score 89.75).");
    }

    #[test]
    fn adding_through_the_form_writes_and_refreshes() {
        let mut app = app_with(&[], PathBuf::from("."));
        press(&mut app, &[KeyCode::Char('a')]);
        type_text(&mut app, "Grace Hopper");
        press(&mut app, &[KeyCode::Tab]);
        type_text(&mut app, "16");
        press(&mut app, &[KeyCode::Tab]);
        type_text(&mut app, "10C");
        press(&mut app, &[KeyCode::Tab]);
        type_text(&mut app, "79.5");
        press(&mut app, &[KeyCode::Enter]);

        assert!(matches!(app.mode, Mode::Normal));
        assert_eq!(count_students(&app.conn).unwrap(), 1);
        assert_eq!(app.table.filtered.len(), 1);
        assert_eq!(app.table.current_student().unwrap().name, "Grace Hopper");
        assert!(status_text(&app).starts_with("Added student 'Grace Hopper'"));
    }

    #[test]
    fn invalid_form_stays_open_with_error() {
        let mut app = app_with(&[], PathBuf::from("."));
        press(&mut app, &[KeyCode::Char('a'), KeyCode::Enter]);

        match &app.mode {
            Mode::Adding(form) => assert_eq!(form.error.as_deref(), Some("Name is required.")),
            _ => panic!("form should stay open"),
        }
        assert_eq!(count_students(&app.conn).unwrap(), 0);
    }

    #[test]
    fn editing_updates_only_changed_fields() {
        let mut app = app_with(&roster(), PathBuf::from("."));
        let before = app.table.current_student().cloned().unwrap();

        press(&mut app, &[KeyCode::Char('e')]);
        press(&mut app, &[KeyCode::Tab, KeyCode::Tab, KeyCode::Tab]);
        press(&mut app, &[KeyCode::Backspace; 4]);
        type_text(&mut app, "99");
        press(&mut app, &[KeyCode::Enter]);

        let after = fetch_student(&app.conn, before.id).unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.name, before.name);
        assert_eq!(after.class_name, before.class_name);
        assert_eq!(after.score, 99.0);
        assert_eq!(app.table.current_student().unwrap().score, 99.0);
    }

    #[test]
    fn delete_requires_confirmation() {
        let mut app = app_with(&roster(), PathBuf::from("."));

        press(&mut app, &[KeyCode::Char('d'), KeyCode::Char('n')]);
        assert_eq!(count_students(&app.conn).unwrap(), 2);

        press(&mut app, &[KeyCode::Down, KeyCode::Char('d'), KeyCode::Char('y')]);
        assert_eq!(count_students(&app.conn).unwrap(), 1);
        assert_eq!(app.table.filtered.len(), 1);
        assert_eq!(app.table.filtered[0].name, "Ada Lovelace");
    }

    #[test]
    fn search_filters_live_and_show_all_resets() {
        let mut app = app_with(&roster(), PathBuf::from("."));

        press(&mut app, &[KeyCode::Char('/')]);
        type_text(&mut app, "TUR");
        assert_eq!(app.table.filtered.len(), 1);
        press(&mut app, &[KeyCode::Enter]);
        assert!(matches!(app.mode, Mode::Normal));
        assert_eq!(app.table.filtered[0].name, "Alan Turing");

        press(&mut app, &[KeyCode::Char('r')]);
        assert_eq!(app.table.filtered.len(), 2);
    }

    #[test]
    fn csv_export_writes_full_roster_even_when_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(&roster(), dir.path().to_path_buf());

        press(&mut app, &[KeyCode::Char('/')]);
        type_text(&mut app, "ada");
        press(&mut app, &[KeyCode::Enter, KeyCode::Char('c'), KeyCode::Enter]);

        let path = app.last_export.clone().expect("export recorded");
        assert!(path.starts_with(dir.path()));
        let contents = std::fs::read_to_string(path).unwrap();
        assert_eq!(contents.lines().count(), 3);
    }

    /// Make every later read of the table fail while inserts and deletes still
    /// succeed: a blob in `date_added` cannot be read back as text.
    fn poison_reads_after(app: &App, event: &str) {
        app.conn
            .execute_batch(&format!(
                "CREATE TRIGGER poison AFTER {event} ON students
                 BEGIN UPDATE students SET date_added = X'FF'; END;"
            ))
            .unwrap();
    }

    #[test]
    fn show_all_on_a_broken_store_reports_instead_of_quitting() {
        let mut app = app_with(&roster(), PathBuf::from("."));
        app.conn.execute_batch("DROP TABLE students;").unwrap();

        let outcome = app.handle_key(KeyCode::Char('r'));

        assert!(matches!(outcome, Ok(false)));
        assert!(matches!(app.mode, Mode::Normal));
        assert!(matches!(
            app.status.as_ref().map(|s| &s.kind),
            Some(StatusKind::Error)
        ));
        assert!(status_text(&app).contains("no such table"));
        assert_eq!(app.table.students.len(), 2);
    }

    #[test]
    fn failed_refresh_after_add_closes_the_form() {
        let mut app = app_with(&roster(), PathBuf::from("."));
        poison_reads_after(&app, "INSERT");

        press(&mut app, &[KeyCode::Char('a')]);
        type_text(&mut app, "Grace Hopper");
        press(&mut app, &[KeyCode::Tab]);
        type_text(&mut app, "16");
        press(&mut app, &[KeyCode::Tab]);
        type_text(&mut app, "10C");
        press(&mut app, &[KeyCode::Tab]);
        type_text(&mut app, "79.5");
        let outcome = app.handle_key(KeyCode::Enter);

        assert!(matches!(outcome, Ok(false)));
        assert!(matches!(app.mode, Mode::Normal));
        assert!(status_text(&app).starts_with("database error"));
        assert_eq!(count_students(&app.conn).unwrap(), 3);
    }

    #[test]
    fn failed_refresh_after_delete_keeps_running() {
        let mut app = app_with(&roster(), PathBuf::from("."));
        poison_reads_after(&app, "DELETE");

        press(&mut app, &[KeyCode::Char('d')]);
        let outcome = app.handle_key(KeyCode::Char('y'));

        assert!(matches!(outcome, Ok(false)));
        assert!(matches!(app.mode, Mode::Normal));
        assert!(status_text(&app).starts_with("database error"));
        assert_eq!(count_students(&app.conn).unwrap(), 1);
    }

    #[test]
    fn ctrl_c_quits_from_any_mode() {
        let mut app = app_with(&[], PathBuf::from("."));
        press(&mut app, &[KeyCode::Char('a')]);
        assert!(app.handle_ctrl_key(KeyCode::Char('c')).unwrap());
    }

    #[test]
    fn rendered_table_lists_students() {
        let app = app_with(&roster(), PathBuf::from("."));
        let screen = render(&app);
        assert!(screen.contains("Ada Lovelace"));
        assert!(screen.contains("Alan Turing"));
        assert!(screen.contains("91.50"));
        assert!(screen.contains("Date Added"));
    }

    #[test]
    fn empty_store_renders_hint() {
        let app = app_with(&[], PathBuf::from("."));
        assert!(render(&app).contains("No students yet"));
    }
}
