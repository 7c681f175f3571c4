use anyhow::Error;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};

use crate::error::RecordError;

/// Produce a rectangle centered within `area` that spans the requested percent
/// of the width and height. Used for modal dialogs.
pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(area);

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(horizontal[1]);

    vertical[1]
}

/// Pick the message worth showing in the status line. Store errors already
/// read well; anything else is reduced to its innermost cause.
pub(crate) fn surface_error(err: &Error) -> String {
    if let Some(record_err) = err.downcast_ref::<RecordError>() {
        return record_err.to_string();
    }
    err.chain()
        .last()
        .map(|cause| cause.to_string())
        .unwrap_or_else(|| err.to_string())
}

/// Zebra striping for table rows.
pub(crate) fn row_style(index: usize) -> Style {
    if index % 2 == 0 {
        Style::default()
    } else {
        Style::default().bg(Color::Indexed(236))
    }
}

/// Status text shown after the table is (re)loaded.
pub(crate) fn loaded_summary(count: usize, average: Option<f64>) -> String {
    let noun = if count == 1 { "student" } else { "students" };
    match average {
        Some(avg) => format!("Loaded {count} {noun} (average score {avg:.2})."),
        None => format!("Loaded {count} {noun}."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn record_errors_keep_their_own_message() {
        let err = anyhow::Error::from(RecordError::NotFound(5));
        assert_eq!(surface_error(&err), "Student 5 not found.");
    }

    #[test]
    fn other_errors_surface_the_root_cause() {
        let err: anyhow::Result<()> = Err(anyhow::anyhow!("disk full")).context("failed to save");
        assert_eq!(surface_error(&err.unwrap_err()), "disk full");
    }

    #[test]
    fn summary_mentions_average_when_present() {
        assert_eq!(loaded_summary(0, None), "Loaded 0 students.");
        assert_eq!(
            loaded_summary(1, Some(91.5)),
            "Loaded 1 student (average score 91.50)."
        );
    }
}
