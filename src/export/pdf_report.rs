use std::io::{BufWriter, Write};
use std::path::Path;

use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point, Polygon,
    Rgb,
};
use tracing::info;

use super::{student_cells, write_atomically, COLUMN_HEADERS};
use crate::error::{RecordError, Result};
use crate::models::Student;

pub const REPORT_TITLE: &str = "Students Report";

/// A4 portrait, in millimetres.
const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 15.0;
const TITLE_BLOCK: f32 = 16.0;
const ROW_HEIGHT: f32 = 7.0;
const TITLE_SIZE: f32 = 18.0;
const CELL_SIZE: f32 = 9.0;
/// Column widths in millimetres, matching [`COLUMN_HEADERS`].
const COLUMN_WIDTHS: [f32; 6] = [14.0, 62.0, 14.0, 26.0, 18.0, 46.0];
/// Rough Helvetica advance at [`CELL_SIZE`]; good enough to keep text inside
/// its cell.
const CHAR_WIDTH: f32 = 1.75;
const CELL_PADDING: f32 = 1.5;

const HEADER_FILL: (f32, f32, f32) = (0.180, 0.525, 0.671);
const HEADER_TEXT: (f32, f32, f32) = (0.961, 0.961, 0.961);
const GRID: (f32, f32, f32) = (0.5, 0.5, 0.5);
const BODY_TEXT: (f32, f32, f32) = (0.0, 0.0, 0.0);

/// Rows of the report grouped per page. Kept separate from drawing so page
/// breaks can be checked without parsing PDF output.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportLayout {
    pub pages: Vec<Vec<[String; 6]>>,
}

impl ReportLayout {
    pub fn build(students: &[Student]) -> Self {
        let rows: Vec<[String; 6]> = students
            .iter()
            .map(|student| {
                let mut cells = student_cells(student, student.score_display());
                for (cell, width) in cells.iter_mut().zip(COLUMN_WIDTHS) {
                    *cell = fit_to_width(cell, width);
                }
                cells
            })
            .collect();

        let mut pages = Vec::new();
        let mut remaining = rows.as_slice();
        let mut capacity = rows_per_page(true);
        loop {
            let take = remaining.len().min(capacity);
            let (page, rest) = remaining.split_at(take);
            pages.push(page.to_vec());
            remaining = rest;
            capacity = rows_per_page(false);
            if remaining.is_empty() {
                break;
            }
        }

        Self { pages }
    }

    /// Number of student rows across all pages, headers excluded.
    pub fn row_count(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }
}

/// Body rows that fit below the header row. The first page also carries the
/// report title.
fn rows_per_page(first: bool) -> usize {
    let mut usable = PAGE_HEIGHT - 2.0 * MARGIN - ROW_HEIGHT;
    if first {
        usable -= TITLE_BLOCK;
    }
    (usable / ROW_HEIGHT).floor().max(1.0) as usize
}

fn fit_to_width(text: &str, width: f32) -> String {
    let max_chars = ((width - 2.0 * CELL_PADDING) / CHAR_WIDTH).floor().max(1.0) as usize;
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut fitted: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    fitted.push_str("...");
    fitted
}

fn rgb((r, g, b): (f32, f32, f32)) -> Color {
    Color::Rgb(Rgb::new(r, g, b, None))
}

fn render_error(err: printpdf::Error) -> RecordError {
    RecordError::Render {
        format: "PDF",
        message: err.to_string(),
    }
}

/// Lay the students out as a paginated table and write the PDF to `path`.
pub fn export_pdf(students: &[Student], path: &Path) -> Result<usize> {
    let layout = ReportLayout::build(students);

    let (doc, first_page, first_layer) =
        PdfDocument::new(REPORT_TITLE, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Table");
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(render_error)?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(render_error)?;

    let mut targets = vec![(first_page, first_layer)];
    for _ in 1..layout.pages.len() {
        targets.push(doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Table"));
    }

    for (index, ((page, layer), rows)) in targets.into_iter().zip(&layout.pages).enumerate() {
        let canvas = doc.get_page(page).get_layer(layer);
        let mut top = PAGE_HEIGHT - MARGIN;

        if index == 0 {
            canvas.set_fill_color(rgb(BODY_TEXT));
            canvas.use_text(REPORT_TITLE, TITLE_SIZE, Mm(MARGIN), Mm(top - 8.0), &bold);
            top -= TITLE_BLOCK;
        }

        draw_header(&canvas, top, &bold);
        top -= ROW_HEIGHT;

        canvas.set_fill_color(rgb(BODY_TEXT));
        for row in rows {
            draw_row(&canvas, top, row, &regular);
            top -= ROW_HEIGHT;
        }
    }

    let pages = layout.pages.len();
    write_atomically(path, |file| {
        let mut out = BufWriter::new(file);
        doc.save(&mut out).map_err(render_error)?;
        out.flush().map_err(|err| RecordError::io(path, err))
    })?;

    info!(
        path = %path.display(),
        rows = layout.row_count(),
        pages,
        "exported PDF"
    );
    Ok(layout.row_count())
}

fn draw_header(canvas: &PdfLayerReference, top: f32, font: &IndirectFontRef) {
    let right = MARGIN + COLUMN_WIDTHS.iter().sum::<f32>();
    let bottom = top - ROW_HEIGHT;
    canvas.set_fill_color(rgb(HEADER_FILL));
    canvas.add_polygon(Polygon {
        rings: vec![vec![
            (Point::new(Mm(MARGIN), Mm(bottom)), false),
            (Point::new(Mm(right), Mm(bottom)), false),
            (Point::new(Mm(right), Mm(top)), false),
            (Point::new(Mm(MARGIN), Mm(top)), false),
        ]],
        mode: PaintMode::Fill,
        winding_order: WindingOrder::NonZero,
    });

    canvas.set_fill_color(rgb(HEADER_TEXT));
    let headers = COLUMN_HEADERS.map(str::to_string);
    draw_row(canvas, top, &headers, font);
}

/// Cell text plus the grid box around the row.
fn draw_row(canvas: &PdfLayerReference, top: f32, cells: &[String; 6], font: &IndirectFontRef) {
    let bottom = top - ROW_HEIGHT;
    let mut left = MARGIN;
    for (cell, width) in cells.iter().zip(COLUMN_WIDTHS) {
        canvas.use_text(
            cell.as_str(),
            CELL_SIZE,
            Mm(left + CELL_PADDING),
            Mm(bottom + 2.2),
            font,
        );
        left += width;
    }

    canvas.set_outline_color(rgb(GRID));
    canvas.set_outline_thickness(0.5);
    let right = left;
    let mut edges = vec![
        segment((MARGIN, top), (right, top)),
        segment((MARGIN, bottom), (right, bottom)),
    ];
    let mut x = MARGIN;
    edges.push(segment((x, top), (x, bottom)));
    for width in COLUMN_WIDTHS {
        x += width;
        edges.push(segment((x, top), (x, bottom)));
    }
    for edge in edges {
        canvas.add_line(edge);
    }
}

fn segment((x1, y1): (f32, f32), (x2, y2): (f32, f32)) -> Line {
    Line {
        points: vec![
            (Point::new(Mm(x1), Mm(y1)), false),
            (Point::new(Mm(x2), Mm(y2)), false),
        ],
        is_closed: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(count: usize) -> Vec<Student> {
        (1..=count)
            .map(|i| Student {
                id: i as i64,
                name: format!("Student {i}"),
                age: 15,
                class_name: "10A".into(),
                score: 70.0 + (i % 30) as f64,
                date_added: Some("2024-03-01 08:00:00".into()),
            })
            .collect()
    }

    #[test]
    fn layout_holds_one_entry_per_student_across_pages() {
        let students = roster(90);
        let layout = ReportLayout::build(&students);
        assert_eq!(layout.row_count(), 90);
        assert!(layout.pages.len() > 1);
        assert_eq!(layout.pages[0].len(), rows_per_page(true));
        assert_eq!(layout.pages[0][0][0], "1");
        assert_eq!(layout.pages[0][0][4], "71.00");
    }

    #[test]
    fn empty_roster_still_renders_one_page() {
        let layout = ReportLayout::build(&[]);
        assert_eq!(layout.pages.len(), 1);
        assert_eq!(layout.row_count(), 0);
    }

    #[test]
    fn long_names_are_truncated_to_fit_their_column() {
        let mut students = roster(1);
        students[0].name = "Bartholomew Maximilian Fitzgerald-Worthington the Third".into();
        let layout = ReportLayout::build(&students);
        let name = &layout.pages[0][0][1];
        assert!(name.ends_with("..."));
        assert!(name.chars().count() < students[0].name.chars().count());
    }

    #[test]
    fn writes_a_pdf_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        let written = export_pdf(&roster(45), &path).unwrap();
        assert_eq!(written, 45);

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    /// Page dictionaries in the saved file: `/Page` not followed by a letter,
    /// which skips `/Pages` and `/PageMode`.
    fn page_objects(bytes: &[u8]) -> usize {
        bytes
            .windows(6)
            .filter(|window| window.starts_with(b"/Page") && !window[5].is_ascii_alphabetic())
            .count()
    }

    #[test]
    fn saved_document_has_one_page_per_layout_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        let students = roster(90);
        let layout = ReportLayout::build(&students);

        assert_eq!(export_pdf(&students, &path).unwrap(), 90);
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(page_objects(&bytes), layout.pages.len());
        assert_eq!(
            layout.pages.iter().map(Vec::len).sum::<usize>(),
            students.len()
        );
    }

    #[test]
    fn unwritable_path_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("report.pdf");
        let err = export_pdf(&roster(2), &path).unwrap_err();
        assert!(matches!(err, RecordError::Io { .. }));
    }
}
