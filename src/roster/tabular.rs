use super::error::ImportError;
use calamine::{Data, Range, Reader, Xls, Xlsx};
use std::io::Cursor;
use std::path::Path;

/// Parsed upload. `lines[i]` is the 1-based line (CSV) or sheet row (Excel)
/// where `rows[i]` starts, so reports point at the row the user sees even
/// after blank lines were skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grid {
    pub rows: Vec<Vec<String>>,
    pub lines: Vec<usize>,
}

impl Grid {
    /// Rows numbered consecutively from 1.
    pub fn from_rows(rows: Vec<Vec<String>>) -> Grid {
        let lines = (1..=rows.len()).collect();
        Grid { rows, lines }
    }

    pub fn push(&mut self, line: usize, row: Vec<String>) {
        self.rows.push(row);
        self.lines.push(line);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Source line of row `index`.
    pub fn line(&self, index: usize) -> usize {
        self.lines.get(index).copied().unwrap_or(index + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Xls,
    Xlsx,
}

impl FileKind {
    /// Classify an uploaded file by extension. Anything other than
    /// `.csv`, `.xls` or `.xlsx` is rejected before any bytes are read.
    pub fn from_path(path: &Path) -> Result<FileKind, ImportError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("csv") => Ok(FileKind::Csv),
            Some("xls") => Ok(FileKind::Xls),
            Some("xlsx") => Ok(FileKind::Xlsx),
            _ => Err(ImportError::UnsupportedFile {
                name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Csv => "csv",
            FileKind::Xls => "xls",
            FileKind::Xlsx => "xlsx",
        }
    }
}

/// Parse raw upload bytes into rows of cell strings. The first row is the
/// header; fewer than two rows is an `EmptyFile` error.
pub fn parse_grid(bytes: &[u8], kind: FileKind) -> Result<Grid, ImportError> {
    let grid = match kind {
        FileKind::Csv => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| ImportError::parse(kind.as_str(), e.to_string()))?;
            parse_delimited(text)
        }
        FileKind::Xlsx => {
            let wb: Xlsx<_> = Xlsx::new(Cursor::new(bytes.to_vec()))
                .map_err(|e| ImportError::parse(kind.as_str(), e.to_string()))?;
            first_sheet(wb, kind)?
        }
        FileKind::Xls => {
            let wb: Xls<_> = Xls::new(Cursor::new(bytes.to_vec()))
                .map_err(|e| ImportError::parse(kind.as_str(), e.to_string()))?;
            first_sheet(wb, kind)?
        }
    };
    if grid.len() < 2 {
        return Err(ImportError::EmptyFile { rows: grid.len() });
    }
    Ok(grid)
}

fn first_sheet<R>(mut workbook: R, kind: FileKind) -> Result<Grid, ImportError>
where
    R: Reader<Cursor<Vec<u8>>>,
    R::Error: std::fmt::Display,
{
    let range = match workbook.worksheet_range_at(0) {
        Some(Ok(r)) => r,
        Some(Err(e)) => return Err(ImportError::parse(kind.as_str(), e.to_string())),
        None => return Err(ImportError::parse(kind.as_str(), "workbook has no sheets")),
    };
    Ok(range_to_grid(&range))
}

fn range_to_grid(range: &Range<Data>) -> Grid {
    // The range starts at the first used cell, not necessarily at row 1.
    let first_row = range.start().map_or(0, |(row, _)| row as usize);
    let mut grid = Grid::default();
    for (offset, row) in range.rows().enumerate() {
        let cells = row.iter().map(cell_to_string).collect::<Vec<_>>();
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        grid.push(first_row + offset + 1, cells);
    }
    grid
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        // f64 Display already drops a zero fraction (8.0 -> "8").
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Comma-separated text to rows. Quotes toggle an in-quotes state; `""`
/// inside quotes is a literal quote; quoted fields may contain commas and
/// line breaks. Zero-length lines are dropped; every kept record remembers
/// the physical line it starts on.
pub fn parse_delimited(text: &str) -> Grid {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut grid = Grid::default();
    let mut row: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    // True once the current line has produced anything, even an empty field.
    let mut line_started = false;
    let mut line = 1usize;
    let mut record_line = 1usize;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        let is_break = !in_quotes && (ch == '\r' || ch == '\n');
        if !line_started && !is_break {
            record_line = line;
        }
        match ch {
            '"' => {
                line_started = true;
                if in_quotes && chars.peek() == Some(&'"') {
                    buf.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => {
                line_started = true;
                row.push(std::mem::take(&mut buf));
            }
            '\r' | '\n' if !in_quotes => {
                if ch == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                if line_started {
                    row.push(std::mem::take(&mut buf));
                    grid.push(record_line, std::mem::take(&mut row));
                }
                line_started = false;
            }
            _ => {
                line_started = true;
                buf.push(ch);
            }
        }
        // CRLF counts once: a `\r` only ends a line when no `\n` follows.
        if ch == '\n' || (ch == '\r' && chars.peek() != Some(&'\n')) {
            line += 1;
        }
    }
    if line_started {
        row.push(buf);
        grid.push(record_line, row);
    }
    grid
}

/// Quote a field for delimited output when it holds a delimiter, quote or
/// line break.
pub fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_delimiter_stays_in_one_field() {
        let grid = parse_delimited("A001,\"Doe, Jane\",8,A\n");
        assert_eq!(grid.rows, vec![vec!["A001", "Doe, Jane", "8", "A"]]);
    }

    #[test]
    fn escaped_quotes_and_multiline_fields() {
        let grid = parse_delimited("a,\"say \"\"hi\"\"\"\r\nb,\"two\nlines\"\r\nc,d\r\n");
        assert_eq!(grid.rows[0], vec!["a", "say \"hi\""]);
        assert_eq!(grid.rows[1], vec!["b", "two\nlines"]);
        assert_eq!(grid.len(), 3);
        // A record spanning two lines is numbered by its first line.
        assert_eq!(grid.lines, vec![1, 2, 4]);
    }

    #[test]
    fn empty_lines_are_dropped_but_comma_only_lines_are_kept() {
        let grid = parse_delimited("\u{feff}h1,h2\n\n,\nx,y");
        assert_eq!(
            grid.rows,
            vec![vec!["h1", "h2"], vec!["", ""], vec!["x", "y"]]
        );
        assert_eq!(grid.lines, vec![1, 3, 4]);
    }

    #[test]
    fn header_only_file_is_empty() {
        let err = parse_grid(b"Roll No,Student Name,Class,Section\n", FileKind::Csv)
            .expect_err("header only");
        assert_eq!(err, ImportError::EmptyFile { rows: 1 });
    }

    #[test]
    fn invalid_utf8_is_a_parse_error() {
        let err = parse_grid(&[0xff, 0xfe, 0x00, b','], FileKind::Csv).expect_err("bad utf8");
        assert_eq!(err.code(), "parse_failed");
    }

    #[test]
    fn garbage_workbook_is_a_parse_error() {
        let err = parse_grid(b"not a spreadsheet", FileKind::Xlsx).expect_err("bad xlsx");
        assert_eq!(err.code(), "parse_failed");
        let err = parse_grid(b"not a spreadsheet", FileKind::Xls).expect_err("bad xls");
        assert_eq!(err.code(), "parse_failed");
    }

    // Sheet row 3 is left empty; the second sheet must be ignored.
    fn roster_workbook() -> Vec<u8> {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        for (col, h) in ["Roll No", "Student Name", "Class", "Section"].iter().enumerate() {
            sheet.write_string(0, col as u16, *h).expect("header cell");
        }
        sheet.write_number(1, 0, 1001.0).expect("roll");
        sheet.write_string(1, 1, "Asha").expect("name");
        sheet.write_number(1, 2, 8.0).expect("class");
        sheet.write_string(1, 3, "A").expect("section");
        sheet.write_string(3, 1, "Bob").expect("name");
        sheet.write_number(3, 2, 9.0).expect("class");
        sheet.write_string(3, 3, "B").expect("section");
        let other = workbook.add_worksheet();
        other.write_string(0, 0, "Not the roster").expect("second sheet");
        workbook.save_to_buffer().expect("xlsx bytes")
    }

    #[test]
    fn xlsx_first_sheet_is_read_as_strings_with_sheet_row_numbers() {
        let grid = parse_grid(&roster_workbook(), FileKind::Xlsx).expect("xlsx grid");
        assert_eq!(
            grid.rows,
            vec![
                vec!["Roll No", "Student Name", "Class", "Section"],
                vec!["1001", "Asha", "8", "A"],
                vec!["", "Bob", "9", "B"],
            ]
        );
        assert_eq!(grid.lines, vec![1, 2, 4]);

        let r = crate::roster::validate_grid(&std::collections::HashSet::new(), &grid)
            .expect("validate");
        assert_eq!(r.accepted.len(), 1);
        assert_eq!(r.accepted[0].roll_no, "1001");
        assert_eq!(r.errors.len(), 1);
        assert_eq!(r.errors[0].row, 4);
    }

    #[test]
    fn file_kind_comes_from_extension() {
        assert_eq!(
            FileKind::from_path(Path::new("/tmp/List.XLSX")).ok(),
            Some(FileKind::Xlsx)
        );
        assert_eq!(
            FileKind::from_path(Path::new("roster.csv")).ok(),
            Some(FileKind::Csv)
        );
        let err = FileKind::from_path(Path::new("roster.pdf")).expect_err("pdf rejected");
        assert!(err.to_string().contains(".csv, .xls, .xlsx"));
    }

    #[test]
    fn csv_quote_only_when_needed() {
        assert_eq!(csv_quote("plain"), "plain");
        assert_eq!(csv_quote("8, 9"), "\"8, 9\"");
        assert_eq!(csv_quote("a\"b"), "\"a\"\"b\"");
    }
}
