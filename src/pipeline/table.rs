//! Table reconstruction: header resolution, row normalisation, and the
//! parse → resolve → normalise sequence run at every aggregation level.

use crate::error::TableIssue;
use crate::pipeline::parse::{parse_rows, Row};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Prefix of the inline marker written in place of a failed chunk's text.
pub const ERROR_MARKER_PREFIX: &str = "[API Error:";

/// A rectangular table: every row has exactly `header.len()` cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub header: Row,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn col_count(&self) -> usize {
        self.header.len()
    }

    /// Header followed by data rows, in output order.
    pub fn all_rows(&self) -> impl Iterator<Item = &Row> {
        std::iter::once(&self.header)
            .filter(|h| !h.is_empty())
            .chain(self.rows.iter())
    }
}

/// Options for [`build_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableOptions {
    pub delimiter: char,
    /// Drop data rows identical to the header (a header repeated by a later
    /// chunk or page).
    pub dedupe_repeated_headers: bool,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            delimiter: '|',
            dedupe_repeated_headers: true,
        }
    }
}

/// True for the single-cell row produced by a failed chunk.
pub fn is_error_marker_row(row: &[String]) -> bool {
    row.len() == 1 && row[0].starts_with(ERROR_MARKER_PREFIX)
}

fn has_content(row: &[String]) -> bool {
    row.iter().any(|cell| !cell.trim().is_empty())
}

/// Split parsed rows into `(header, data_rows)`.
///
/// The header is the first row holding at least one non-blank cell that is
/// not an error marker. Data rows are everything after it, minus error
/// marker rows.
pub fn resolve_header(rows: Vec<Row>) -> Result<(Row, Vec<Row>), TableIssue> {
    let header_idx = rows
        .iter()
        .position(|row| has_content(row) && !is_error_marker_row(row))
        .ok_or(TableIssue::NoHeaderFound)?;

    let mut rest = rows.into_iter().skip(header_idx);
    let header = rest.next().ok_or(TableIssue::NoHeaderFound)?;
    let data = rest.filter(|row| !is_error_marker_row(row)).collect();
    Ok((header, data))
}

/// Pad or truncate every row to the header's width.
///
/// An empty header cannot define a width; the rows come back unchanged.
pub fn normalize_rows(header: &[String], rows: Vec<Row>) -> Vec<Row> {
    let width = header.len();
    if width == 0 {
        if !rows.is_empty() {
            warn!(
                "Cannot normalise {} rows against an empty header; leaving them as-is",
                rows.len()
            );
        }
        return rows;
    }

    let mut ragged = 0usize;
    let rows = rows
        .into_iter()
        .enumerate()
        .map(|(idx, mut row)| {
            if row.len() != width {
                ragged += 1;
                debug!(
                    "Row {}: {} cells, header has {}; adjusting",
                    idx + 1,
                    row.len(),
                    width
                );
            }
            row.resize(width, String::new());
            row
        })
        .collect();

    if ragged > 0 {
        warn!(
            "{} of the rows did not match the {}-column header; padded or truncated",
            ragged, width
        );
    }
    rows
}

/// Run parse → resolve → normalise over one level's accumulated text.
pub fn build_table(text: &str, options: TableOptions) -> Result<Table, TableIssue> {
    if text.trim().is_empty() {
        return Err(TableIssue::NoText);
    }

    let parsed = parse_rows(text, options.delimiter);
    if parsed.is_empty() {
        return Err(TableIssue::NoRowsParsed);
    }

    let (header, data) = resolve_header(parsed)?;
    let mut rows = normalize_rows(&header, data);

    if options.dedupe_repeated_headers {
        let before = rows.len();
        rows.retain(|row| *row != header);
        if rows.len() != before {
            debug!("Dropped {} repeated header rows", before - rows.len());
        }
    }

    Ok(Table { header, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Row {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn header_is_first_non_blank_row() {
        let rows = vec![
            row(&["", ""]),
            row(&["", "x"]),
            row(&["a", "b"]),
            row(&["c", "d"]),
        ];
        let (header, data) = resolve_header(rows).expect("header");
        assert_eq!(header, row(&["", "x"]));
        assert_eq!(data, vec![row(&["a", "b"]), row(&["c", "d"])]);
    }

    #[test]
    fn no_header_in_blank_rows() {
        let rows = vec![row(&["", ""]), row(&[" "])];
        assert_eq!(resolve_header(rows), Err(TableIssue::NoHeaderFound));
        assert_eq!(resolve_header(Vec::new()), Err(TableIssue::NoHeaderFound));
    }

    #[test]
    fn error_marker_rows_filtered() {
        let rows = vec![
            row(&["[API Error: Timeout in chunk 1]"]),
            row(&["Name", "Qty"]),
            row(&["Bolt", "4"]),
            row(&["[API Error: LlmError in chunk 3]"]),
            row(&["Nut", "10"]),
        ];
        let (header, data) = resolve_header(rows).expect("header");
        assert_eq!(header, row(&["Name", "Qty"]));
        assert_eq!(data, vec![row(&["Bolt", "4"]), row(&["Nut", "10"])]);
    }

    #[test]
    fn multi_cell_row_mentioning_marker_kept() {
        let rows = vec![row(&["h"]), row(&["[API Error: x]", "real"])];
        let (_, data) = resolve_header(rows).expect("header");
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn normalize_pads_and_truncates() {
        let header = row(&["a", "b", "c"]);
        let rows = vec![row(&["1"]), row(&["1", "2", "3", "4"]), row(&["x", "y", "z"]), Vec::new()];
        let out = normalize_rows(&header, rows);
        assert_eq!(
            out,
            vec![
                row(&["1", "", ""]),
                row(&["1", "2", "3"]),
                row(&["x", "y", "z"]),
                row(&["", "", ""]),
            ]
        );
        assert!(out.iter().all(|r| r.len() == header.len()));
    }

    #[derive(Clone, Default)]
    struct LogBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn ragged_rows_warn_once_with_count() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let header = row(&["a", "b"]);
        let rows = vec![row(&["1"]), row(&["1", "2"]), row(&["1", "2", "3"])];
        tracing::subscriber::with_default(subscriber, || normalize_rows(&header, rows));

        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert_eq!(text.matches("WARN").count(), 1, "{text}");
        assert!(text.contains("2 of the rows did not match the 2-column header"), "{text}");
    }

    #[test]
    fn normalize_empty_header_passthrough() {
        let rows = vec![row(&["1"]), row(&["1", "2"])];
        assert_eq!(normalize_rows(&[], rows.clone()), rows);
    }

    #[test]
    fn build_table_levels_of_failure() {
        let opts = TableOptions::default();
        assert_eq!(build_table("  \n ", opts), Err(TableIssue::NoText));
        assert_eq!(build_table("|---|---|\n====", opts), Err(TableIssue::NoRowsParsed));
        assert_eq!(
            build_table("[API Error: Timeout in chunk 1]", opts),
            Err(TableIssue::NoHeaderFound)
        );
    }

    #[test]
    fn build_table_drops_repeated_headers() {
        let text = "A|B\n1|2\nA|B\n3|4\n";
        let table = build_table(text, TableOptions::default()).expect("table");
        assert_eq!(table.header, row(&["A", "B"]));
        assert_eq!(table.rows, vec![row(&["1", "2"]), row(&["3", "4"])]);

        let keep = TableOptions {
            dedupe_repeated_headers: false,
            ..TableOptions::default()
        };
        assert_eq!(build_table(text, keep).expect("table").rows.len(), 3);
    }

    #[test]
    fn all_rows_starts_with_header() {
        let table = Table {
            header: row(&["h1", "h2"]),
            rows: vec![row(&["a", "b"])],
        };
        let all: Vec<&Row> = table.all_rows().collect();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], &table.header);
        assert_eq!(Table::default().all_rows().count(), 0);
    }
}
