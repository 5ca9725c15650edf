//! Row parsing: delimiter-separated model output → rows of cells.
//!
//! VLM output is only loosely shaped like a table. The same request can come
//! back with or without leading/trailing pipes, with Markdown separator lines
//! (`|---|---|`), with blank lines between rows, or with an inline error
//! marker where a chunk failed. The parser accepts all of it and never fails:
//! the worst input yields an empty vector.

use crate::pipeline::table::ERROR_MARKER_PREFIX;

/// One parsed row. Column counts differ between rows until normalised.
pub type Row = Vec<String>;

/// Parse raw text into rows, splitting cells on `delimiter`.
///
/// Per line:
/// 1. trim, skip if empty
/// 2. an error marker line becomes a single-cell row, whatever the delimiter
/// 3. skip visual separators (only `-`, `=`, space once delimiters are removed)
/// 4. split on `delimiter`, trim each cell
/// 5. drop one leading and one trailing empty cell
/// 6. keep the row if any cell is left, even when every cell is blank
pub fn parse_rows(text: &str, delimiter: char) -> Vec<Row> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            if line.starts_with(ERROR_MARKER_PREFIX) {
                return Some(vec![line.to_string()]);
            }
            if is_separator_line(line, delimiter) {
                return None;
            }
            let row = split_cells(line, delimiter);
            (!row.is_empty()).then_some(row)
        })
        .collect()
}

/// Join rows back into delimiter-separated text, one row per line.
pub fn join_rows(rows: &[Row], delimiter: char) -> String {
    let sep = delimiter.to_string();
    rows.iter()
        .map(|row| row.join(&sep))
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_separator_line(line: &str, delimiter: char) -> bool {
    line.chars()
        .filter(|&c| c != delimiter)
        .all(|c| matches!(c, '-' | '=' | ' '))
}

fn split_cells(line: &str, delimiter: char) -> Row {
    let mut cells: Row = line
        .split(delimiter)
        .map(|cell| cell.trim().to_string())
        .collect();

    if cells.first().is_some_and(String::is_empty) {
        cells.remove(0);
    }
    if cells.last().is_some_and(String::is_empty) {
        cells.pop();
    }
    cells
}
