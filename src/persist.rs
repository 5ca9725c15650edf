//! Output files: per-page CSVs, the combined CSV and the JSON record.
//!
//! Every file is written to `<name>.tmp` next to its destination and renamed
//! into place, so an interrupted run never leaves a half-written CSV behind.
//!
//! ```text
//! <dir>/
//!   page_1/page_1_data.csv
//!   page_2/page_2_data.csv
//!   combined_data.csv
//!   extracted_data.json
//! ```

use crate::error::Pdf2TableError;
use crate::output::ExtractionOutput;
use crate::pipeline::table::Table;
use crate::record::Record;
use csv::WriterBuilder;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const COMBINED_CSV: &str = "combined_data.csv";
pub const RECORD_JSON: &str = "extracted_data.json";

/// Relative path of a page's CSV inside the output directory.
pub fn page_csv_path(dir: &Path, page_num: usize) -> PathBuf {
    dir.join(format!("page_{page_num}"))
        .join(format!("page_{page_num}_data.csv"))
}

/// Serialise `table` as comma-delimited CSV, header first.
pub fn table_to_csv_string(table: &Table) -> Result<String, Pdf2TableError> {
    let mut writer = WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::<u8>::new());
    for row in table.all_rows() {
        writer.write_record(row)?;
    }
    writer.flush().map_err(csv::Error::from)?;

    let bytes = writer
        .into_inner()
        .map_err(|e| Pdf2TableError::Csv(e.into_error().into()))?;
    String::from_utf8(bytes)
        .map_err(|e| Pdf2TableError::Internal(format!("CSV output is not UTF-8: {e}")))
}

/// Write `table` to `path` as CSV.
pub fn write_table_csv(path: &Path, table: &Table) -> Result<(), Pdf2TableError> {
    let csv = table_to_csv_string(table)?;
    write_atomic(path, csv.as_bytes())?;
    debug!("Wrote {} ({} rows)", path.display(), table.rows.len());
    Ok(())
}

/// Write `record` to `path` as pretty-printed JSON.
pub fn write_record_json(path: &Path, record: &Record) -> Result<(), Pdf2TableError> {
    let mut json = serde_json::to_string_pretty(record)?;
    json.push('\n');
    write_atomic(path, json.as_bytes())?;
    debug!(
        "Wrote {} ({} cells)",
        path.display(),
        record.table_cells.len()
    );
    Ok(())
}

/// What [`write_outputs`] managed to write, and what it did not.
#[derive(Debug, Default)]
pub struct WriteReport {
    /// Paths written, in write order.
    pub written: Vec<PathBuf>,
    /// Files that could not be written, with the reason.
    pub failed: Vec<(PathBuf, Pdf2TableError)>,
}

impl WriteReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, path: PathBuf, result: Result<(), Pdf2TableError>) {
        match result {
            Ok(()) => self.written.push(path),
            Err(e) => {
                warn!("Save failed for {}: {}", path.display(), e);
                self.failed.push((path, e));
            }
        }
    }
}

/// Write every available output of a run under `dir`.
///
/// Pages without a table get no CSV; the combined CSV is skipped when no
/// document table exists, and the JSON only written when `record` is given.
/// A file that cannot be written is logged and reported; the remaining files
/// are still attempted.
pub fn write_outputs(
    dir: &Path,
    output: &ExtractionOutput,
    record: Option<&Record>,
) -> WriteReport {
    let mut report = WriteReport::default();

    for page in &output.pages {
        match &page.table {
            Ok(table) => {
                let path = page_csv_path(dir, page.page_num);
                let result = write_table_csv(&path, table);
                report.record(path, result);
            }
            Err(issue) => warn!("Page {}: no CSV written ({})", page.page_num, issue),
        }
    }

    match &output.table {
        Ok(table) => {
            let path = dir.join(COMBINED_CSV);
            let result = write_table_csv(&path, table);
            report.record(path, result);
        }
        Err(issue) => warn!("No combined CSV written ({})", issue),
    }

    if let Some(record) = record {
        let path = dir.join(RECORD_JSON);
        let result = write_record_json(&path, record);
        report.record(path, result);
    }

    info!(
        "Wrote {} files to {} ({} failed)",
        report.written.len(),
        dir.display(),
        report.failed.len()
    );
    report
}

/// Temp file + rename, creating parent directories as needed.
///
/// The temp file is removed again when the write or the rename fails.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Pdf2TableError> {
    let io_err = |e: std::io::Error| Pdf2TableError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let result = std::fs::write(&tmp_path, bytes).and_then(|()| std::fs::rename(&tmp_path, path));
    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(io_err(e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TableIssue;
    use crate::output::{ExtractionStats, PageExtraction};
    use crate::pipeline::chunk::PageGeometry;
    use crate::record::{build_record, RecordIdentifiers};
    use chrono::NaiveDate;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn table() -> Table {
        Table {
            header: row(&["Name", "Note"]),
            rows: vec![row(&["Bolt", "has, comma"]), row(&["Nut", "say \"hi\""])],
        }
    }

    fn page(page_num: usize, table: Result<Table, TableIssue>) -> PageExtraction {
        PageExtraction {
            page_num,
            geometry: PageGeometry::new(100, 100),
            chunks: Vec::new(),
            text: String::new(),
            table,
        }
    }

    #[test]
    fn csv_quotes_special_cells() {
        let csv = table_to_csv_string(&table()).unwrap();
        assert_eq!(
            csv,
            "Name,Note\nBolt,\"has, comma\"\nNut,\"say \"\"hi\"\"\"\n"
        );
    }

    #[test]
    fn csv_of_empty_table_is_empty() {
        assert_eq!(table_to_csv_string(&Table::default()).unwrap(), "");
    }

    #[test]
    fn write_csv_creates_parents_and_leaves_no_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let path = page_csv_path(dir.path(), 3);
        write_table_csv(&path, &table()).unwrap();

        assert!(path.ends_with("page_3/page_3_data.csv"));
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("Name,Note\n"));
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn write_outputs_layout() {
        let dir = tempfile::tempdir().unwrap();
        let output = ExtractionOutput {
            pages: vec![page(1, Ok(table())), page(2, Err(TableIssue::NoText))],
            document_text: String::new(),
            table: Ok(table()),
            metadata: None,
            stats: ExtractionStats::default(),
        };
        let ts = NaiveDate::from_ymd_opt(2025, 1, 2)
            .and_then(|d| d.and_hms_opt(3, 4, 5))
            .unwrap();
        let record = build_record(&table(), &RecordIdentifiers::for_source("doc.pdf"), ts);

        let report = write_outputs(dir.path(), &output, Some(&record));
        assert!(report.is_complete());
        assert_eq!(
            report.written,
            vec![
                dir.path().join("page_1").join("page_1_data.csv"),
                dir.path().join(COMBINED_CSV),
                dir.path().join(RECORD_JSON),
            ]
        );
        assert!(!dir.path().join("page_2").exists());

        let json = std::fs::read_to_string(dir.path().join(RECORD_JSON)).unwrap();
        let parsed: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn write_outputs_without_document_table() {
        let dir = tempfile::tempdir().unwrap();
        let output = ExtractionOutput {
            pages: vec![page(1, Err(TableIssue::NoHeaderFound))],
            document_text: String::new(),
            table: Err(TableIssue::NoHeaderFound),
            metadata: None,
            stats: ExtractionStats::default(),
        };
        let report = write_outputs(dir.path(), &output, None);
        assert!(report.written.is_empty());
        assert!(report.is_complete());
        assert!(!dir.path().join(COMBINED_CSV).exists());
    }

    #[test]
    fn blocked_page_dir_does_not_stop_other_outputs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page_1"), b"in the way").unwrap();
        let output = ExtractionOutput {
            pages: vec![page(1, Ok(table())), page(2, Ok(table()))],
            document_text: String::new(),
            table: Ok(table()),
            metadata: None,
            stats: ExtractionStats::default(),
        };

        let report = write_outputs(dir.path(), &output, None);

        assert_eq!(report.failed.len(), 1);
        let (failed_path, err) = &report.failed[0];
        assert_eq!(failed_path, &page_csv_path(dir.path(), 1));
        assert!(matches!(err, Pdf2TableError::OutputWriteFailed { .. }));
        assert_eq!(
            report.written,
            vec![page_csv_path(dir.path(), 2), dir.path().join(COMBINED_CSV)]
        );
        assert!(dir.path().join(COMBINED_CSV).exists());
    }

    #[test]
    fn failed_rename_removes_tmp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory at the destination makes the rename fail.
        let dest = dir.path().join("out.csv");
        std::fs::create_dir_all(dest.join("inner")).unwrap();

        let err = write_table_csv(&dest, &table()).unwrap_err();
        assert!(matches!(err, Pdf2TableError::OutputWriteFailed { .. }));
        assert!(!dir.path().join("out.csv.tmp").exists());
    }
}
