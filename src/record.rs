//! Relational JSON record for an extracted table.
//!
//! The shape is fixed and consumed downstream, so field names and key order
//! are part of the output contract:
//!
//! ```text
//! PROJECT ─┬─ FILE
//!          └─ METADATA ── TABLEDATA ── TABLECELL[]
//! ```
//!
//! Identifiers are foreign keys supplied by the caller; nothing here
//! generates them. The header is stored as TABLECELL row 0 and is counted in
//! `row_count`.

use crate::pipeline::table::Table;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Caller-supplied identifiers and names for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordIdentifiers {
    pub project_id: i64,
    pub project_name: String,
    pub project_description: String,
    pub file_id: i64,
    pub file_name: String,
    pub file_format: String,
    pub scanned_file_name: String,
    pub metadata_id: i64,
    pub tabledata_id: i64,
}

impl RecordIdentifiers {
    /// Defaults used by the CLI for a combined CSV made from `source_name`.
    pub fn for_source(source_name: &str) -> Self {
        Self {
            project_id: 101,
            project_name: "PDF_Extraction".to_string(),
            project_description: format!("From: {source_name}"),
            file_id: 102,
            file_name: "combined_data.csv".to_string(),
            file_format: "csv".to_string(),
            scanned_file_name: source_name.to_string(),
            metadata_id: 103,
            tabledata_id: 104,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "PROJECT")]
    pub project: ProjectRecord,
    #[serde(rename = "FILE")]
    pub file: FileRecord,
    #[serde(rename = "METADATA")]
    pub metadata: MetadataRecord,
    #[serde(rename = "TABLEDATA")]
    pub table_data: TableDataRecord,
    #[serde(rename = "TABLECELL")]
    pub table_cells: Vec<TableCellRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: i64,
    pub file_name: String,
    pub format: String,
    pub created_at: String,
    pub scanned_file_name: String,
    pub last_scanned_at: String,
    pub project_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub id: i64,
    pub project_id: i64,
    pub file_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDataRecord {
    pub id: i64,
    pub row_count: usize,
    pub col_count: usize,
    pub metadata_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCellRecord {
    pub id: u64,
    pub row_index: usize,
    pub col_index: usize,
    pub col_span: u32,
    pub row_span: u32,
    pub content: String,
    pub tabledata_id: i64,
}

/// ISO-8601 local timestamp with microseconds, no offset.
fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Map `table` and `ids` into a [`Record`].
///
/// `timestamp` is used for every timestamp field. Cells are numbered from 1
/// in row-major order, header row first.
pub fn build_record(table: &Table, ids: &RecordIdentifiers, timestamp: NaiveDateTime) -> Record {
    let now = format_timestamp(timestamp);

    let table_cells: Vec<TableCellRecord> = table
        .all_rows()
        .enumerate()
        .flat_map(|(row_index, row)| {
            row.iter()
                .enumerate()
                .map(move |(col_index, content)| (row_index, col_index, content))
        })
        .zip(1u64..)
        .map(|((row_index, col_index, content), id)| TableCellRecord {
            id,
            row_index,
            col_index,
            col_span: 1,
            row_span: 1,
            content: content.clone(),
            tabledata_id: ids.tabledata_id,
        })
        .collect();

    Record {
        project: ProjectRecord {
            id: ids.project_id,
            name: ids.project_name.clone(),
            description: ids.project_description.clone(),
            created_at: now.clone(),
            updated_at: now.clone(),
        },
        file: FileRecord {
            id: ids.file_id,
            file_name: ids.file_name.clone(),
            format: ids.file_format.clone(),
            created_at: now.clone(),
            scanned_file_name: ids.scanned_file_name.clone(),
            last_scanned_at: now,
            project_id: ids.project_id,
        },
        metadata: MetadataRecord {
            id: ids.metadata_id,
            project_id: ids.project_id,
            file_id: ids.file_id,
        },
        table_data: TableDataRecord {
            id: ids.tabledata_id,
            row_count: table.all_rows().count(),
            col_count: table.col_count(),
            metadata_id: ids.metadata_id,
        },
        table_cells,
    }
}
