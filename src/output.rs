//! Result types returned by the extraction entry points.
//!
//! Every level keeps its own table outcome: a chunk, a page, and the whole
//! document each carry `Result<Table, TableIssue>`, so callers can show a
//! partial result for one page even when another page produced nothing.

use crate::error::{ChunkError, TableIssue};
use crate::pipeline::chunk::{ChunkWindow, PageGeometry};
use crate::pipeline::table::Table;
use crate::record::{build_record, Record, RecordIdentifiers};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One chunk's VLM result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkResult {
    /// 1-indexed chunk number within the page.
    pub chunk_num: usize,
    /// Crop window in page pixels.
    pub window: ChunkWindow,
    /// Cleaned model text, or the inline error marker on failure.
    pub text: String,
    /// Chunk-level table built from `text` alone.
    pub table: Result<Table, TableIssue>,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub retries: u32,
    pub duration_ms: u64,
    /// Set when the VLM call failed.
    pub error: Option<ChunkError>,
}

/// All chunks of one page plus the page-level table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageExtraction {
    /// 1-indexed page number in the source PDF.
    pub page_num: usize,
    pub geometry: PageGeometry,
    pub chunks: Vec<ChunkResult>,
    /// Page accumulator text (chunk texts joined by newlines, trimmed).
    pub text: String,
    pub table: Result<Table, TableIssue>,
}

impl PageExtraction {
    pub fn failed_chunks(&self) -> usize {
        self.chunks.iter().filter(|c| c.error.is_some()).count()
    }
}

/// PDF document metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

/// Counters for one extraction run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub total_pages: usize,
    pub processed_pages: usize,
    pub estimated_chunks: usize,
    pub processed_chunks: usize,
    pub failed_chunks: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
    pub render_duration_ms: u64,
    pub llm_duration_ms: u64,
}

/// Everything an extraction run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub pages: Vec<PageExtraction>,
    /// All page texts joined in page order.
    pub document_text: String,
    /// Document-level table reparsed from `document_text`.
    pub table: Result<Table, TableIssue>,
    pub metadata: Option<DocumentMetadata>,
    pub stats: ExtractionStats,
}

impl ExtractionOutput {
    /// Build the JSON record for the document-level table.
    ///
    /// `None` when no document table could be derived.
    pub fn to_record(&self, ids: &RecordIdentifiers, timestamp: NaiveDateTime) -> Option<Record> {
        self.table
            .as_ref()
            .ok()
            .map(|table| build_record(table, ids, timestamp))
    }
}
