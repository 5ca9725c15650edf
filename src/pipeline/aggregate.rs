//! Aggregation: chunk outcomes → page text → document text, with a fresh
//! table built at every level.
//!
//! No level inherits rows from the one below. Each accumulator keeps only the
//! raw (cleaned) text and hands it to [`build_table`] when it is finished, so
//! the document header is chosen from the concatenated text, never unioned
//! from page headers.

use crate::error::{ChunkError, TableIssue};
use crate::output::{ChunkResult, PageExtraction};
use crate::pipeline::chunk::{ChunkWindow, PageGeometry};
use crate::pipeline::llm::ChunkResponse;
use crate::pipeline::postprocess::clean_model_text;
use crate::pipeline::table::{build_table, Table, TableOptions, ERROR_MARKER_PREFIX};
use tracing::{debug, info, warn};

/// Result of one chunk's VLM call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    Extracted(ChunkResponse),
    Failed(ChunkError),
}

impl ChunkOutcome {
    /// Text appended to the page accumulator for this chunk.
    ///
    /// Failures become the bracketed marker the header resolver filters out;
    /// an empty answer contributes nothing.
    pub fn accumulator_text(&self, chunk_num: usize) -> Option<String> {
        match self {
            ChunkOutcome::Extracted(response) => {
                let cleaned = clean_model_text(&response.text);
                (!cleaned.is_empty()).then_some(cleaned)
            }
            ChunkOutcome::Failed(err) => Some(error_marker(err.kind(), chunk_num)),
        }
    }
}

/// `[API Error: <kind> in chunk <n>]`
pub fn error_marker(kind: &str, chunk_num: usize) -> String {
    format!("{ERROR_MARKER_PREFIX} {kind} in chunk {chunk_num}]")
}

/// Collects one page's chunk results and raw text, in window order.
#[derive(Debug)]
pub struct PageAccumulator {
    page_num: usize,
    geometry: PageGeometry,
    text: String,
    chunks: Vec<ChunkResult>,
}

impl PageAccumulator {
    pub fn new(page_num: usize, geometry: PageGeometry) -> Self {
        Self {
            page_num,
            geometry,
            text: String::new(),
            chunks: Vec::new(),
        }
    }

    /// Append the next chunk's outcome.
    pub fn push(
        &mut self,
        window: ChunkWindow,
        outcome: ChunkOutcome,
        duration_ms: u64,
        options: TableOptions,
    ) {
        let chunk_num = self.chunks.len() + 1;
        let text = outcome.accumulator_text(chunk_num);
        if let Some(ref t) = text {
            self.text.push_str(t);
            self.text.push('\n');
        }

        let chunk_text = text.unwrap_or_default();
        let table = build_table(&chunk_text, options);
        let result = match outcome {
            ChunkOutcome::Extracted(response) => ChunkResult {
                chunk_num,
                window,
                text: chunk_text,
                table,
                input_tokens: response.input_tokens,
                output_tokens: response.output_tokens,
                retries: response.retries,
                duration_ms,
                error: None,
            },
            ChunkOutcome::Failed(err) => ChunkResult {
                chunk_num,
                window,
                text: chunk_text,
                table,
                input_tokens: 0,
                output_tokens: 0,
                retries: 0,
                duration_ms,
                error: Some(err),
            },
        };
        self.chunks.push(result);
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Build the page-level table from the accumulated text.
    pub fn finish(self, options: TableOptions) -> PageExtraction {
        let text = self.text.trim().to_string();
        let table = build_table(&text, options);
        log_level_outcome(&format!("Page {}", self.page_num), &table);

        PageExtraction {
            page_num: self.page_num,
            geometry: self.geometry,
            chunks: self.chunks,
            text,
            table,
        }
    }
}

/// Append-only store of page texts for the document-level table.
#[derive(Debug, Default)]
pub struct DocumentAccumulator {
    page_texts: Vec<String>,
}

impl DocumentAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_page(&mut self, page: &PageExtraction) {
        self.page_texts.push(page.text.clone());
    }

    /// Concatenated page texts in page order.
    pub fn text(&self) -> String {
        self.page_texts.join("\n").trim().to_string()
    }

    /// Reparse the whole document text from scratch.
    pub fn finish(self, options: TableOptions) -> (String, Result<Table, TableIssue>) {
        let text = self.text();
        let table = build_table(&text, options);
        log_level_outcome("Document", &table);
        (text, table)
    }
}

fn log_level_outcome(level: &str, table: &Result<Table, TableIssue>) {
    match table {
        Ok(t) if t.rows.is_empty() => {
            info!("{}: header found ({} columns), no data rows", level, t.col_count())
        }
        Ok(t) => debug!("{}: {} columns × {} rows", level, t.col_count(), t.rows.len()),
        Err(TableIssue::NoText) => info!("{}: no text extracted", level),
        Err(issue) => warn!("{}: {}", level, issue),
    }
}
