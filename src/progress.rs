//! Progress-callback trait for per-chunk extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through each page and chunk. Methods return
//! nothing, so a display that fails cannot fail the extraction.
//!
//! # Example
//!
//! ```rust
//! use pdf2table::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::Arc;
//!
//! struct PrintProgress;
//!
//! impl ExtractionProgressCallback for PrintProgress {
//!     fn on_progress(&self, fraction: f32) {
//!         eprintln!("{:>3.0}%", fraction * 100.0);
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(PrintProgress) as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the extraction pipeline as it processes pages and chunks.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once after rendering, before the first chunk.
    ///
    /// # Arguments
    /// * `total_pages`      — pages that will be processed
    /// * `estimated_chunks` — closed-form chunk estimate over all pages; the
    ///   real count can be lower
    fn on_extraction_start(&self, total_pages: usize, estimated_chunks: usize) {
        let _ = (total_pages, estimated_chunks);
    }

    /// Called before the first chunk of a page.
    fn on_page_start(&self, page_num: usize, total_pages: usize, chunk_count: usize) {
        let _ = (page_num, total_pages, chunk_count);
    }

    /// Called when a chunk's VLM call returned text.
    ///
    /// # Arguments
    /// * `page_num`  — 1-indexed page number
    /// * `chunk_num` — 1-indexed chunk number within the page
    /// * `text_len`  — byte length of the raw response text
    fn on_chunk_complete(&self, page_num: usize, chunk_num: usize, text_len: usize) {
        let _ = (page_num, chunk_num, text_len);
    }

    /// Called when a chunk's VLM call failed after all retries.
    fn on_chunk_error(&self, page_num: usize, chunk_num: usize, error: &str) {
        let _ = (page_num, chunk_num, error);
    }

    /// Overall completion in `[0.0, 1.0]`, called after every chunk.
    /// Values never decrease within one run.
    fn on_progress(&self, fraction: f32) {
        let _ = fraction;
    }

    /// Called after a page's table was built (or could not be).
    ///
    /// # Arguments
    /// * `page_num` — 1-indexed page number
    /// * `rows`     — data rows in the page table, `None` when no table
    fn on_page_complete(&self, page_num: usize, rows: Option<usize>) {
        let _ = (page_num, rows);
    }

    /// Human-readable status line ("Processing page 2/5, chunk 3/4…").
    fn on_status(&self, message: &str) {
        let _ = message;
    }

    /// Called once after the document-level table was built.
    ///
    /// # Arguments
    /// * `chunks`        — chunks actually processed
    /// * `failed_chunks` — chunks whose VLM call failed
    fn on_extraction_complete(&self, chunks: usize, failed_chunks: usize) {
        let _ = (chunks, failed_chunks);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

/// Chunk counter turning completed chunks into a clamped progress fraction.
#[derive(Debug, Clone, Copy)]
pub struct ProgressTracker {
    completed: usize,
    estimated_total: usize,
    last: f32,
}

impl ProgressTracker {
    pub fn new(estimated_total: usize) -> Self {
        Self {
            completed: 0,
            estimated_total,
            last: 0.0,
        }
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Record one finished chunk and return the new fraction.
    pub fn advance(&mut self) -> f32 {
        self.completed += 1;
        let fraction = if self.estimated_total == 0 {
            1.0
        } else {
            (self.completed as f32 / self.estimated_total as f32).min(1.0)
        };
        self.last = self.last.max(fraction);
        self.last
    }

    /// Mark the run done; always 1.0.
    pub fn finish(&mut self) -> f32 {
        self.last = 1.0;
        self.last
    }
}
