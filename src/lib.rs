//! # pdf2table
//!
//! Extract tables from PDF documents into CSV and a relational JSON record
//! using Vision Language Models (VLMs).
//!
//! ## Why strips?
//!
//! Table-heavy pages are dense: a VLM reading a whole page at once drops rows,
//! merges columns and loses its place near the bottom. This crate renders each
//! page, cuts it into overlapping horizontal strips, asks the VLM for
//! delimiter-separated rows per strip, and rebuilds the table from the text at
//! three levels (chunk, page, document), so one bad strip or page never hides
//! the rest.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. Render     rasterise pages via pdfium (spawn_blocking)
//!  ├─ 3. Chunk      overlapping strips (800 px / 100 px by default)
//!  ├─ 4. VLM        one call per strip, retry/backoff/timeout
//!  ├─ 5. Aggregate  chunk text → page text → document text
//!  ├─ 6. Table      parse rows, resolve header, normalise widths
//!  └─ 7. Output     page CSVs, combined CSV, JSON record
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2table::{extract_tables, persist, ExtractionConfig, RecordIdentifiers};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = ExtractionConfig::default();
//!     let output = extract_tables("invoice.pdf", &config).await?;
//!
//!     let ids = RecordIdentifiers::for_source("invoice.pdf");
//!     let record = output.to_record(&ids, chrono::Local::now().naive_local());
//!     let report = persist::write_outputs(Path::new("output_chunks"), &output, record.as_ref());
//!     for (path, err) in &report.failed {
//!         eprintln!("Save failed for {}: {}", path.display(), err);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2table` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2table = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod persist;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod record;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, PageSelection};
pub use error::{ChunkError, Pdf2TableError, TableIssue};
pub use extract::{
    extract_from_images, extract_tables, extract_tables_from_bytes, extract_tables_sync, inspect,
    ExtractionRun,
};
pub use output::{ChunkResult, DocumentMetadata, ExtractionOutput, ExtractionStats, PageExtraction};
pub use pipeline::chunk::{plan, ChunkWindow, ChunkingConfig, PageGeometry};
pub use pipeline::llm::{ChunkExtractor, ChunkResponse, VisionExtractor};
pub use pipeline::table::{build_table, Table, TableOptions};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use record::{build_record, Record, RecordIdentifiers};
