//! Pipeline stages for PDF table extraction.
//!
//! Each submodule implements one transformation step and is testable on its
//! own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ chunk ──▶ encode ──▶ llm ──▶ postprocess
//! (URL/path) (pdfium)  (strips)  (base64)   (VLM)   (cleanup)
//!                                                      │
//!                 table ◀── parse ◀── aggregate ◀──────┘
//!             (header/rows) (cells)  (chunk→page→doc)
//! ```
//!
//! 1. [`input`]  — canonicalise the user-supplied path or URL to a local file
//! 2. [`render`] — rasterise selected pages on a blocking thread
//! 3. [`chunk`]  — plan overlapping horizontal windows and crop them
//! 4. [`encode`] — PNG + base64 for the multimodal request body
//! 5. [`llm`]    — the [`llm::ChunkExtractor`] seam and its retrying VLM impl
//! 6. [`postprocess`] — strip fences and invisible characters from answers
//! 7. [`aggregate`] — accumulate text per page and per document
//! 8. [`parse`] / [`table`] — rows, header, normalisation at every level

pub mod aggregate;
pub mod chunk;
pub mod encode;
pub mod input;
pub mod llm;
pub mod parse;
pub mod postprocess;
pub mod render;
pub mod table;
