//! Error types for the pdf2table library.
//!
//! Three distinct error types reflect three distinct failure scopes:
//!
//! * [`Pdf2TableError`] — **Fatal**: the extraction cannot proceed at all
//!   (bad input file, wrong password, invalid chunking, provider not
//!   configured). Returned as `Err(Pdf2TableError)` from the top-level
//!   `extract_*` functions.
//!
//! * [`ChunkError`] — **Non-fatal**: the VLM call for a single chunk failed.
//!   It is recorded on the chunk and rendered as an inline error marker in the
//!   page text; every other chunk and page still runs.
//!
//! * [`TableIssue`] — **Level-local**: no table could be derived at one
//!   granularity (chunk, page, or document). Higher levels reparse the raw
//!   text independently, so an issue on one page never hides the others.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2table library.
#[derive(Debug, Error)]
pub enum Pdf2TableError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Incorrect password for encrypted PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// Selected page numbers exceed the actual page count.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, place the library in the working\n\
directory, or install it system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file (CSV or JSON).
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV serialisation failed.
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialisation failed.
    #[error("JSON write error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or chunking validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single chunk's VLM call.
///
/// Stored on the chunk's [`crate::output::ChunkResult`] and rendered into the
/// page text as `[API Error: <kind> in chunk <n>]`.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ChunkError {
    /// The chunk image could not be encoded for the request body.
    #[error("Page {page}, chunk {chunk}: image encoding failed: {detail}")]
    EncodeFailed {
        page: usize,
        chunk: usize,
        detail: String,
    },

    /// LLM call failed after retries.
    #[error("Page {page}, chunk {chunk}: LLM call failed after {retries} retries: {detail}")]
    LlmFailed {
        page: usize,
        chunk: usize,
        retries: u32,
        detail: String,
    },

    /// LLM call timed out on every attempt.
    #[error("Page {page}, chunk {chunk}: LLM call timed out after {secs}s")]
    Timeout {
        page: usize,
        chunk: usize,
        secs: u64,
    },
}

impl ChunkError {
    /// Short error class name used inside the inline error marker.
    pub fn kind(&self) -> &'static str {
        match self {
            ChunkError::EncodeFailed { .. } => "EncodeError",
            ChunkError::LlmFailed { .. } => "LlmError",
            ChunkError::Timeout { .. } => "Timeout",
        }
    }

    /// Attach the page/chunk position the extractor did not know about.
    pub fn at(mut self, page_num: usize, chunk_num: usize) -> Self {
        match &mut self {
            ChunkError::EncodeFailed { page, chunk, .. }
            | ChunkError::LlmFailed { page, chunk, .. }
            | ChunkError::Timeout { page, chunk, .. } => {
                *page = page_num;
                *chunk = chunk_num;
            }
        }
        self
    }
}

/// Why no table could be derived at one aggregation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum TableIssue {
    /// The accumulated text was empty.
    #[error("no text extracted")]
    NoText,

    /// Text was present but no row survived parsing.
    #[error("no table rows parsed")]
    NoRowsParsed,

    /// Every parsed row was blank or an error marker.
    #[error("no header row found")]
    NoHeaderFound,
}
