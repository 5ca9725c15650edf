//! Extraction entry points and the sequential chunk loop behind them.
//!
//! One page is finished (every chunk, in window order) before the next one
//! starts, and only one VLM call is in flight at a time. A failed chunk is
//! recorded and rendered as an inline marker; it never stops the run.

use crate::config::ExtractionConfig;
use crate::error::Pdf2TableError;
use crate::output::{DocumentMetadata, ExtractionOutput, ExtractionStats, PageExtraction};
use crate::pipeline::aggregate::{ChunkOutcome, DocumentAccumulator, PageAccumulator};
use crate::pipeline::chunk::{self, PageGeometry};
use crate::pipeline::llm::{ChunkExtractor, VisionExtractor};
use crate::pipeline::{input, render};
use crate::progress::{ExtractionProgressCallback, ProgressTracker};
use crate::prompts::table_extraction_prompt;
use image::DynamicImage;
use std::borrow::Cow;
use std::io::Write;
use std::time::Instant;
use tracing::{debug, info, warn};

/// State owned by one extraction run.
///
/// Holds the document accumulator and the progress counter; nothing here is
/// shared between runs.
pub struct ExtractionRun<'a> {
    config: &'a ExtractionConfig,
    extractor: &'a dyn ChunkExtractor,
    prompt: Cow<'a, str>,
    total_pages: usize,
    estimated_chunks: usize,
    progress: ProgressTracker,
    document: DocumentAccumulator,
    pages: Vec<PageExtraction>,
    llm_duration_ms: u64,
    started: Instant,
}

impl<'a> ExtractionRun<'a> {
    /// Start a run over pages with the given heights.
    pub fn new(
        config: &'a ExtractionConfig,
        extractor: &'a dyn ChunkExtractor,
        page_heights: &[u32],
    ) -> Self {
        let estimated_chunks = page_heights
            .iter()
            .map(|&h| chunk::estimate_chunk_count(h, config.chunking))
            .sum();

        Self {
            config,
            extractor,
            prompt: match config.prompt.as_deref() {
                Some(custom) => Cow::Borrowed(custom),
                None => table_extraction_prompt(config.delimiter),
            },
            total_pages: page_heights.len(),
            estimated_chunks,
            progress: ProgressTracker::new(estimated_chunks),
            document: DocumentAccumulator::new(),
            pages: Vec::with_capacity(page_heights.len()),
            llm_duration_ms: 0,
            started: Instant::now(),
        }
    }

    fn notify(&self, event: impl FnOnce(&dyn ExtractionProgressCallback)) {
        if let Some(ref cb) = self.config.progress_callback {
            event(cb.as_ref());
        }
    }

    /// Chunk, extract and aggregate one rendered page.
    pub async fn process_page(&mut self, page_num: usize, image: &DynamicImage) {
        let geometry = PageGeometry::of(image);
        let windows = chunk::plan(geometry, self.config.chunking);
        let chunk_count = windows.len();
        let total_pages = self.total_pages;
        let options = self.config.table_options();
        info!(
            "Page {}: {}x{} px → {} chunks",
            page_num, geometry.width, geometry.height, chunk_count
        );
        self.notify(|cb| cb.on_page_start(page_num, total_pages, chunk_count));

        let extractor = self.extractor;
        let prompt = self.prompt.clone();
        let mut page = PageAccumulator::new(page_num, geometry);

        for (i, window) in windows.into_iter().enumerate() {
            let chunk_num = i + 1;
            let status = format!(
                "Processing page {}/{}, chunk {}/{}",
                self.pages.len() + 1,
                total_pages,
                chunk_num,
                chunk_count
            );
            self.notify(|cb| cb.on_status(&status));
            debug!(
                "Page {} chunk {}: rows {}..{}",
                page_num, chunk_num, window.top, window.bottom
            );

            let strip = window.crop(image);
            let start = Instant::now();
            let outcome = match extractor.extract(&strip, &prompt).await {
                Ok(response) => {
                    let len = response.text.len();
                    self.notify(|cb| cb.on_chunk_complete(page_num, chunk_num, len));
                    ChunkOutcome::Extracted(response)
                }
                Err(err) => {
                    let err = err.at(page_num, chunk_num);
                    warn!("{}", err);
                    let message = err.to_string();
                    self.notify(|cb| cb.on_chunk_error(page_num, chunk_num, &message));
                    ChunkOutcome::Failed(err)
                }
            };
            let duration_ms = start.elapsed().as_millis() as u64;
            self.llm_duration_ms += duration_ms;

            page.push(window, outcome, duration_ms, options);
            let fraction = self.progress.advance();
            self.notify(|cb| cb.on_progress(fraction));
        }

        let page = page.finish(options);
        let rows = page.table.as_ref().ok().map(|t| t.rows.len());
        self.notify(|cb| cb.on_page_complete(page_num, rows));
        self.document.push_page(&page);
        self.pages.push(page);
    }

    /// Build the document table and the run statistics.
    pub fn finish(self) -> ExtractionOutput {
        let ExtractionRun {
            config,
            total_pages,
            estimated_chunks,
            mut progress,
            document,
            pages,
            llm_duration_ms,
            started,
            ..
        } = self;

        let (document_text, table) = document.finish(config.table_options());
        let fraction = progress.finish();

        let processed_chunks = progress.completed();
        let failed_chunks = pages.iter().map(PageExtraction::failed_chunks).sum();
        let chunks = pages.iter().flat_map(|p| p.chunks.iter());
        let stats = ExtractionStats {
            total_pages,
            processed_pages: pages.len(),
            estimated_chunks,
            processed_chunks,
            failed_chunks,
            total_input_tokens: chunks.clone().map(|c| c.input_tokens as u64).sum(),
            total_output_tokens: chunks.map(|c| c.output_tokens as u64).sum(),
            total_duration_ms: started.elapsed().as_millis() as u64,
            render_duration_ms: 0,
            llm_duration_ms,
        };

        if let Some(ref cb) = config.progress_callback {
            cb.on_progress(fraction);
            cb.on_status("Extraction complete");
            cb.on_extraction_complete(processed_chunks, failed_chunks);
        }

        info!(
            "Extraction complete: {} pages, {} chunks ({} failed), {}ms",
            stats.processed_pages, processed_chunks, failed_chunks, stats.total_duration_ms
        );

        ExtractionOutput {
            pages,
            document_text,
            table,
            metadata: None,
            stats,
        }
    }
}

/// Run the chunk pipeline over already-rendered pages.
///
/// `pages` holds `(page_index_0based, image)` pairs, as returned by the
/// renderer; they are processed in the given order. Any [`ChunkExtractor`]
/// works, which is how tests drive the pipeline without a network.
pub async fn extract_from_images(
    pages: Vec<(usize, DynamicImage)>,
    extractor: &dyn ChunkExtractor,
    config: &ExtractionConfig,
) -> ExtractionOutput {
    let heights: Vec<u32> = pages.iter().map(|(_, img)| img.height()).collect();
    let mut run = ExtractionRun::new(config, extractor, &heights);

    let (total_pages, estimated) = (run.total_pages, run.estimated_chunks);
    run.notify(|cb| cb.on_extraction_start(total_pages, estimated));
    info!(
        "Extracting {} pages, ~{} chunks (chunk height {}, overlap {})",
        total_pages,
        estimated,
        config.chunking.chunk_height(),
        config.chunking.overlap()
    );

    for (idx, image) in &pages {
        run.process_page(idx + 1, image).await;
    }

    run.finish()
}

/// Extract tables from a PDF file or URL.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(ExtractionOutput)` even when individual chunks failed (see
/// `output.stats.failed_chunks`) or no table could be derived (see
/// `output.table`).
///
/// # Errors
/// Only fatal problems: unreadable input, not a PDF, wrong password, no
/// provider, or a page selection outside the document.
pub async fn extract_tables(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Pdf2TableError> {
    let total_start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting extraction: {}", input_str);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let pdf_path = resolved.path().to_path_buf();

    let extractor = VisionExtractor::from_config(config)?;

    let metadata = render::extract_metadata(&pdf_path, config.password.as_deref()).await?;
    let total_pages = metadata.page_count;
    info!("PDF has {} pages", total_pages);

    let page_indices = config.pages.to_indices(total_pages);
    if page_indices.is_empty() && total_pages > 0 {
        return Err(Pdf2TableError::PageOutOfRange {
            page: config.pages.first_requested(),
            total: total_pages,
        });
    }

    let render_start = Instant::now();
    let rendered = render::render_pages(&pdf_path, config, &page_indices).await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    info!(
        "Rendered {} pages in {}ms",
        rendered.len(),
        render_duration_ms
    );

    let mut output = extract_from_images(rendered, &extractor, config).await;
    output.stats.total_pages = total_pages;
    output.stats.render_duration_ms = render_duration_ms;
    output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    output.metadata = Some(metadata);
    Ok(output)
}

/// Extract tables from PDF bytes held in memory.
///
/// The bytes are written to a managed temp file that is removed when this
/// returns.
pub async fn extract_tables_from_bytes(
    bytes: &[u8],
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Pdf2TableError> {
    let mut tmp = tempfile::Builder::new()
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| Pdf2TableError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| Pdf2TableError::Internal(format!("tempfile write: {e}")))?;
    let path = tmp.path().to_string_lossy().to_string();
    extract_tables(&path, config).await
}

/// Blocking wrapper around [`extract_tables`].
///
/// Creates a temporary tokio runtime internally; do not call from inside one.
pub fn extract_tables_sync(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Pdf2TableError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2TableError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract_tables(input_str, config))
}

/// Read PDF metadata without extracting anything.
///
/// Needs no LLM provider or API key.
pub async fn inspect(
    input_str: impl AsRef<str>,
    password: Option<&str>,
) -> Result<DocumentMetadata, Pdf2TableError> {
    let resolved = input::resolve_input(input_str.as_ref(), 120).await?;
    render::extract_metadata(resolved.path(), password).await
}
