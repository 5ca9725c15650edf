//! Pipeline integration tests.
//!
//! These drive `extract_from_images` with scripted extractors over synthetic
//! page images, so they need neither pdfium nor an API key.

use futures::future::BoxFuture;
use image::{DynamicImage, Rgba, RgbaImage};
use pdf2table::{
    extract_from_images, persist, ChunkError, ChunkExtractor, ChunkResponse, ExtractionConfig,
    ExtractionProgressCallback, RecordIdentifiers, TableIssue,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Route library logs to the test harness; `RUST_LOG=debug` shows per-chunk
/// detail.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Replies from a queue in call order and records the strip heights it saw.
struct ScriptedExtractor {
    replies: Mutex<VecDeque<Result<String, ChunkError>>>,
    strip_heights: Mutex<Vec<u32>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedExtractor {
    fn new(replies: Vec<Result<&str, ChunkError>>) -> Self {
        Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|r| r.map(str::to_string))
                    .collect(),
            ),
            strip_heights: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn heights(&self) -> Vec<u32> {
        self.strip_heights.lock().unwrap().clone()
    }
}

impl ChunkExtractor for ScriptedExtractor {
    fn extract<'a>(
        &'a self,
        image: &'a DynamicImage,
        prompt: &'a str,
    ) -> BoxFuture<'a, Result<ChunkResponse, ChunkError>> {
        self.strip_heights.lock().unwrap().push(image.height());
        self.prompts.lock().unwrap().push(prompt.to_string());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()));
        Box::pin(async move {
            reply.map(|text| ChunkResponse {
                text,
                input_tokens: 100,
                output_tokens: 20,
                retries: 0,
            })
        })
    }
}

#[derive(Default)]
struct Recorder {
    fractions: Mutex<Vec<f32>>,
    statuses: Mutex<Vec<String>>,
    pages: Mutex<Vec<(usize, Option<usize>)>>,
    start: Mutex<Option<(usize, usize)>>,
    complete: Mutex<Option<(usize, usize)>>,
}

impl ExtractionProgressCallback for Recorder {
    fn on_extraction_start(&self, total_pages: usize, estimated_chunks: usize) {
        *self.start.lock().unwrap() = Some((total_pages, estimated_chunks));
    }
    fn on_progress(&self, fraction: f32) {
        self.fractions.lock().unwrap().push(fraction);
    }
    fn on_status(&self, message: &str) {
        self.statuses.lock().unwrap().push(message.to_string());
    }
    fn on_page_complete(&self, page_num: usize, rows: Option<usize>) {
        self.pages.lock().unwrap().push((page_num, rows));
    }
    fn on_extraction_complete(&self, chunks: usize, failed_chunks: usize) {
        *self.complete.lock().unwrap() = Some((chunks, failed_chunks));
    }
}

fn page(height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(60, height, Rgba([255, 255, 255, 255])))
}

fn config(chunk_height: u32, overlap: u32) -> ExtractionConfig {
    ExtractionConfig::builder()
        .chunk_height(chunk_height)
        .overlap(overlap)
        .build()
        .expect("valid config")
}

fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

fn timeout() -> ChunkError {
    ChunkError::Timeout {
        page: 0,
        chunk: 0,
        secs: 120,
    }
}

// ── Chunking through the pipeline ────────────────────────────────────────────

#[tokio::test]
async fn thousand_pixel_page_sends_three_strips() {
    init_tracing();
    let extractor = ScriptedExtractor::new(vec![
        Ok("|Name|Qty|\n|Bolt|4|"),
        Ok("|Name|Qty|\n|Bolt|4|"),
        Ok("|Name|Qty|\n|Bolt|4|"),
    ]);
    let out = extract_from_images(vec![(0, page(1000))], &extractor, &config(400, 50)).await;

    assert_eq!(extractor.heights(), vec![400, 400, 300]);
    let spans: Vec<(u32, u32)> = out.pages[0]
        .chunks
        .iter()
        .map(|c| (c.window.top, c.window.bottom))
        .collect();
    assert_eq!(spans, vec![(0, 400), (350, 750), (700, 1000)]);

    // The repeated header is kept once; the overlapping data row is not
    // reconciled.
    let table = out.table.expect("document table");
    assert_eq!(table.header, row(&["Name", "Qty"]));
    assert_eq!(table.rows, vec![row(&["Bolt", "4"]); 3]);

    assert_eq!(out.stats.total_input_tokens, 300);
    assert_eq!(out.stats.total_output_tokens, 60);
}

#[test]
fn short_page_is_one_strip() {
    let extractor = ScriptedExtractor::new(vec![Ok("A|B\n1|2")]);
    let out = tokio_test::block_on(extract_from_images(
        vec![(4, page(300))],
        &extractor,
        &config(400, 50),
    ));
    assert_eq!(extractor.heights(), vec![300]);
    assert_eq!(out.pages[0].page_num, 5);
    assert_eq!(out.stats.estimated_chunks, 1);
}

// ── Failures ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_chunk_becomes_marker_and_run_continues() {
    init_tracing();
    let extractor = ScriptedExtractor::new(vec![
        Ok("Item|Price\nPen|2"),
        Err(timeout()),
        Ok("Ink|5"),
    ]);
    let out = extract_from_images(vec![(0, page(1000))], &extractor, &config(400, 50)).await;

    let page = &out.pages[0];
    assert_eq!(
        page.text,
        "Item|Price\nPen|2\n[API Error: Timeout in chunk 2]\nInk|5"
    );
    assert_eq!(
        page.chunks[1].error,
        Some(ChunkError::Timeout {
            page: 1,
            chunk: 2,
            secs: 120
        })
    );
    assert_eq!(page.chunks[1].table, Err(TableIssue::NoHeaderFound));

    let table = page.table.as_ref().expect("page table");
    assert_eq!(table.rows, vec![row(&["Pen", "2"]), row(&["Ink", "5"])]);
    assert_eq!(out.stats.failed_chunks, 1);
}

#[tokio::test]
async fn every_chunk_failing_yields_no_header() {
    let extractor = ScriptedExtractor::new(vec![Err(timeout()), Err(timeout())]);
    let out = extract_from_images(vec![(0, page(700))], &extractor, &config(400, 50)).await;
    assert_eq!(out.pages[0].chunks.len(), 2);
    assert_eq!(out.table, Err(TableIssue::NoHeaderFound));
    assert!(out.to_record(&RecordIdentifiers::for_source("x.pdf"), now()).is_none());
}

#[tokio::test]
async fn fenced_answers_are_cleaned_before_parsing() {
    let extractor = ScriptedExtractor::new(vec![Ok("```csv\nA|B\n1|2\n```")]);
    let out = extract_from_images(vec![(0, page(200))], &extractor, &config(400, 50)).await;
    let table = out.table.expect("document table");
    assert_eq!(table.header, row(&["A", "B"]));
    assert_eq!(table.rows, vec![row(&["1", "2"])]);
}

#[tokio::test]
async fn colon_delimiter_keeps_failure_marker_out_of_header() {
    init_tracing();
    let cfg = ExtractionConfig::builder()
        .chunk_height(400)
        .overlap(50)
        .delimiter(':')
        .build()
        .unwrap();
    let extractor = ScriptedExtractor::new(vec![Err(timeout()), Ok("Name:Qty\nBolt:4")]);
    let out = extract_from_images(vec![(0, page(700))], &extractor, &cfg).await;

    assert_eq!(out.pages[0].text, "[API Error: Timeout in chunk 1]\nName:Qty\nBolt:4");
    let table = out.table.expect("document table");
    assert_eq!(table.header, row(&["Name", "Qty"]));
    assert_eq!(table.rows, vec![row(&["Bolt", "4"])]);

    let prompts = extractor.prompts.lock().unwrap().clone();
    assert_eq!(prompts.len(), 2);
    assert!(prompts.iter().all(|p| p.contains("delimited by `:`")));
}

// ── Multi-page aggregation ───────────────────────────────────────────────────

#[tokio::test]
async fn pages_are_independent_and_document_is_reparsed() {
    let extractor = ScriptedExtractor::new(vec![
        Ok("Code|Desc|Qty\nA1|Widget|3"),
        Ok(""),
        Ok("Code|Desc\nB2|Gadget"),
    ]);
    let pages = vec![(0, page(300)), (1, page(300)), (2, page(300))];
    let out = extract_from_images(pages, &extractor, &config(400, 50)).await;

    assert!(out.pages[0].table.is_ok());
    assert_eq!(out.pages[1].table, Err(TableIssue::NoText));
    let third = out.pages[2].table.as_ref().expect("page 3 table");
    assert_eq!(third.col_count(), 2);

    // Document header comes from the first page; page 3's header repeats two
    // of its columns and is padded like any short row.
    let table = out.table.expect("document table");
    assert_eq!(table.header, row(&["Code", "Desc", "Qty"]));
    assert_eq!(
        table.rows,
        vec![
            row(&["A1", "Widget", "3"]),
            row(&["Code", "Desc", ""]),
            row(&["B2", "Gadget", ""]),
        ]
    );
    assert_eq!(out.stats.processed_pages, 3);
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn progress_is_monotonic_and_ends_at_one() {
    let recorder = Arc::new(Recorder::default());
    let cfg = ExtractionConfig::builder()
        .chunk_height(100)
        .overlap(90)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    // Stride 10 with a 54 px skip tolerance: fewer strips than estimated.
    let extractor = ScriptedExtractor::new(Vec::new());
    let out = extract_from_images(vec![(0, page(1000)), (1, page(50))], &extractor, &cfg).await;

    let fractions = recorder.fractions.lock().unwrap().clone();
    assert!(!fractions.is_empty());
    assert!(fractions.windows(2).all(|w| w[0] <= w[1]), "{fractions:?}");
    assert!(fractions.iter().all(|f| (0.0..=1.0).contains(f)));
    assert_eq!(fractions.last(), Some(&1.0));

    let (total_pages, estimated) = recorder.start.lock().unwrap().expect("start event");
    assert_eq!(total_pages, 2);
    assert!(out.stats.processed_chunks < estimated);
    assert_eq!(
        *recorder.complete.lock().unwrap(),
        Some((out.stats.processed_chunks, 0))
    );
    assert_eq!(
        *recorder.pages.lock().unwrap(),
        vec![(1, None), (2, None)]
    );
    assert!(recorder.statuses.lock().unwrap()[0].starts_with("Processing page 1/2, chunk 1/"));
}

// ── Record and persistence ───────────────────────────────────────────────────

fn now() -> chrono::NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(2024, 6, 1)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .expect("valid date")
}

#[tokio::test]
async fn record_and_output_folder() {
    let extractor = ScriptedExtractor::new(vec![Ok("A|B|C\n1|2|3"), Ok("4|5|6")]);
    let out = extract_from_images(vec![(0, page(300)), (1, page(300))], &extractor, &config(400, 50))
        .await;

    let record = out
        .to_record(&RecordIdentifiers::for_source("scan.pdf"), now())
        .expect("record");
    assert_eq!(record.table_data.row_count, 3);
    assert_eq!(record.table_data.col_count, 3);
    assert_eq!(record.table_cells.len(), 9);
    assert_eq!(record.table_cells[8].content, "6");
    assert_eq!(record.project.description, "From: scan.pdf");

    let dir = tempfile::tempdir().unwrap();
    let report = persist::write_outputs(dir.path(), &out, Some(&record));
    assert!(report.is_complete());
    assert_eq!(report.written.len(), 2 + 1 + 1);

    // Page 2's text alone has no header other than its only row.
    let page2 = std::fs::read_to_string(dir.path().join("page_2/page_2_data.csv")).unwrap();
    assert_eq!(page2, "4,5,6\n");
    let combined = std::fs::read_to_string(dir.path().join("combined_data.csv")).unwrap();
    assert_eq!(combined, "A,B,C\n1,2,3\n4,5,6\n");
}
