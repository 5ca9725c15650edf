//! CLI binary for pdf2table.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, writes the output folder and prints a summary.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2table::pipeline::input::source_name;
use pdf2table::{
    extract_tables, inspect, persist, ExtractionConfig, ExtractionProgressCallback, PageSelection,
    ProgressCallback, RecordIdentifiers,
};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Resolution of the fractional progress bar.
const BAR_STEPS: u64 = 1000;

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Terminal progress: one bar driven by the `[0, 1]` fraction plus a log line
/// per chunk and per page.
struct CliProgressCallback {
    bar: ProgressBar,
    page_started: Mutex<Option<Instant>>,
    chunk_errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(BAR_STEPS);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Rendering PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            page_started: Mutex::new(None),
            chunk_errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {percent:>3}%  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.set_position(0);
        self.bar.reset_eta();
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_pages: usize, estimated_chunks: usize) {
        self.activate_bar();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "Extracting tables from {total_pages} pages (~{estimated_chunks} chunks)…"
            ))
        ));
    }

    fn on_page_start(&self, _page_num: usize, _total_pages: usize, _chunk_count: usize) {
        if let Ok(mut started) = self.page_started.lock() {
            *started = Some(Instant::now());
        }
    }

    fn on_chunk_complete(&self, page_num: usize, chunk_num: usize, text_len: usize) {
        self.bar.println(format!(
            "    {} page {page_num} chunk {chunk_num}  {}",
            dim("·"),
            dim(&format!("{text_len} chars")),
        ));
    }

    fn on_chunk_error(&self, page_num: usize, chunk_num: usize, error: &str) {
        self.chunk_errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(std::iter::once('…')).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "    {} page {page_num} chunk {chunk_num}  {}",
            red("✗"),
            red(&msg)
        ));
    }

    fn on_progress(&self, fraction: f32) {
        self.bar
            .set_position((fraction.clamp(0.0, 1.0) * BAR_STEPS as f32).round() as u64);
    }

    fn on_page_complete(&self, page_num: usize, rows: Option<usize>) {
        let elapsed = self
            .page_started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);

        let summary = match rows {
            Some(n) => format!("{} {n:>4} rows", green("✓")),
            None => format!("{} no table", red("✗")),
        };
        self.bar.println(format!(
            "  {summary}  Page {page_num:>3}  {}",
            dim(&format!("{elapsed:.1}s"))
        ));
    }

    fn on_status(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    fn on_extraction_complete(&self, chunks: usize, failed_chunks: usize) {
        self.bar.finish_and_clear();
        if failed_chunks == 0 {
            eprintln!(
                "{} {} chunks extracted successfully",
                green("✔"),
                bold(&chunks.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} chunks extracted  ({} failed)",
                if failed_chunks == chunks {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&(chunks - failed_chunks).to_string()),
                chunks,
                red(&failed_chunks.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract every table into ./output_chunks
  pdf2table invoice.pdf

  # Smaller strips with more overlap for dense tables
  pdf2table --chunk-height 600 --overlap 150 report.pdf

  # Specific pages, different model
  pdf2table --pages 2-4 --model gpt-4.1 --provider openai report.pdf

  # Print the JSON record to stdout
  pdf2table --json --project-id 7 --file-id 8 scan.pdf > record.json

  # Inspect PDF metadata (no API key needed)
  pdf2table --inspect-only report.pdf

OUTPUT LAYOUT:
  <output-dir>/page_<n>/page_<n>_data.csv   one CSV per page with a table
  <output-dir>/combined_data.csv            document-level table
  <output-dir>/extracted_data.json          PROJECT/FILE/METADATA/TABLEDATA/TABLECELL

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium or the directory containing it
"#;

/// Extract tables from PDF files and URLs using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2table",
    version,
    about = "Extract tables from PDF files and URLs into CSV and JSON using Vision LLMs",
    long_about = "Render each PDF page, cut it into overlapping horizontal strips, ask a \
Vision Language Model for the table rows in every strip, and rebuild per-page and \
document-level tables as CSV plus a relational JSON record.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Directory receiving page CSVs, the combined CSV and the JSON record.
    #[arg(short, long, env = "PDF2TABLE_OUTPUT_DIR", default_value = "output_chunks")]
    output_dir: PathBuf,

    /// Strip height in rendered pixels.
    #[arg(long, env = "PDF2TABLE_CHUNK_HEIGHT", default_value_t = 800)]
    chunk_height: u32,

    /// Pixels shared by consecutive strips.
    #[arg(long, env = "PDF2TABLE_OVERLAP", default_value_t = 100)]
    overlap: u32,

    /// Render zoom factor.
    #[arg(long, env = "PDF2TABLE_SCALE", default_value_t = 2.0)]
    scale: f32,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PDF2TABLE_PAGES", default_value = "all")]
    pages: String,

    /// LLM model ID (e.g. gpt-4.1-mini, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2TABLE_PASSWORD")]
    password: Option<String>,

    /// Path to a text file replacing the built-in extraction prompt.
    #[arg(long, env = "PDF2TABLE_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// Retries per chunk on LLM failure.
    #[arg(long, env = "PDF2TABLE_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDF2TABLE_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Per-chunk LLM call timeout in seconds.
    #[arg(long, env = "PDF2TABLE_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2TABLE_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// PROJECT.id in the JSON record.
    #[arg(long, env = "PDF2TABLE_PROJECT_ID", default_value_t = 101)]
    project_id: i64,

    /// FILE.id in the JSON record.
    #[arg(long, env = "PDF2TABLE_FILE_ID", default_value_t = 102)]
    file_id: i64,

    /// METADATA.id in the JSON record.
    #[arg(long, env = "PDF2TABLE_METADATA_ID", default_value_t = 103)]
    metadata_id: i64,

    /// TABLEDATA.id in the JSON record.
    #[arg(long, env = "PDF2TABLE_TABLEDATA_ID", default_value_t = 104)]
    tabledata_id: i64,

    /// PROJECT.name in the JSON record.
    #[arg(long, env = "PDF2TABLE_PROJECT_NAME", default_value = "PDF_Extraction")]
    project_name: String,

    /// Also print the JSON record to stdout.
    #[arg(long, env = "PDF2TABLE_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2TABLE_NO_PROGRESS")]
    no_progress: bool,

    /// Print PDF metadata only, no extraction.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2TABLE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2TABLE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs when it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let meta = inspect(&cli.input, cli.password.as_deref())
            .await
            .context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", cli.input);
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            println!("Pages:        {}", meta.page_count);
            println!("PDF Version:  {}", meta.pdf_version);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    // ── Run extraction ───────────────────────────────────────────────────
    let output = extract_tables(&cli.input, &config)
        .await
        .context("Extraction failed")?;

    let ids = record_identifiers(&cli);
    let record = output.to_record(&ids, chrono::Local::now().naive_local());

    let report = tokio::task::block_in_place(|| {
        persist::write_outputs(&cli.output_dir, &output, record.as_ref())
    });

    if cli.json {
        match record {
            Some(ref r) => println!(
                "{}",
                serde_json::to_string_pretty(r).context("Failed to serialise record")?
            ),
            None => anyhow::bail!("No table could be derived from '{}'", cli.input),
        }
    }

    if !cli.quiet {
        let stats = &output.stats;
        match &output.table {
            Ok(table) => eprintln!(
                "{}  {} columns × {} rows  {}/{} pages  {}ms  →  {}",
                if stats.failed_chunks == 0 {
                    green("✔")
                } else {
                    cyan("⚠")
                },
                table.col_count(),
                table.rows.len(),
                stats.processed_pages,
                stats.total_pages,
                stats.total_duration_ms,
                bold(&cli.output_dir.display().to_string()),
            ),
            Err(issue) => eprintln!("{}  No combined table: {}", red("✘"), issue),
        }
        eprintln!(
            "   {} files written  ·  {} tokens in  /  {} tokens out",
            report.written.len(),
            dim(&stats.total_input_tokens.to_string()),
            dim(&stats.total_output_tokens.to_string()),
        );
        for (path, err) in &report.failed {
            eprintln!("   {}  Save failed: {} ({})", red("✘"), path.display(), err);
        }
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .chunk_height(cli.chunk_height)
        .overlap(cli.overlap)
        .render_scale(cli.scale)
        .pages(parse_pages(&cli.pages)?)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref path) = cli.prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt(prompt);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn record_identifiers(cli: &Cli) -> RecordIdentifiers {
    RecordIdentifiers {
        project_id: cli.project_id,
        project_name: cli.project_name.clone(),
        file_id: cli.file_id,
        metadata_id: cli.metadata_id,
        tabledata_id: cli.tabledata_id,
        ..RecordIdentifiers::for_source(&source_name(&cli.input))
    }
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start
            .trim()
            .parse()
            .context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!(
                "Invalid page range '{}-{}': start must be <= end",
                start,
                end
            );
        }

        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .with_context(|| format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        if let Some(&p) = pages.iter().find(|&&p| p < 1) {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", p);
        }

        return Ok(PageSelection::Set(pages));
    }

    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }

    Ok(PageSelection::Single(page))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_page_forms() {
        assert!(matches!(parse_pages("all").unwrap(), PageSelection::All));
        assert!(matches!(parse_pages(" 5 ").unwrap(), PageSelection::Single(5)));
        assert!(matches!(parse_pages("2-4").unwrap(), PageSelection::Range(2, 4)));
        match parse_pages("1,3,5").unwrap() {
            PageSelection::Set(p) => assert_eq!(p, vec![1, 3, 5]),
            other => panic!("unexpected selection: {other:?}"),
        }
    }

    #[test]
    fn parse_page_errors() {
        assert!(parse_pages("0").is_err());
        assert!(parse_pages("4-2").is_err());
        assert!(parse_pages("1,x").is_err());
    }

    #[test]
    fn cli_defaults_match_record_defaults() {
        let cli = Cli::parse_from(["pdf2table", "/tmp/scan.pdf"]);
        let ids = record_identifiers(&cli);
        assert_eq!(ids, RecordIdentifiers::for_source("scan.pdf"));
        assert_eq!(cli.output_dir, PathBuf::from("output_chunks"));
    }
}
