//! Configuration types for PDF table extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Chunk geometry is validated here, at
//! build time, so no per-chunk work ever starts on a bad configuration.

use crate::error::Pdf2TableError;
use crate::pipeline::chunk::ChunkingConfig;
use crate::pipeline::table::TableOptions;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Configuration for a PDF table extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2table::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .chunk_height(600)
///     .overlap(80)
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// assert_eq!(config.chunking.stride(), 520);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Strip height and overlap used to slice every page. Default: 800 / 100 px.
    pub chunking: ChunkingConfig,

    /// Zoom factor applied when rasterising pages. Default: 2.0.
    ///
    /// Small table fonts need the extra pixels; 2× of a Letter page is about
    /// 1224 × 1584 px, i.e. two strips at the default chunk height.
    pub render_scale: f32,

    /// Cap on either rendered dimension in pixels. Default: 4000.
    pub max_rendered_pixels: u32,

    /// Cell delimiter the model is asked to use. Default: `'|'`.
    pub delimiter: char,

    /// Drop data rows that repeat the header. Default: true.
    pub dedupe_repeated_headers: bool,

    /// LLM model identifier, e.g. "gpt-4.1-mini", "gemini-2.0-flash".
    /// If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "gemini", "anthropic").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per chunk. Default: 4096.
    pub max_tokens: usize,

    /// Retry attempts on a failed VLM call. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-VLM-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Custom extraction prompt. If None, uses
    /// [`crate::prompts::table_extraction_prompt`] for the configured
    /// delimiter.
    pub prompt: Option<String>,

    /// Page selection. Default: All pages.
    pub pages: PageSelection,

    /// Observer receiving progress and status events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            render_scale: 2.0,
            max_rendered_pixels: 4000,
            delimiter: '|',
            dedupe_repeated_headers: true,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 4096,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            download_timeout_secs: 120,
            password: None,
            prompt: None,
            pages: PageSelection::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("chunking", &self.chunking)
            .field("render_scale", &self.render_scale)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("delimiter", &self.delimiter)
            .field("dedupe_repeated_headers", &self.dedupe_repeated_headers)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("pages", &self.pages)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        let defaults = ChunkingConfig::default();
        ExtractionConfigBuilder {
            chunk_height: defaults.chunk_height(),
            overlap: defaults.overlap(),
            config: Self::default(),
        }
    }

    /// Options for the parse → resolve → normalise sequence.
    pub fn table_options(&self) -> TableOptions {
        TableOptions {
            delimiter: self.delimiter,
            dedupe_repeated_headers: self.dedupe_repeated_headers,
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    chunk_height: u32,
    overlap: u32,
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn chunk_height(mut self, px: u32) -> Self {
        self.chunk_height = px;
        self
    }

    pub fn overlap(mut self, px: u32) -> Self {
        self.overlap = px;
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.config.delimiter = delimiter;
        self
    }

    pub fn dedupe_repeated_headers(mut self, v: bool) -> Self {
        self.config.dedupe_repeated_headers = v;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<ExtractionConfig, Pdf2TableError> {
        self.config.chunking = ChunkingConfig::new(self.chunk_height, self.overlap)?;

        let c = &self.config;
        if !(c.render_scale.is_finite() && c.render_scale > 0.0 && c.render_scale <= 8.0) {
            return Err(Pdf2TableError::InvalidConfig(format!(
                "Render scale must be in (0, 8], got {}",
                c.render_scale
            )));
        }
        if c.delimiter.is_whitespace() {
            return Err(Pdf2TableError::InvalidConfig(
                "Delimiter must not be a whitespace character".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(Pdf2TableError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Specifies which pages of the PDF to extract.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSelection {
    /// Extract all pages (default).
    #[default]
    All,
    /// Extract a single page (1-indexed).
    Single(usize),
    /// Extract a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Extract specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    /// Lowest 1-indexed page the selection asks for (0 for `All`).
    pub fn first_requested(&self) -> usize {
        match self {
            PageSelection::All => 0,
            PageSelection::Single(p) => *p,
            PageSelection::Range(start, _) => *start,
            PageSelection::Set(pages) => pages.iter().copied().min().unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build() {
        let config = ExtractionConfig::builder().build().expect("defaults are valid");
        assert_eq!(config.chunking.chunk_height(), 800);
        assert_eq!(config.chunking.overlap(), 100);
        assert_eq!(config.delimiter, '|');
        assert!(config.dedupe_repeated_headers);
    }

    #[test]
    fn overlap_not_below_chunk_height_rejected() {
        let err = ExtractionConfig::builder()
            .chunk_height(300)
            .overlap(300)
            .build()
            .unwrap_err();
        assert!(matches!(err, Pdf2TableError::InvalidConfig(_)));
    }

    #[test]
    fn zero_chunk_height_rejected() {
        assert!(ExtractionConfig::builder().chunk_height(0).overlap(0).build().is_err());
    }

    #[test]
    fn bad_scale_and_delimiter_rejected() {
        assert!(ExtractionConfig::builder().render_scale(0.0).build().is_err());
        assert!(ExtractionConfig::builder().render_scale(f32::NAN).build().is_err());
        assert!(ExtractionConfig::builder().delimiter('\t').build().is_err());
        assert!(ExtractionConfig::builder().delimiter(';').build().is_ok());
    }

    #[test]
    fn table_options_follow_config() {
        let config = ExtractionConfig::builder()
            .delimiter(';')
            .dedupe_repeated_headers(false)
            .build()
            .unwrap();
        let opts = config.table_options();
        assert_eq!(opts.delimiter, ';');
        assert!(!opts.dedupe_repeated_headers);
    }

    #[test]
    fn debug_hides_provider() {
        let s = format!("{:?}", ExtractionConfig::default());
        assert!(s.contains("chunking"));
        assert!(s.contains("provider: None"));
    }

    #[test]
    fn test_page_selection_to_indices() {
        assert_eq!(PageSelection::All.to_indices(5), vec![0, 1, 2, 3, 4]);
        assert_eq!(PageSelection::Single(3).to_indices(5), vec![2]);
        assert_eq!(PageSelection::Single(6).to_indices(5), Vec::<usize>::new());
        assert_eq!(PageSelection::Range(2, 4).to_indices(5), vec![1, 2, 3]);
        assert_eq!(
            PageSelection::Set(vec![3, 1, 3]).to_indices(5),
            vec![0, 2]
        );
        assert_eq!(PageSelection::Set(vec![7, 4]).first_requested(), 4);
        assert_eq!(PageSelection::Range(3, 9).first_requested(), 3);
    }
}
