//! PDF rasterisation: render selected pages to `DynamicImage` via pdfium.
//!
//! pdfium keeps thread-local state and blocks for the whole render, so every
//! entry point here hops onto `spawn_blocking` and binds its own `Pdfium`
//! instance on that thread.
//!
//! Pages are scaled by `render_scale` (2× by default) and then capped to
//! `max_rendered_pixels` on either edge, so an A0 poster does not turn into
//! a 20 000 px bitmap that the chunk planner then slices into dozens of strips.

use crate::config::ExtractionConfig;
use crate::error::Pdf2TableError;
use crate::output::DocumentMetadata;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Env var pointing at a pdfium shared library or the directory holding it.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Rasterise the 0-indexed `page_indices` of a PDF.
///
/// Out-of-range indices are skipped with a warning.
///
/// # Returns
/// `(page_index_0based, DynamicImage)` pairs in the order requested.
pub async fn render_pages(
    pdf_path: &Path,
    config: &ExtractionConfig,
    page_indices: &[usize],
) -> Result<Vec<(usize, DynamicImage)>, Pdf2TableError> {
    let path = pdf_path.to_path_buf();
    let scale = config.render_scale;
    let max_pixels = config.max_rendered_pixels;
    let password = config.password.clone();
    let indices = page_indices.to_vec();

    tokio::task::spawn_blocking(move || {
        render_pages_blocking(&path, scale, max_pixels, password.as_deref(), &indices)
    })
    .await
    .map_err(|e| Pdf2TableError::Internal(format!("Render task panicked: {}", e)))?
}

fn render_pages_blocking(
    pdf_path: &Path,
    scale: f32,
    max_pixels: u32,
    password: Option<&str>,
    page_indices: &[usize],
) -> Result<Vec<(usize, DynamicImage)>, Pdf2TableError> {
    let pdfium = bind_pdfium()?;
    let document = load_document(&pdfium, pdf_path, password)?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(scale)
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(page_indices.len());

    for &idx in page_indices {
        if idx >= total_pages {
            warn!(
                "Skipping page {} (out of range, total={})",
                idx + 1,
                total_pages
            );
            continue;
        }

        let rasterisation_failed = |e: PdfiumError| Pdf2TableError::RasterisationFailed {
            page: idx + 1,
            detail: format!("{:?}", e),
        };

        let page = pages.get(idx as u16).map_err(rasterisation_failed)?;
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(rasterisation_failed)?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );

        results.push((idx, image));
    }

    Ok(results)
}

/// Read document metadata without rendering any page.
pub async fn extract_metadata(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, Pdf2TableError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || extract_metadata_blocking(&path, pwd.as_deref()))
        .await
        .map_err(|e| Pdf2TableError::Internal(format!("Metadata task panicked: {}", e)))?
}

fn extract_metadata_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, Pdf2TableError> {
    let pdfium = bind_pdfium()?;
    let document = load_document(&pdfium, pdf_path, password)?;

    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata
            .get(tag)
            .map(|t| t.value().trim().to_string())
            .filter(|v| !v.is_empty())
    };

    Ok(DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
        page_count: document.pages().len() as usize,
        pdf_version: format!("{:?}", document.version()),
    })
}

/// Bind pdfium: `PDFIUM_LIB_PATH`, then the working directory, then the
/// system library.
fn bind_pdfium() -> Result<Pdfium, Pdf2TableError> {
    let mut attempts = Vec::new();

    for candidate in library_candidates() {
        match Pdfium::bind_to_library(&candidate) {
            Ok(bindings) => {
                debug!("Bound pdfium from {}", candidate.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => attempts.push(format!("{}: {:?}", candidate.display(), e)),
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => {
            debug!("Bound system pdfium library");
            Ok(Pdfium::new(bindings))
        }
        Err(e) => {
            attempts.push(format!("system library: {:?}", e));
            Err(Pdf2TableError::PdfiumBindingFailed(attempts.join("; ")))
        }
    }
}

fn library_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Ok(value) = std::env::var(PDFIUM_LIB_PATH_ENV) {
        let path = PathBuf::from(value);
        if path.is_dir() {
            candidates.push(Pdfium::pdfium_platform_library_name_at_path(&path));
        } else if !path.as_os_str().is_empty() {
            candidates.push(path);
        }
    }
    candidates.push(Pdfium::pdfium_platform_library_name_at_path("./"));
    candidates
}

/// Open `pdf_path`, telling apart a missing password, a wrong one and a
/// broken file.
fn load_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, Pdf2TableError> {
    pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.to_ascii_lowercase().contains("password") {
            if password.is_some() {
                Pdf2TableError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                Pdf2TableError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            Pdf2TableError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}
