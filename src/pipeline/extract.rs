//! Text-layer extraction: per-page text and info-dictionary metadata.
//!
//! Research papers produced by LaTeX or Word carry a full text layer, so the
//! `plain` and `structured` engines never rasterise anything. pdfium returns
//! each page's characters in content-stream order with line breaks between
//! text lines, which is what the structuring heuristics expect.
//!
//! pdfium is not async-safe; both entry points hop onto the blocking pool.

use crate::error::Paper2MdError;
use crate::output::DocumentMetadata;
use crate::pipeline::engine::{bind_pdfium, open_document};
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info, warn};

/// Extract the text of the selected pages (0-indexed).
///
/// # Returns
/// `(page_index_0based, text)` pairs in page order. Pages with no text
/// layer (scans, figures) yield an empty string rather than an error.
pub async fn extract_page_texts(
    pdf_path: &Path,
    password: Option<&str>,
    page_indices: &[usize],
) -> Result<Vec<(usize, String)>, Paper2MdError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());
    let indices = page_indices.to_vec();

    tokio::task::spawn_blocking(move || {
        extract_page_texts_blocking(&path, pwd.as_deref(), &indices)
    })
    .await
    .map_err(|e| Paper2MdError::Internal(format!("Text extraction task panicked: {}", e)))?
}

fn extract_page_texts_blocking(
    pdf_path: &Path,
    password: Option<&str>,
    page_indices: &[usize],
) -> Result<Vec<(usize, String)>, Paper2MdError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, pdf_path, password)?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

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

        let page = pages
            .get(idx as u16)
            .map_err(|e| Paper2MdError::TextExtractionFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?;

        let text = match page.text() {
            Ok(t) => t.all(),
            Err(e) => {
                warn!("Page {} has no readable text layer: {:?}", idx + 1, e);
                String::new()
            }
        };
        debug!("Extracted page {} → {} chars", idx + 1, text.len());

        results.push((idx, text));
    }

    Ok(results)
}

/// Extract document metadata from a PDF without reading page content.
pub async fn extract_metadata(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, Paper2MdError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || extract_metadata_blocking(&path, pwd.as_deref()))
        .await
        .map_err(|e| Paper2MdError::Internal(format!("Metadata task panicked: {}", e)))?
}

fn extract_metadata_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, Paper2MdError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, pdf_path, password)?;

    let metadata = document.metadata();
    let pages = document.pages();

    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().trim().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    Ok(DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
        page_count: pages.len() as usize,
        pdf_version: format!("{:?}", document.version()),
    })
}
