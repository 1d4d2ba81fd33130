//! PDF rasterisation for the vision engine: selected pages → `DynamicImage`.
//!
//! Runs on the blocking pool; pdfium keeps thread-local state and must not
//! be driven from a Tokio worker thread.
//!
//! Pages render at the configured DPI (200 by default, enough for a VLM to
//! read 8-pt footnotes) and the longest edge is then capped at
//! `max_rendered_pixels` so poster-sized pages stay within memory and
//! upload limits.

use crate::config::ConversionConfig;
use crate::error::Paper2MdError;
use crate::pipeline::engine::{bind_pdfium, open_document};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info, warn};

const POINTS_PER_INCH: f32 = 72.0;

/// Rasterise selected pages of a PDF into images.
///
/// # Returns
/// A vector of `(page_index_0based, DynamicImage)` tuples.
pub async fn render_pages(
    pdf_path: &Path,
    config: &ConversionConfig,
    page_indices: &[usize],
) -> Result<Vec<(usize, DynamicImage)>, Paper2MdError> {
    let path = pdf_path.to_path_buf();
    let dpi = config.dpi;
    let max_pixels = config.max_rendered_pixels;
    let password = config.password.clone();
    let indices = page_indices.to_vec();

    tokio::task::spawn_blocking(move || {
        render_pages_blocking(&path, dpi, max_pixels, password.as_deref(), &indices)
    })
    .await
    .map_err(|e| Paper2MdError::Internal(format!("Render task panicked: {}", e)))?
}

fn render_pages_blocking(
    pdf_path: &Path,
    dpi: u32,
    max_pixels: u32,
    password: Option<&str>,
    page_indices: &[usize],
) -> Result<Vec<(usize, DynamicImage)>, Paper2MdError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, pdf_path, password)?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded for rendering: {} pages", total_pages);

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
            .map_err(|e| Paper2MdError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?;

        let (width, height) =
            target_dimensions(page.width().value, page.height().value, dpi, max_pixels);
        let render_config = PdfRenderConfig::new()
            .set_target_width(width as i32)
            .set_maximum_height(height as i32);

        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            Paper2MdError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            }
        })?;

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

/// Pixel size for a page of `width_pts` × `height_pts` at `dpi`, with the
/// longest edge capped at `max_pixels`. Aspect ratio is preserved and both
/// edges are at least 1 px.
fn target_dimensions(width_pts: f32, height_pts: f32, dpi: u32, max_pixels: u32) -> (u32, u32) {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let raw_w = (width_pts * scale).max(1.0);
    let raw_h = (height_pts * scale).max(1.0);

    let longest = raw_w.max(raw_h);
    let ratio = if longest > max_pixels as f32 {
        max_pixels as f32 / longest
    } else {
        1.0
    };

    (
        ((raw_w * ratio) as u32).max(1),
        ((raw_h * ratio) as u32).max(1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_page_at_200_dpi_is_capped() {
        // 8.5 × 11 in → 1700 × 2200 px, capped to 2000 on the long edge.
        let (w, h) = target_dimensions(612.0, 792.0, 200, 2000);
        assert_eq!(h, 2000);
        assert!((1544..=1546).contains(&w), "width {w}");
    }

    #[test]
    fn small_page_is_not_upscaled_beyond_dpi() {
        let (w, h) = target_dimensions(144.0, 72.0, 72, 2000);
        assert_eq!((w, h), (144, 72));
    }

    #[test]
    fn degenerate_page_has_one_pixel_minimum() {
        let (w, h) = target_dimensions(0.0, 0.0, 200, 2000);
        assert_eq!((w, h), (1, 1));
    }
}
