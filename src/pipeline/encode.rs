//! Image encoding: `DynamicImage` → PNG bytes, and PNG → base64 `ImageData`.
//!
//! PNG is lossless; JPEG artefacts around glyphs and math symbols hurt VLM
//! transcription far more than the extra upload size. The same PNG bytes are
//! written to `<stem>_figures/page_N.png` and sent to the model.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page as PNG.
pub fn png_bytes(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Wrap PNG bytes as a base64 image attachment for the VLM API.
///
/// `detail: "high"` lets GPT-4-class models tile the full page; the
/// low-detail overview tile loses subscripts and table rules.
pub fn to_image_data(png: &[u8]) -> ImageData {
    let b64 = STANDARD.encode(png);
    debug!("Encoded image → {} bytes base64", b64.len());
    ImageData::new(b64, "image/png").with_detail("high")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn png_has_signature() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255])));
        let png = png_bytes(&img).expect("encode should succeed");
        assert_eq!(&png[..4], b"\x89PNG");
    }

    #[test]
    fn image_data_round_trips_base64() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let png = png_bytes(&img).unwrap();
        let data = to_image_data(&png);
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(decoded, png);
    }
}
