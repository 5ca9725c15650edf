//! Image encoding: chunk `DynamicImage` → base64 PNG wrapped in `ImageData`.
//!
//! PNG over JPEG: compression artefacts around thin table rules and small
//! digits measurably hurt cell accuracy, and strips are small enough that
//! the size difference does not matter.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a chunk strip as a base64 PNG ready for the VLM API.
///
/// `detail: "high"` keeps the provider from downscaling the strip to a single
/// low-resolution tile.
pub fn encode_chunk(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!(
        "Encoded {}x{} chunk → {} bytes base64",
        img.width(),
        img.height(),
        b64.len()
    );

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_strip() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(40, 8, Rgba([0, 0, 255, 255])));
        let data = encode_chunk(&img).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(&decoded[1..4], b"PNG");
    }
}
