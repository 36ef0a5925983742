//! Image decoding and encoding for the OCR stage.
//!
//! Scans arrive in whatever format the user saved them in (WebP, 16-bit
//! TIFF, palette GIF). Both OCR backends want something simpler: Tesseract
//! reads PNG reliably, and vision APIs accept base64 PNG data inside the
//! JSON request body. Everything goes through [`load_scan`] first, which
//! also caps the long edge so phone photos do not blow the request size.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::{imageops::FilterType, DynamicImage};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Longest edge kept when loading a scan. Larger images are downscaled.
pub const MAX_EDGE_PX: u32 = 3000;

/// Decode an image file of any supported format, downscaling if needed.
pub fn load_scan(path: &Path) -> Result<DynamicImage, image::ImageError> {
    let img = image::ImageReader::open(path)?.with_guessed_format()?.decode()?;
    let (w, h) = (img.width(), img.height());
    if w.max(h) > MAX_EDGE_PX {
        debug!("Downscaling {} from {}x{}", path.display(), w, h);
        Ok(img.resize(MAX_EDGE_PX, MAX_EDGE_PX, FilterType::Lanczos3))
    } else {
        Ok(img)
    }
}

/// PNG-encode an image.
pub fn to_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Encode an image as a base64 PNG ready for a vision API.
///
/// ## Why PNG?
/// Lossless compression preserves text crispness. JPEG artefacts on
/// photographed slides confuse vision models.
///
/// ## Why `detail: "high"`?
/// Without it, OpenAI-style tiling shrinks the image to a single 512 px
/// overview tile and small handwriting is lost.
pub fn encode_for_vision(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let b64 = STANDARD.encode(to_png(img)?);
    debug!("Encoded image → {} bytes base64", b64.len());
    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}
