use anyhow::Context;
use image::RgbaImage;

use crate::foundation::error::{KarmaError, KarmaResult};

// Avoid pathological allocations from hostile or broken media.
const MAX_DIM: u32 = 16_384;

/// Decode an encoded image (format sniffed from the bytes) into straight-alpha RGBA8.
pub fn decode_image(bytes: &[u8]) -> KarmaResult<RgbaImage> {
    if bytes.is_empty() {
        return Err(KarmaError::render("empty image payload"));
    }
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let (width, height) = (dyn_img.width(), dyn_img.height());
    if width == 0 || height == 0 || width > MAX_DIM || height > MAX_DIM {
        return Err(KarmaError::render(format!(
            "image size unsupported: {width}x{height} (max {MAX_DIM}x{MAX_DIM})"
        )));
    }
    Ok(dyn_img.to_rgba8())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn decode_png_dimensions_and_pixels() {
        let img = RgbaImage::from_raw(2, 1, vec![100, 50, 200, 128, 1, 2, 3, 255]).unwrap();
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();

        let decoded = decode_image(&buf).unwrap();
        assert_eq!(decoded.dimensions(), (2, 1));
        assert_eq!(decoded.get_pixel(0, 0).0, [100, 50, 200, 128]);
    }

    #[test]
    fn decode_rejects_non_image_payloads() {
        assert!(decode_image(b"").is_err());
        assert!(decode_image(b"<html><body>not found</body></html>").is_err());
    }
}
