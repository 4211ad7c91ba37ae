//! QR rendering for session tokens.
//!
//! Pure output formatting: token string in, PNG bytes (or a data URI the
//! client can drop into an <img> tag) out.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, Luma};
use qrcode::QrCode;
use std::io::Cursor;

pub fn render_png(token: &str) -> Result<Vec<u8>> {
    let code = QrCode::new(token.as_bytes()).context("Failed to encode QR code")?;
    let img = code.render::<Luma<u8>>().min_dimensions(256, 256).build();

    let mut png = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .context("Failed to encode QR PNG")?;
    Ok(png)
}

pub fn data_uri(token: &str) -> Result<String> {
    let png = render_png(token)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_png_magic_bytes() {
        let png = render_png("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n']);
    }

    #[test]
    fn test_data_uri_prefix() {
        let uri = data_uri("some-token").unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));
        assert!(uri.len() > 100);
    }
}
