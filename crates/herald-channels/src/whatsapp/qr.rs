//! QR code rendering for the login flow.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use herald_core::error::HeraldError;

/// Generate a QR code as PNG image bytes.
pub fn generate_qr_image(qr_data: &str) -> Result<Vec<u8>, HeraldError> {
    use image::{ImageBuffer, Luma};
    use qrcode::QrCode;

    let code = QrCode::new(qr_data.as_bytes())
        .map_err(|e| HeraldError::Channel(format!("QR generation failed: {e}")))?;

    let module_size: u32 = 10;
    let quiet_zone: u32 = 2;
    let modules = code.width() as u32;
    let img_size = (modules + quiet_zone * 2) * module_size;

    let img = ImageBuffer::from_fn(img_size, img_size, |x, y| {
        let mx = (x / module_size).saturating_sub(quiet_zone);
        let my = (y / module_size).saturating_sub(quiet_zone);

        if x / module_size < quiet_zone
            || y / module_size < quiet_zone
            || mx >= modules
            || my >= modules
        {
            Luma([255u8]) // White border
        } else {
            use qrcode::Color;
            match code[(mx as usize, my as usize)] {
                Color::Dark => Luma([0u8]),
                Color::Light => Luma([255u8]),
            }
        }
    });

    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .map_err(|e| HeraldError::Channel(format!("PNG encoding failed: {e}")))?;

    Ok(buf.into_inner())
}

/// Render the QR payload to a base64 PNG data URL, the form the session
/// record stores and the HTTP surface returns.
pub fn qr_data_url(qr_data: &str) -> Result<String, HeraldError> {
    let png = generate_qr_image(qr_data)?;
    Ok(format!("data:image/png;base64,{}", BASE64.encode(png)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_qr_image() {
        let result = generate_qr_image("test-data");
        assert!(result.is_ok());
        let png = result.unwrap();
        // PNG magic bytes.
        assert_eq!(&png[..4], &[0x89, 0x50, 0x4E, 0x47]);
    }

    #[test]
    fn test_qr_data_url_prefix() {
        let url = qr_data_url("test-data").unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        assert!(url.len() > 30);
    }
}
