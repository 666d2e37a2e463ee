//! QR rendering for the pairing token.

use {base64::Engine, image::Luma, qrcode::QrCode};

/// Render a pairing token as a PNG data URL suitable for an `<img>` tag.
pub fn qr_data_url(token: &str) -> anyhow::Result<String> {
    let code = QrCode::new(token.as_bytes())?;
    let image = code
        .render::<Luma<u8>>()
        .min_dimensions(256, 256)
        .build();

    let mut png = Vec::new();
    image.write_to(
        &mut std::io::Cursor::new(&mut png),
        image::ImageFormat::Png,
    )?;

    Ok(format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_a_png_data_url() {
        let url = qr_data_url("1@abcdef,ghijkl,mnopqr").unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        assert!(url.len() > 100);
    }

    #[test]
    fn same_token_renders_identically() {
        assert_eq!(qr_data_url("T1").unwrap(), qr_data_url("T1").unwrap());
    }
}
