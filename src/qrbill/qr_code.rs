//! QR code image of a slip payload.

use qrcode::render::svg;
use qrcode::{EcLevel, QrCode};

/// Render `payload` as an SVG QR code with error correction level M.
///
/// The image has no quiet zone; the slip layout keeps the surrounding
/// margin free. The Swiss cross is drawn separately on top.
pub fn render_svg(payload: &str) -> Result<String, qrcode::types::QrError> {
    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::M)?;
    Ok(code
        .render::<svg::Color<'_>>()
        .quiet_zone(false)
        .min_dimensions(400, 400)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build())
}
