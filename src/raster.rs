//! Image watermarking
//!
//! Decoding is a separate fallible step so a corrupt image fails its own file
//! before any drawing starts. Text is rasterized glyph by glyph with
//! `ab_glyph` and composited source-over onto the decoded pixels.

use std::io::Cursor;

use ab_glyph::{Font, GlyphId, ScaleFont};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use crate::error::{Error, Result};
use crate::files::FileKind;
use crate::font::WatermarkFont;
use crate::layout::{image_base_font_size, DrawInstruction, PageSize, PlacementPolicy};
use crate::watermark::WatermarkSpec;

/// Quality used when re-encoding JPEGs
pub const JPEG_QUALITY: u8 = 92;

/// Decode image bytes; the format is sniffed from the content
pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    Ok(image::load_from_memory(bytes)?)
}

/// Encode an image in the format implied by the file kind
pub fn encode(image: &RgbaImage, kind: FileKind) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    match kind {
        FileKind::Png => {
            DynamicImage::ImageRgba8(image.clone())
                .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        }
        FileKind::Jpeg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgba8(image.clone()).into_rgb8();
            let encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
            DynamicImage::ImageRgb8(rgb).write_with_encoder(encoder)?;
        }
        other => {
            return Err(Error::UnsupportedFile(format!(
                "{:?} is not an image format",
                other
            )))
        }
    }
    Ok(buf)
}

/// Draw every instruction onto `canvas`.
///
/// Instructions use bottom-left origin coordinates and are flipped into
/// raster space here.
pub fn draw_instructions(
    canvas: &mut RgbaImage,
    instructions: &[DrawInstruction],
    spec: &WatermarkSpec,
    font: &WatermarkFont,
) {
    let height = canvas.height() as f32;
    for inst in instructions {
        draw_text_centered(canvas, &inst.flipped(height), spec, font);
    }
}

/// Render `spec.text` centered on (x, y) in raster coordinates
fn draw_text_centered(
    canvas: &mut RgbaImage,
    inst: &DrawInstruction,
    spec: &WatermarkSpec,
    font: &WatermarkFont,
) {
    let ab = font.inner();
    let scale = font.px_scale(inst.font_size);
    let scaled = ab.as_scaled(scale);

    let width = font.text_width(&spec.text, inst.font_size);
    // Middle baseline: halfway between ascent and descent
    let baseline_y = inst.y + (scaled.ascent() + scaled.descent()) / 2.0;
    let mut cursor_x = inst.x - width / 2.0;

    let alpha = spec.opacity.clamp(0.0, 1.0);
    let (cw, ch) = (canvas.width() as i32, canvas.height() as i32);
    let mut prev: Option<GlyphId> = None;

    for c in spec.text.chars() {
        let id = scaled.glyph_id(c);
        if let Some(p) = prev {
            cursor_x += scaled.kern(p, id);
        }

        let glyph = id.with_scale_and_position(scale, ab_glyph::point(cursor_x, baseline_y));
        if let Some(outlined) = ab.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            outlined.draw(|px, py, coverage| {
                let x = px as i32 + bounds.min.x as i32;
                let y = py as i32 + bounds.min.y as i32;
                if x < 0 || y < 0 || x >= cw || y >= ch {
                    return;
                }
                let a = (coverage * alpha * 255.0).round().clamp(0.0, 255.0) as u8;
                if a == 0 {
                    return;
                }
                let top = Rgba([spec.color.r, spec.color.g, spec.color.b, a]);
                let pixel = canvas.get_pixel_mut(x as u32, y as u32);
                *pixel = blend_pixels(*pixel, top);
            });
        }

        cursor_x += scaled.h_advance(id);
        prev = Some(id);
    }
}

/// Source-over alpha compositing of `top` onto `bottom`
fn blend_pixels(bottom: Rgba<u8>, top: Rgba<u8>) -> Rgba<u8> {
    let top_alpha = top[3] as f32 / 255.0;
    let bottom_alpha = bottom[3] as f32 / 255.0;

    let out_alpha = top_alpha + bottom_alpha * (1.0 - top_alpha);
    if out_alpha < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }

    let blend = |t: u8, b: u8| -> u8 {
        let t = t as f32 / 255.0;
        let b = b as f32 / 255.0;
        let result = (t * top_alpha + b * bottom_alpha * (1.0 - top_alpha)) / out_alpha;
        (result * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        blend(top[0], bottom[0]),
        blend(top[1], bottom[1]),
        blend(top[2], bottom[2]),
        (out_alpha * 255.0).round() as u8,
    ])
}

/// Decode, watermark and re-encode one image file.
///
/// A font that covers the text is required; without one the file fails.
pub fn watermark_image(
    bytes: &[u8],
    kind: FileKind,
    spec: &WatermarkSpec,
    font: Option<&WatermarkFont>,
    policy: &PlacementPolicy,
) -> Result<Vec<u8>> {
    let decoded = decode(bytes)?;
    let font = font.ok_or_else(|| {
        Error::Font("no font available to draw text on images (use --font)".to_string())
    })?;
    if !font.covers(&spec.text) {
        return Err(Error::Font(format!(
            "cannot draw '{}' on images: font {} has no glyphs for some characters",
            spec.text,
            font.name()
        )));
    }

    let mut canvas = decoded.into_rgba8();
    let (w, h) = canvas.dimensions();
    let base = spec.font_size.unwrap_or_else(|| image_base_font_size(w));
    let instructions = policy.instructions(PageSize::new(w as f32, h as f32), spec.position, base);
    tracing::debug!(width = w, height = h, draws = instructions.len(), "watermarking image");

    draw_instructions(&mut canvas, &instructions, spec, font);
    encode(&canvas, kind)
}
