//! Label overlay for downloaded artifacts.
//!
//! Draws a `name | date` label near the top of the image: white text on a
//! rounded translucent black box, centered horizontally. Font size scales
//! with image width (floor 24 px). Font lookup tries the configured path,
//! then common system fonts; with no font at all the overlay is skipped with
//! a warning rather than failing the generation attempt.

use ab_glyph::{point, Font, FontVec, Glyph, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const BOX_PADDING: i64 = 12;
const BOX_RADIUS: i64 = 8;
const BOX_COLOR: Rgba<u8> = Rgba([0, 0, 0, 180]);
const TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Fallback font locations when no preferred font is configured or loadable.
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/nanum/NanumGothic.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/Library/Fonts/AppleGothic.ttf",
    "C:/Windows/Fonts/malgun.ttf",
];

/// The downloaded artifact could not be read back or rewritten.
#[derive(Debug, Error)]
#[error("image: {0}")]
pub struct OverlayError(#[from] image::ImageError);

/// Overlay `"{name} | {date}"` onto the image at `path`, in place.
pub fn draw_label(
    path: &Path,
    name: &str,
    date: &str,
    preferred_font: Option<&Path>,
) -> Result<(), OverlayError> {
    let Some(font) = load_font(preferred_font) else {
        tracing::warn!(image = %path.display(), "no usable label font found; overlay skipped");
        return Ok(());
    };

    let mut img = image::open(path)?.to_rgba8();
    let label = format!("{name} | {date}");
    let font_size = (img.width() / 40).max(24);
    let scale = PxScale::from(font_size as f32);

    let (text_w, text_h) = measure(&font, scale, &label);
    let box_w = text_w + BOX_PADDING * 2;
    let box_h = text_h + BOX_PADDING * 2;
    let box_x = (i64::from(img.width()) - text_w) / 2 - BOX_PADDING;
    let box_y = BOX_PADDING;

    fill_rounded_rect(&mut img, box_x, box_y, box_w, box_h, BOX_RADIUS, BOX_COLOR);
    draw_text(
        &mut img,
        &font,
        scale,
        box_x + BOX_PADDING,
        box_y + BOX_PADDING,
        &label,
    );

    img.save(path)?;
    tracing::info!(image = %path.display(), %label, "label overlay applied");
    Ok(())
}

/// Load the preferred font if given, otherwise the first readable system
/// candidate. `None` means no font is available anywhere.
fn load_font(preferred: Option<&Path>) -> Option<FontVec> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(path) = preferred {
        candidates.push(path.to_path_buf());
    }
    candidates.extend(SYSTEM_FONT_CANDIDATES.iter().map(PathBuf::from));

    for candidate in candidates {
        let Ok(bytes) = fs::read(&candidate) else {
            continue;
        };
        match FontVec::try_from_vec(bytes) {
            Ok(font) => return Some(font),
            Err(err) => {
                tracing::warn!(font = %candidate.display(), error = %err, "unusable font file");
            }
        }
    }
    None
}

/// Measured bounding box (width, height) of the label at the given scale.
fn measure(font: &FontVec, scale: PxScale, text: &str) -> (i64, i64) {
    let scaled = font.as_scaled(scale);
    let mut width = 0.0f32;
    let mut prev = None;
    for ch in text.chars() {
        let id = scaled.glyph_id(ch);
        if let Some(prev_id) = prev {
            width += scaled.kern(prev_id, id);
        }
        width += scaled.h_advance(id);
        prev = Some(id);
    }
    (width.ceil() as i64, scaled.height().ceil() as i64)
}

fn draw_text(img: &mut RgbaImage, font: &FontVec, scale: PxScale, x: i64, y: i64, text: &str) {
    let scaled = font.as_scaled(scale);
    let baseline = y as f32 + scaled.ascent();
    let mut caret = x as f32;
    let mut prev = None;

    for ch in text.chars() {
        let id = scaled.glyph_id(ch);
        if let Some(prev_id) = prev {
            caret += scaled.kern(prev_id, id);
        }
        let glyph: Glyph = id.with_scale_and_position(scale, point(caret, baseline));
        caret += scaled.h_advance(id);
        prev = Some(id);

        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let px = bounds.min.x as i64 + i64::from(gx);
                let py = bounds.min.y as i64 + i64::from(gy);
                blend_pixel(img, px, py, TEXT_COLOR, coverage);
            });
        }
    }
}

/// Fill a rounded rectangle by per-pixel corner distance, alpha-blending
/// into the image.
fn fill_rounded_rect(
    img: &mut RgbaImage,
    x: i64,
    y: i64,
    w: i64,
    h: i64,
    radius: i64,
    color: Rgba<u8>,
) {
    for dy in 0..h {
        for dx in 0..w {
            if !inside_rounded(dx, dy, w, h, radius) {
                continue;
            }
            blend_pixel(img, x + dx, y + dy, color, 1.0);
        }
    }
}

fn inside_rounded(dx: i64, dy: i64, w: i64, h: i64, radius: i64) -> bool {
    let cx = if dx < radius {
        Some(radius - 1 - dx)
    } else if dx >= w - radius {
        Some(dx - (w - radius))
    } else {
        None
    };
    let cy = if dy < radius {
        Some(radius - 1 - dy)
    } else if dy >= h - radius {
        Some(dy - (h - radius))
    } else {
        None
    };
    match (cx, cy) {
        (Some(cx), Some(cy)) => cx * cx + cy * cy <= radius * radius,
        _ => true,
    }
}

/// Source-over blend of `color` at `coverage` opacity onto one pixel,
/// ignoring out-of-bounds coordinates.
fn blend_pixel(img: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>, coverage: f32) {
    if x < 0 || y < 0 || x >= i64::from(img.width()) || y >= i64::from(img.height()) {
        return;
    }
    let alpha = f32::from(color[3]) / 255.0 * coverage.clamp(0.0, 1.0);
    if alpha <= 0.0 {
        return;
    }
    let pixel = img.get_pixel_mut(x as u32, y as u32);
    let src = [color[0], color[1], color[2]];
    for (dst, channel) in pixel.0.iter_mut().zip(src) {
        *dst = (f32::from(channel) * alpha + f32::from(*dst) * (1.0 - alpha)).round() as u8;
    }
    pixel[3] = pixel[3].max((alpha * 255.0).round() as u8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounded_rect_excludes_corner_pixels() {
        // Top-left pixel of a rounded box is outside the radius-8 arc.
        assert!(!inside_rounded(0, 0, 100, 40, 8));
        // Center is always inside.
        assert!(inside_rounded(50, 20, 100, 40, 8));
        // Edge midpoints are inside.
        assert!(inside_rounded(50, 0, 100, 40, 8));
        assert!(inside_rounded(0, 20, 100, 40, 8));
    }

    #[test]
    fn blend_ignores_out_of_bounds_pixels() {
        let mut img = RgbaImage::new(4, 4);
        blend_pixel(&mut img, -1, 0, TEXT_COLOR, 1.0);
        blend_pixel(&mut img, 0, 10, TEXT_COLOR, 1.0);
        blend_pixel(&mut img, 2, 2, TEXT_COLOR, 1.0);
        assert_eq!(img.get_pixel(2, 2)[0], 255);
        assert_eq!(img.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn full_coverage_blend_replaces_opaque_color() {
        let mut img = RgbaImage::new(2, 2);
        blend_pixel(&mut img, 0, 0, Rgba([0, 0, 0, 180]), 1.0);
        let px = img.get_pixel(0, 0);
        // 180/255 alpha over black stays black, with alpha recorded.
        assert_eq!(px[0], 0);
        assert_eq!(px[3], 180);
    }

    #[test]
    fn font_size_floor_is_applied() {
        // Mirrors the sizing rule in draw_label.
        let narrow = (300u32 / 40).max(24);
        let wide = (2000u32 / 40).max(24);
        assert_eq!(narrow, 24);
        assert_eq!(wide, 50);
    }
}
