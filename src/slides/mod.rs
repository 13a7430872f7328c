//! Slide Producer (C6): per-section image acquisition, resize/letterbox into
//! 1920x1080 PNGs, fallback chain source_image_url -> slide_prompt -> placeholder
//! (spec §4.6).

pub mod image_llm;
pub mod pool;

pub use image_llm::{ImageModel, OpenRouterImageModel};
pub use pool::SlideProducer;

pub const MIN_WIDTH: u32 = 800;
pub const MIN_HEIGHT: u32 = 600;

use crate::error::{Result, VideoGenError};
use image::{imageops::FilterType, DynamicImage, GenericImageView, Rgba, RgbaImage};
use std::path::Path;

/// Fit `source` into `target_width` x `target_height`, preserving aspect ratio
/// and letterboxing with `background` (an `#RRGGBB` string, or black if unset).
pub fn fit_and_letterbox(
    source: &DynamicImage,
    target_width: u32,
    target_height: u32,
    background: Option<&str>,
) -> DynamicImage {
    let (src_w, src_h) = source.dimensions();
    let scale = (target_width as f64 / src_w as f64).min(target_height as f64 / src_h as f64);
    let new_w = (src_w as f64 * scale).round().max(1.0) as u32;
    let new_h = (src_h as f64 * scale).round().max(1.0) as u32;
    let resized = source.resize_exact(new_w, new_h, FilterType::Lanczos3);

    let bg = parse_hex_color(background).unwrap_or(Rgba([0, 0, 0, 255]));
    let mut canvas = RgbaImage::from_pixel(target_width, target_height, bg);
    let x_offset = (target_width.saturating_sub(new_w)) / 2;
    let y_offset = (target_height.saturating_sub(new_h)) / 2;
    image::imageops::overlay(&mut canvas, &resized.to_rgba8(), x_offset as i64, y_offset as i64);

    DynamicImage::ImageRgba8(canvas)
}

fn parse_hex_color(hex: Option<&str>) -> Option<Rgba<u8>> {
    let hex = hex?.trim_start_matches('#');
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Rgba([r, g, b, 255]))
}

/// A clearly-marked placeholder slide, used when both the download path and
/// the image-LLM path fail (spec §4.6, "otherwise use a clearly marked
/// placeholder and log an error").
pub fn write_placeholder_slide(output_path: &Path, width: u32, height: u32) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([40, 40, 40, 255]));
    // A diagonal stripe marks this unmistakably as a placeholder in review.
    let stripe = Rgba([200, 60, 60, 255]);
    for x in 0..width {
        let y = (x as u64 * height as u64 / width.max(1) as u64) as u32;
        for dy in 0..height.min(8) {
            if y + dy < height {
                canvas.put_pixel(x, y + dy, stripe);
            }
        }
    }
    DynamicImage::ImageRgba8(canvas)
        .save(output_path)
        .map_err(|e| VideoGenError::SlideGeneration(format!("failed to write placeholder: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[test]
    fn letterboxes_wide_image_into_square_canvas_with_vertical_bars() {
        let src = DynamicImage::ImageRgba8(RgbaImage::from_pixel(400, 100, Rgba([255, 0, 0, 255])));
        let fitted = fit_and_letterbox(&src, 200, 200, None);
        assert_eq!(fitted.dimensions(), (200, 200));
        // corner pixel should be the black letterbox background, not content.
        assert_eq!(fitted.to_rgba8().get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn custom_background_color_is_honored() {
        let src = DynamicImage::ImageRgba8(RgbaImage::from_pixel(400, 100, Rgba([255, 0, 0, 255])));
        let fitted = fit_and_letterbox(&src, 200, 200, Some("#0000FF"));
        assert_eq!(fitted.to_rgba8().get_pixel(0, 0), &Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn placeholder_slide_is_written_at_requested_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slide_0000.png");
        write_placeholder_slide(&path, 1920, 1080).unwrap();
        let img = image::open(&path).unwrap();
        assert_eq!(img.dimensions(), (1920, 1080));
    }
}
