//! Renders the result preview shown after processing.
//!
//! Nothing here touches the video itself; the overlays only exist in the
//! preview image.

use crate::geometry::Area;
use crate::watermark::WatermarkConfig;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};

/// Blur strength of the placeholder used when no inpainted frame exists.
pub const FALLBACK_BLUR_SIGMA: f32 = 12.0;

/// Pixel rectangle `(x, y, width, height)` of `area` on the frame, never
/// empty and never outside it.
fn pixel_rect(area: &Area, width: u32, height: u32) -> (u32, u32, u32, u32) {
    let (x, y, w, h) = area.to_pixels(width, height);
    let x = (x.max(0.0).round() as u32).min(width.saturating_sub(1));
    let y = (y.max(0.0).round() as u32).min(height.saturating_sub(1));
    let w = (w.round() as u32).clamp(1, width - x);
    let h = (h.round() as u32).clamp(1, height - y);
    (x, y, w, h)
}

/// Remove-mode preview.
///
/// With an inpainted frame, only the selected area is taken from it (scaled
/// to the source frame). Without one the area is blurred instead.
pub fn render_removal(frame: &DynamicImage, area: &Area, processed: Option<&DynamicImage>) -> DynamicImage {
    let mut canvas = frame.to_rgba8();
    let (width, height) = canvas.dimensions();
    if width == 0 || height == 0 {
        return DynamicImage::ImageRgba8(canvas);
    }
    let (x, y, w, h) = pixel_rect(area, width, height);

    let patch: RgbaImage = match processed {
        Some(clean) => {
            let scaled = if clean.dimensions() == (width, height) {
                clean.to_rgba8()
            } else {
                clean.resize_exact(width, height, FilterType::Triangle).to_rgba8()
            };
            imageops::crop_imm(&scaled, x, y, w, h).to_image()
        }
        None => {
            let region = imageops::crop_imm(&canvas, x, y, w, h).to_image();
            imageops::blur(&region, FALLBACK_BLUR_SIGMA)
        }
    };

    imageops::replace(&mut canvas, &patch, i64::from(x), i64::from(y));
    DynamicImage::ImageRgba8(canvas)
}

/// Add-mode preview: stamps `mark` onto the frame per `config`.
pub fn render_watermark(frame: &DynamicImage, config: &WatermarkConfig, mark: &DynamicImage) -> DynamicImage {
    let mut canvas = frame.to_rgba8();
    let (fw, fh) = canvas.dimensions();
    let (x, y, w, h) = config.placement(fw, fh, mark.width(), mark.height());
    let scaled = mark.resize_exact(w, h, FilterType::Triangle).to_rgba8();
    let opacity = config.opacity() as f32;

    for (px, py, pixel) in scaled.enumerate_pixels() {
        let (cx, cy) = (x + px, y + py);
        if cx >= fw || cy >= fh {
            continue;
        }
        let alpha = f32::from(pixel[3]) / 255.0 * opacity;
        let base = canvas.get_pixel(cx, cy);
        let blend = |top: u8, bottom: u8| -> u8 {
            (f32::from(top) * alpha + f32::from(bottom) * (1.0 - alpha)).round() as u8
        };
        let mixed = Rgba([
            blend(pixel[0], base[0]),
            blend(pixel[1], base[1]),
            blend(pixel[2], base[2]),
            base[3],
        ]);
        canvas.put_pixel(cx, cy, mixed);
    }

    DynamicImage::ImageRgba8(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, c: [u8; 4]) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba(c)))
    }

    #[test]
    fn processed_frame_only_replaces_the_area() {
        let frame = solid(100, 100, [0, 0, 0, 255]);
        let clean = solid(50, 50, [200, 200, 200, 255]);
        let out = render_removal(&frame, &Area::new(10.0, 10.0, 20.0, 20.0), Some(&clean)).to_rgba8();
        assert_eq!(out.get_pixel(15, 15)[0], 200);
        assert_eq!(out.get_pixel(50, 50)[0], 0);
        assert_eq!(out.get_pixel(5, 5)[0], 0);
    }

    #[test]
    fn fallback_blurs_within_the_area() {
        let mut frame = RgbaImage::from_pixel(100, 100, Rgba([0, 0, 0, 255]));
        for y in 0..100 {
            for x in 50..100 {
                frame.put_pixel(x, y, Rgba([255, 255, 255, 255]));
            }
        }
        let frame = DynamicImage::ImageRgba8(frame);
        let out = render_removal(&frame, &Area::new(30.0, 30.0, 40.0, 40.0), None).to_rgba8();
        let edge = out.get_pixel(50, 50)[0];
        assert!(edge > 0 && edge < 255, "edge should be smeared, got {edge}");
        assert_eq!(out.get_pixel(10, 10)[0], 0);
        assert_eq!(out.get_pixel(90, 90)[0], 255);
    }

    #[test]
    fn watermark_is_blended_at_its_anchor() {
        let frame = solid(1000, 500, [0, 0, 0, 255]);
        let mark = solid(10, 10, [255, 255, 255, 255]);
        let mut config = WatermarkConfig::default();
        config.set_opacity(0.5);
        let out = render_watermark(&frame, &config, &mark).to_rgba8();
        // bottom-right: 200x200 at (780, 280)
        assert_eq!(out.get_pixel(880, 380)[0], 128);
        assert_eq!(out.get_pixel(100, 100)[0], 0);
    }

    #[test]
    fn area_at_the_corner_stays_on_the_frame() {
        let frame = solid(40, 30, [10, 20, 30, 255]);
        let out = render_removal(&frame, &Area::new(98.0, 98.0, 2.0, 2.0), None);
        assert_eq!(out.dimensions(), (40, 30));
    }
}
