//! Rasterize fitted captions onto a background bitmap.
//!
//! The background passed in is the catalog's shared copy and is never
//! mutated: compositing always draws on a fresh clone. Regions draw in
//! descriptor order, so overlapping regions resolve last-writer-wins.
//! Stroke is drawn first (glyph coverage replayed at eight compass offsets),
//! then the fill pass sits centered over it.

use image::{imageops::FilterType, Rgba as Pixel, RgbaImage};

use crate::{
    catalog::Overlay,
    error::MemeplateResult,
    font::{CaptionFont, FontStore},
    layout::LayoutResult,
    template::{Rgba, TextRegion},
};

/// Watermark drawn last, outside all regions, in the bottom-right corner.
#[derive(Clone, Debug)]
pub struct Watermark {
    pub text: String,
    pub font_family: String,
    pub font_size: f32,
    pub color: Rgba,
    pub margin: u32,
}

impl Watermark {
    pub fn new(text: impl Into<String>, font_family: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_family: font_family.into(),
            font_size: 14.0,
            color: Rgba::new(255, 255, 255, 160),
            margin: 6,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct CompositeOptions {
    pub watermark: Option<Watermark>,
}

/// Draw overlays, then every (region, layout) pair, onto a copy of
/// `background`.
///
/// `overlays` and `placements` must be in descriptor order; that order is
/// the draw order and is part of the visual contract. Captions always sit
/// on top of overlays.
pub fn composite(
    background: &RgbaImage,
    overlays: &[Overlay],
    placements: &[(&TextRegion, &LayoutResult)],
    fonts: &FontStore,
    options: &CompositeOptions,
) -> MemeplateResult<RgbaImage> {
    // Copy-before-write: the original bitmap is shared across requests.
    let mut canvas = background.clone();

    for overlay in overlays {
        draw_overlay(&mut canvas, overlay);
    }

    for (region, layout) in placements {
        let font = fonts.get(&region.font_family)?;
        draw_layout(&mut canvas, region, layout, font.as_ref());
    }

    if let Some(watermark) = &options.watermark {
        draw_watermark(&mut canvas, watermark, fonts)?;
    }

    Ok(canvas)
}

/// Alpha-composite one foreground image, resized so its width is
/// `placement.scale` of the canvas width (aspect preserved) and centered at
/// the placement's relative coordinates. Off-canvas parts are clipped.
fn draw_overlay(canvas: &mut RgbaImage, overlay: &Overlay) {
    let placement = &overlay.placement;
    let (canvas_w, canvas_h) = canvas.dimensions();

    let target_w = ((canvas_w as f32 * placement.scale).round() as u32).max(1);
    let ratio = target_w as f32 / overlay.image.width().max(1) as f32;
    let target_h = ((overlay.image.height() as f32 * ratio).round() as u32).max(1);
    let scaled = if (target_w, target_h) == overlay.image.dimensions() {
        overlay.image.clone()
    } else {
        image::imageops::resize(&overlay.image, target_w, target_h, FilterType::Lanczos3)
    };

    let left = (canvas_w as f32 * placement.center_x - target_w as f32 / 2.0).round() as i64;
    let top = (canvas_h as f32 * placement.center_y - target_h as f32 / 2.0).round() as i64;

    for (px, py, pixel) in scaled.enumerate_pixels() {
        if pixel[3] == 0 {
            continue;
        }
        let x = left + px as i64;
        let y = top + py as i64;
        if x < 0 || y < 0 || x >= canvas_w as i64 || y >= canvas_h as i64 {
            continue;
        }
        let dst = canvas.get_pixel_mut(x as u32, y as u32);
        *dst = blend(*dst, *pixel);
    }
}

fn draw_layout(
    canvas: &mut RgbaImage,
    region: &TextRegion,
    layout: &LayoutResult,
    font: &dyn CaptionFont,
) {
    // Overflowing layouts clip at the region's bottom edge; everything else
    // clips only at the image bounds.
    let clip_bottom = if layout.overflow {
        tracing::debug!(
            region_y = region.y,
            region_height = region.height,
            "layout overflows region; clipping at region bottom"
        );
        Some((region.y + region.height) as i32)
    } else {
        None
    };

    if region.stroke_width > 0 {
        let d = region.stroke_width as i32;
        let offsets = [
            (-d, 0),
            (d, 0),
            (0, -d),
            (0, d),
            (-d, -d),
            (-d, d),
            (d, -d),
            (d, d),
        ];
        for line in &layout.lines {
            let baseline = line.y + layout.ascent;
            for (dx, dy) in offsets {
                draw_line_pass(
                    canvas,
                    font,
                    &line.text,
                    layout.font_size,
                    line.x + dx as f32,
                    baseline + dy as f32,
                    region.stroke_color,
                    clip_bottom,
                );
            }
        }
    }

    for line in &layout.lines {
        let baseline = line.y + layout.ascent;
        draw_line_pass(
            canvas,
            font,
            &line.text,
            layout.font_size,
            line.x,
            baseline,
            region.color,
            clip_bottom,
        );
    }
}

fn draw_watermark(
    canvas: &mut RgbaImage,
    watermark: &Watermark,
    fonts: &FontStore,
) -> MemeplateResult<()> {
    if watermark.text.is_empty() {
        return Ok(());
    }
    let font = fonts.get(&watermark.font_family)?;
    let metrics = font.line_metrics(watermark.font_size);
    let width = font.line_width(&watermark.text, watermark.font_size);

    let x = canvas.width() as f32 - width - watermark.margin as f32;
    let y = canvas.height() as f32 - metrics.height - watermark.margin as f32;
    draw_line_pass(
        canvas,
        font.as_ref(),
        &watermark.text,
        watermark.font_size,
        x.max(0.0),
        (y + metrics.ascent).max(0.0),
        watermark.color,
        None,
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn draw_line_pass(
    canvas: &mut RgbaImage,
    font: &dyn CaptionFont,
    text: &str,
    size: f32,
    origin_x: f32,
    baseline_y: f32,
    color: Rgba,
    clip_bottom: Option<i32>,
) {
    let (width, height) = canvas.dimensions();
    font.for_each_coverage(text, size, origin_x, baseline_y, &mut |x, y, coverage| {
        if coverage <= 0.0 {
            return;
        }
        if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
            return;
        }
        if let Some(bottom) = clip_bottom {
            if y >= bottom {
                return;
            }
        }
        let alpha = (coverage.clamp(0.0, 1.0) * color.a as f32).round() as u8;
        if alpha == 0 {
            return;
        }
        let top = Pixel([color.r, color.g, color.b, alpha]);
        let dst = canvas.get_pixel_mut(x as u32, y as u32);
        *dst = blend(*dst, top);
    });
}

/// Straight-alpha source-over blend, keeping anti-aliased edges smooth.
fn blend(bottom: Pixel<u8>, top: Pixel<u8>) -> Pixel<u8> {
    let ta = top[3] as f32 / 255.0;
    let ba = bottom[3] as f32 / 255.0;
    let out_a = ta + ba * (1.0 - ta);
    if out_a < 0.001 {
        return Pixel([0, 0, 0, 0]);
    }

    let channel = |t: u8, b: u8| -> u8 {
        let t = t as f32 / 255.0;
        let b = b as f32 / 255.0;
        (((t * ta + b * ba * (1.0 - ta)) / out_a) * 255.0).round() as u8
    };

    Pixel([
        channel(top[0], bottom[0]),
        channel(top[1], bottom[1]),
        channel(top[2], bottom[2]),
        (out_a * 255.0).round() as u8,
    ])
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::font::testing::MonoTestFont;
    use crate::layout::fit;
    use crate::template::{basic_region, HAlign, OverlaySpec, VAlign};

    fn mono_store() -> FontStore {
        let store = FontStore::new();
        store.insert("impact", Arc::new(MonoTestFont));
        store
    }

    fn flat_background(w: u32, h: u32, px: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Pixel(px))
    }

    fn fitted(region: &TextRegion, text: &str) -> LayoutResult {
        fit(region, text, &MonoTestFont)
    }

    #[test]
    fn composite_does_not_mutate_background() {
        let background = flat_background(100, 100, [0, 0, 0, 255]);
        let mut region = basic_region(0, 0, 100, 50);
        region.stroke_width = 0;
        let layout = fitted(&region, "hi");

        let out = composite(&background, &[], &[(&region, &layout)], &mono_store(), &CompositeOptions::default())
            .unwrap();

        assert!(background.pixels().all(|p| *p == Pixel([0, 0, 0, 255])));
        assert!(out.pixels().any(|p| *p == Pixel([255, 255, 255, 255])));
    }

    #[test]
    fn fill_lands_inside_region() {
        let background = flat_background(200, 200, [0, 0, 0, 255]);
        let mut region = basic_region(50, 50, 100, 60);
        region.stroke_width = 0;
        region.align = HAlign::Left;
        region.valign = VAlign::Top;
        let layout = fitted(&region, "ab");

        let out = composite(&background, &[], &[(&region, &layout)], &mono_store(), &CompositeOptions::default())
            .unwrap();

        for (x, y, p) in out.enumerate_pixels() {
            if *p != Pixel([0, 0, 0, 255]) {
                assert!(x >= 50 && x < 150, "stray pixel at {x},{y}");
                assert!(y >= 50 && y < 110, "stray pixel at {x},{y}");
            }
        }
    }

    #[test]
    fn stroke_surrounds_fill() {
        let background = flat_background(200, 100, [10, 10, 10, 255]);
        let mut region = basic_region(0, 0, 200, 100);
        region.stroke_width = 2;
        region.color = Rgba::white();
        region.stroke_color = Rgba::new(255, 0, 0, 255);
        let layout = fitted(&region, "x");

        let out = composite(&background, &[], &[(&region, &layout)], &mono_store(), &CompositeOptions::default())
            .unwrap();

        let has_fill = out.pixels().any(|p| *p == Pixel([255, 255, 255, 255]));
        let has_stroke = out.pixels().any(|p| *p == Pixel([255, 0, 0, 255]));
        assert!(has_fill);
        assert!(has_stroke, "stroke offsets should peek out around the fill");
    }

    #[test]
    fn later_region_draws_over_earlier() {
        let background = flat_background(100, 100, [0, 0, 0, 255]);

        let mut first = basic_region(0, 0, 100, 100);
        first.stroke_width = 0;
        first.color = Rgba::new(255, 0, 0, 255);
        let mut second = first.clone();
        second.color = Rgba::new(0, 0, 255, 255);

        let layout_a = fitted(&first, "mm");
        let layout_b = fitted(&second, "mm");

        let out = composite(
            &background,
            &[],
            &[(&first, &layout_a), (&second, &layout_b)],
            &mono_store(),
            &CompositeOptions::default(),
        )
        .unwrap();

        // Identical layouts cover the same pixels; the last writer wins.
        assert!(out.pixels().any(|p| *p == Pixel([0, 0, 255, 255])));
        assert!(out.pixels().all(|p| *p != Pixel([255, 0, 0, 255])));
    }

    #[test]
    fn overflow_clips_at_region_bottom() {
        let background = flat_background(100, 100, [0, 0, 0, 255]);
        let mut region = basic_region(0, 10, 100, 12);
        region.stroke_width = 0;
        region.min_font_size = 10;
        region.max_font_size = 10;
        region.valign = VAlign::Top;
        let layout = fitted(&region, "aaaaaaaa bbbbbbbb cccccccc dddddddd");
        assert!(layout.overflow);

        let out = composite(&background, &[], &[(&region, &layout)], &mono_store(), &CompositeOptions::default())
            .unwrap();

        for (_, y, p) in out.enumerate_pixels() {
            if *p != Pixel([0, 0, 0, 255]) {
                assert!(y < 22, "pixel below region bottom at y={y}");
            }
        }
    }

    #[test]
    fn overlay_is_scaled_and_centered() {
        let background = flat_background(100, 100, [0, 0, 0, 255]);
        let overlay = Overlay::new(
            RgbaImage::from_pixel(10, 10, Pixel([0, 255, 0, 255])),
            OverlaySpec {
                center_x: 0.5,
                center_y: 0.5,
                scale: 0.5,
            },
        );

        let out = composite(&background, &[overlay], &[], &mono_store(), &CompositeOptions::default())
            .unwrap();

        // 50x50 foreground centered at (50, 50): covers 25..75 on each axis.
        let center = out.get_pixel(50, 50);
        assert!(center[1] > 200 && center[0] < 40, "center not green: {center:?}");
        assert_eq!(*out.get_pixel(10, 10), Pixel([0, 0, 0, 255]));
        assert_eq!(*out.get_pixel(90, 90), Pixel([0, 0, 0, 255]));
    }

    #[test]
    fn overlay_hanging_off_the_canvas_is_clipped() {
        let background = flat_background(40, 40, [0, 0, 0, 255]);
        let overlay = Overlay::new(
            RgbaImage::from_pixel(8, 8, Pixel([255, 0, 0, 255])),
            OverlaySpec {
                center_x: 0.0,
                center_y: 0.0,
                scale: 0.5,
            },
        );

        let out = composite(&background, &[overlay], &[], &mono_store(), &CompositeOptions::default())
            .unwrap();

        assert!(out.get_pixel(0, 0)[0] > 200);
        assert_eq!(*out.get_pixel(30, 30), Pixel([0, 0, 0, 255]));
    }

    #[test]
    fn captions_draw_over_overlays() {
        let background = flat_background(100, 100, [0, 0, 0, 255]);
        let overlay = Overlay::new(
            RgbaImage::from_pixel(100, 100, Pixel([0, 255, 0, 255])),
            OverlaySpec {
                center_x: 0.5,
                center_y: 0.5,
                scale: 1.0,
            },
        );
        let mut region = basic_region(0, 0, 100, 100);
        region.stroke_width = 0;
        let layout = fitted(&region, "hi");

        let out = composite(
            &background,
            &[overlay],
            &[(&region, &layout)],
            &mono_store(),
            &CompositeOptions::default(),
        )
        .unwrap();

        assert!(out.pixels().any(|p| *p == Pixel([255, 255, 255, 255])));
    }

    #[test]
    fn watermark_draws_in_bottom_right() {
        let background = flat_background(120, 80, [0, 0, 0, 255]);
        let options = CompositeOptions {
            watermark: Some(Watermark::new("mp", "impact")),
        };

        let out = composite(&background, &[], &[], &mono_store(), &options).unwrap();

        let touched: Vec<(u32, u32)> = out
            .enumerate_pixels()
            .filter(|(_, _, p)| **p != Pixel([0, 0, 0, 255]))
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!touched.is_empty());
        assert!(touched.iter().all(|&(x, y)| x >= 60 && y >= 40));
    }

    #[test]
    fn semi_transparent_color_blends() {
        let background = flat_background(100, 50, [0, 0, 0, 255]);
        let mut region = basic_region(0, 0, 100, 50);
        region.stroke_width = 0;
        region.color = Rgba::new(255, 255, 255, 128);
        let layout = fitted(&region, "a");

        let out = composite(&background, &[], &[(&region, &layout)], &mono_store(), &CompositeOptions::default())
            .unwrap();

        let grey = out
            .pixels()
            .find(|p| p[0] > 0 && p[0] < 255)
            .expect("expected a blended pixel");
        assert_eq!(grey[3], 255);
    }
}
