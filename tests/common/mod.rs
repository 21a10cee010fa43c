//! Shared test support: a deterministic fixed-metrics font so no font
//! assets are needed, plus template fixtures.

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use std::sync::Arc;

use image::RgbaImage;
use memeplate::{
    Background, CaptionFont, FontStore, HAlign, InMemoryCatalog, LineMetrics, LoadedTemplate,
    Rgba, TemplateDescriptor, TextRegion, TextStyle, VAlign,
};

/// Install a fmt subscriber so test runs capture layout and pipeline traces.
/// Safe to call from every test; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Every character advances `0.5 * size`; a line is `size` tall with ascent
/// `0.8 * size`. Coverage fills the full line cell as a solid block.
pub struct BlockFont;

impl CaptionFont for BlockFont {
    fn line_metrics(&self, size: f32) -> LineMetrics {
        LineMetrics {
            ascent: 0.8 * size,
            height: size,
        }
    }

    fn line_width(&self, text: &str, size: f32) -> f32 {
        text.chars().count() as f32 * 0.5 * size
    }

    fn for_each_coverage(
        &self,
        text: &str,
        size: f32,
        origin_x: f32,
        baseline_y: f32,
        emit: &mut dyn FnMut(i32, i32, f32),
    ) {
        let width = self.line_width(text, size).round() as i32;
        let top = (baseline_y - 0.8 * size).round() as i32;
        let bottom = top + size.round() as i32;
        let left = origin_x.round() as i32;
        for y in top..bottom {
            for x in left..left + width {
                emit(x, y, 1.0);
            }
        }
    }
}

pub fn block_fonts() -> FontStore {
    let store = FontStore::new();
    store.insert("impact", Arc::new(BlockFont));
    store
}

pub fn region(x: u32, y: u32, width: u32, height: u32) -> TextRegion {
    TextRegion {
        x,
        y,
        width,
        height,
        font_family: "impact".to_string(),
        min_font_size: 10,
        max_font_size: 48,
        color: Rgba::white(),
        stroke_color: Rgba::black(),
        stroke_width: 2,
        align: HAlign::Center,
        valign: VAlign::Middle,
        default_text: String::new(),
        style: TextStyle::Upper,
    }
}

pub fn two_region_catalog(id: &str, w: u32, h: u32) -> InMemoryCatalog {
    let catalog = InMemoryCatalog::new();
    catalog.insert(LoadedTemplate {
        descriptor: TemplateDescriptor {
            id: id.to_string(),
            name: format!("{id} fixture"),
            background: String::new(),
            source_url: None,
            regions: vec![region(0, 0, w, h / 2), region(0, h / 2, w, h / 2)],
            overlays: Vec::new(),
        },
        background: Background::Still(RgbaImage::from_pixel(
            w,
            h,
            image::Rgba([30, 30, 30, 255]),
        )),
        overlays: Vec::new(),
    });
    catalog
}
