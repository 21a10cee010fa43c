//! Font metrics and glyph coverage.
//!
//! The layout engine treats fonts as a pure measurement dependency, so the
//! seam is a trait: [`CaptionFont`] answers "how wide is this line at this
//! size" and can replay per-pixel coverage for the compositor. [`TtfFont`]
//! is the production implementation on top of `ab_glyph`; [`FontStore`] is
//! the process-wide read-mostly cache keyed by family name.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use anyhow::Context as _;
use parking_lot::RwLock;

use crate::error::{MemeplateError, MemeplateResult};

/// Vertical metrics for one line of text at a given size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineMetrics {
    /// Distance from the line top to the baseline.
    pub ascent: f32,
    /// Full line advance (ascent + descent + line gap).
    pub height: f32,
}

/// Measurement and rasterization interface for one font face.
///
/// Implementations must be pure: identical inputs yield identical outputs,
/// with no locale or environment dependence.
pub trait CaptionFont: Send + Sync {
    fn line_metrics(&self, size: f32) -> LineMetrics;

    /// Rendered advance width of `text` as a single line, including kerning.
    fn line_width(&self, text: &str, size: f32) -> f32;

    /// Invoke `emit(x, y, coverage)` for every covered pixel of `text` drawn
    /// with its left edge at `origin_x` and its baseline at `baseline_y`.
    /// Coverage is in `0.0..=1.0`; callers own clipping and blending.
    fn for_each_coverage(
        &self,
        text: &str,
        size: f32,
        origin_x: f32,
        baseline_y: f32,
        emit: &mut dyn FnMut(i32, i32, f32),
    );
}

/// TrueType/OpenType font face backed by `ab_glyph`.
pub struct TtfFont {
    font: FontVec,
}

impl TtfFont {
    pub fn from_bytes(bytes: Vec<u8>) -> MemeplateResult<Self> {
        let font = FontVec::try_from_vec(bytes)
            .map_err(|e| MemeplateError::validation(format!("invalid font data: {e}")))?;
        Ok(Self { font })
    }

    pub fn from_file(path: &Path) -> MemeplateResult<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read font '{}'", path.display()))?;
        Self::from_bytes(bytes)
    }
}

impl CaptionFont for TtfFont {
    fn line_metrics(&self, size: f32) -> LineMetrics {
        let scaled = self.font.as_scaled(PxScale::from(size));
        LineMetrics {
            ascent: scaled.ascent(),
            height: scaled.height() + scaled.line_gap(),
        }
    }

    fn line_width(&self, text: &str, size: f32) -> f32 {
        let scaled = self.font.as_scaled(PxScale::from(size));
        let mut width = 0.0f32;
        let mut prev: Option<ab_glyph::GlyphId> = None;
        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(p) = prev {
                width += scaled.kern(p, id);
            }
            width += scaled.h_advance(id);
            prev = Some(id);
        }
        width
    }

    fn for_each_coverage(
        &self,
        text: &str,
        size: f32,
        origin_x: f32,
        baseline_y: f32,
        emit: &mut dyn FnMut(i32, i32, f32),
    ) {
        let scale = PxScale::from(size);
        let scaled = self.font.as_scaled(scale);
        let mut cursor = origin_x;
        let mut prev: Option<ab_glyph::GlyphId> = None;

        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(p) = prev {
                cursor += scaled.kern(p, id);
            }
            let glyph = id.with_scale_and_position(scale, ab_glyph::point(cursor, baseline_y));
            if let Some(outlined) = self.font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                outlined.draw(|px, py, coverage| {
                    emit(
                        px as i32 + bounds.min.x as i32,
                        py as i32 + bounds.min.y as i32,
                        coverage,
                    );
                });
            }
            cursor += scaled.h_advance(id);
            prev = Some(id);
        }
    }
}

/// Read-mostly font cache keyed by family name.
///
/// The first lookup of a family may hit disk (`<search_dir>/<family>.ttf`);
/// every later lookup is a shared read of the cached face. Faces can also be
/// registered directly with [`FontStore::insert`] when the caller embeds or
/// preloads font bytes.
pub struct FontStore {
    search_dir: Option<PathBuf>,
    fonts: RwLock<HashMap<String, Arc<dyn CaptionFont>>>,
}

impl FontStore {
    pub fn new() -> Self {
        Self {
            search_dir: None,
            fonts: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_search_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            search_dir: Some(dir.into()),
            fonts: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, family: impl Into<String>, font: Arc<dyn CaptionFont>) {
        self.fonts.write().insert(family.into(), font);
    }

    pub fn get(&self, family: &str) -> MemeplateResult<Arc<dyn CaptionFont>> {
        if let Some(font) = self.fonts.read().get(family) {
            return Ok(font.clone());
        }

        let Some(dir) = &self.search_dir else {
            return Err(MemeplateError::render(format!(
                "font family '{family}' is not registered"
            )));
        };

        let path = dir.join(format!("{family}.ttf"));
        tracing::debug!(family, path = %path.display(), "loading font face");
        let font: Arc<dyn CaptionFont> = Arc::new(TtfFont::from_file(&path)?);

        let mut fonts = self.fonts.write();
        Ok(fonts.entry(family.to_string()).or_insert(font).clone())
    }
}

impl Default for FontStore {
    fn default() -> Self {
        Self::new()
    }
}
