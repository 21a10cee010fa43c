//! Constrained caption layout: pick the largest font size in the region's
//! bounds for which the greedily wrapped text fits, then resolve alignment
//! into absolute line origins.
//!
//! Layout is pure computation over font metrics. Identical inputs always
//! produce identical results, so one layout can be shared across the frames
//! of an animated background.

use crate::{
    font::CaptionFont,
    template::{HAlign, TextRegion, VAlign},
};

/// One wrapped line with its resolved origin.
///
/// `y` is the top of the line cell; the compositor adds
/// [`LayoutResult::ascent`] to reach the baseline.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutLine {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
}

/// The fitted layout for one (region, caption) pair.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutResult {
    pub font_size: f32,
    pub line_height: f32,
    pub ascent: f32,
    pub lines: Vec<LayoutLine>,
    pub block_width: f32,
    pub block_height: f32,
    /// Set when even the minimum font size cannot satisfy the region's
    /// height and width bounds. The render still proceeds; the compositor
    /// clips instead of failing.
    pub overflow: bool,
}

impl LayoutResult {
    fn empty(font_size: f32) -> Self {
        Self {
            font_size,
            line_height: 0.0,
            ascent: 0.0,
            lines: Vec::new(),
            block_width: 0.0,
            block_height: 0.0,
            overflow: false,
        }
    }
}

/// Fit `text` into `region`.
///
/// Searches font sizes from `max_font_size` down to `min_font_size`
/// (block height and line widths are monotonic in size for fixed metrics,
/// so the first size satisfying both bounds is the largest). Explicit `\n`
/// in the caption are mandatory wrap points. A single word wider than the
/// region is force-split at a character boundary; only a lone glyph wider
/// than the region can leave a line over the width limit, and such a size
/// is never accepted while a smaller one would fit.
///
/// Never fails: when no size satisfies both bounds, the minimum-size
/// layout is returned with `overflow` set.
pub fn fit(region: &TextRegion, text: &str, font: &dyn CaptionFont) -> LayoutResult {
    let min = region.min_font_size.max(1);
    let max = region.max_font_size.max(min);
    let width_limit = region.width as f32;
    let height_limit = region.height as f32;

    if text.trim().is_empty() {
        return LayoutResult::empty(max as f32);
    }

    let mut chosen: Option<(u32, Vec<String>)> = None;
    for size in (min..=max).rev() {
        let lines = wrap(text, size as f32, width_limit, font);
        let metrics = font.line_metrics(size as f32);
        let block_height = lines.len() as f32 * metrics.height;
        // Both bounds gate acceptance: force-split can leave a single
        // glyph wider than the region, and that piece shrinks with size.
        let widest = lines
            .iter()
            .map(|l| font.line_width(l, size as f32))
            .fold(0.0f32, f32::max);
        if block_height <= height_limit && widest <= width_limit {
            chosen = Some((size, lines));
            break;
        }
    }

    let (size, lines, overflow) = match chosen {
        Some((size, lines)) => (size, lines, false),
        None => {
            tracing::debug!(
                min_font_size = min,
                region_width = region.width,
                region_height = region.height,
                "caption does not fit at minimum font size; flagging overflow"
            );
            (min, wrap(text, min as f32, width_limit, font), true)
        }
    };

    resolve_alignment(region, size as f32, lines, overflow, font)
}

/// Greedy line fill: words accumulate while the line still fits, overflow
/// starts the next line. Oversized single words are broken per character.
fn wrap(text: &str, size: f32, width_limit: f32, font: &dyn CaptionFont) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        if words.is_empty() {
            lines.push(String::new());
            continue;
        }

        let mut current = String::new();
        for word in words {
            let joined = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };

            if font.line_width(&joined, size) <= width_limit {
                current = joined;
                continue;
            }

            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }

            if font.line_width(word, size) <= width_limit {
                current = word.to_string();
            } else {
                let mut pieces = break_word(word, size, width_limit, font);
                current = pieces.pop().unwrap_or_default();
                lines.append(&mut pieces);
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }

    lines
}

/// Split a word wider than the region at character boundaries. Every piece
/// holds at least one character, so this always makes progress even when a
/// single glyph is wider than the region.
fn break_word(word: &str, size: f32, width_limit: f32, font: &dyn CaptionFont) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();

    for c in word.chars() {
        let mut candidate = current.clone();
        candidate.push(c);
        if !current.is_empty() && font.line_width(&candidate, size) > width_limit {
            pieces.push(std::mem::take(&mut current));
            current.push(c);
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }

    pieces
}

fn resolve_alignment(
    region: &TextRegion,
    size: f32,
    lines: Vec<String>,
    overflow: bool,
    font: &dyn CaptionFont,
) -> LayoutResult {
    let metrics = font.line_metrics(size);
    let widths: Vec<f32> = lines.iter().map(|l| font.line_width(l, size)).collect();
    let block_width = widths.iter().copied().fold(0.0f32, f32::max);
    let block_height = lines.len() as f32 * metrics.height;

    let region_w = region.width as f32;
    let region_h = region.height as f32;

    // Overflowing blocks pin to the region top so the leading lines stay
    // visible when the compositor clips.
    let y0 = region.y as f32
        + match region.valign {
            VAlign::Top => 0.0,
            VAlign::Middle => ((region_h - block_height) / 2.0).max(0.0),
            VAlign::Bottom => (region_h - block_height).max(0.0),
        };

    let placed = lines
        .into_iter()
        .zip(widths)
        .enumerate()
        .map(|(i, (text, width))| {
            let x = region.x as f32
                + match region.align {
                    HAlign::Left => 0.0,
                    HAlign::Center => (region_w - width) / 2.0,
                    HAlign::Right => region_w - width,
                };
            LayoutLine {
                text,
                x,
                y: y0 + i as f32 * metrics.height,
                width,
            }
        })
        .collect();

    LayoutResult {
        font_size: size,
        line_height: metrics.height,
        ascent: metrics.ascent,
        lines: placed,
        block_width,
        block_height,
        overflow,
    }
}
