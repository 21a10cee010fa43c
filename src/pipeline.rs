//! Render pipeline orchestration.
//!
//! Decode the caption slug, resolve the template, fit every region once,
//! composite, encode. Codec and lookup failures surface before any layout or
//! drawing work happens, so a failed request never produces a partial image.
//! For animated backgrounds the layout is computed once and reused across
//! frames (layout depends only on text and region, never on the frame), and
//! frames composite in parallel.

use std::io::Cursor;

use image::{
    codecs::gif::{GifEncoder, Repeat},
    imageops::FilterType,
    Delay, DynamicImage, Frame, ImageFormat, RgbaImage,
};
use rayon::prelude::*;

use crate::{
    catalog::{Background, TemplateCatalog},
    composite::{composite, CompositeOptions},
    error::{MemeplateError, MemeplateResult},
    font::FontStore,
    layout::{fit, LayoutResult},
    slug,
    template::TextRegion,
};

/// Frame delay used when a still background is encoded as a GIF.
const STILL_GIF_DELAY_MS: u32 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Jpeg,
    Webp,
    Gif,
}

impl OutputFormat {
    /// Map a file extension (no dot, any case) to a format.
    pub fn from_extension(ext: &str) -> MemeplateResult<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::Webp),
            "gif" => Ok(Self::Gif),
            other => Err(MemeplateError::unsupported_format(other)),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
            Self::Gif => "gif",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
        }
    }
}

/// One render request. Transient: built per request, dropped with the
/// response.
#[derive(Clone, Debug)]
pub struct RenderRequest {
    pub template_id: String,
    /// One caption per region, in region order. May be shorter than the
    /// region list; missing entries fall back to each region's default text.
    pub captions: Vec<String>,
    pub format: OutputFormat,
    /// Optional output size override, proportional when one axis is absent.
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl RenderRequest {
    pub fn new(
        template_id: impl Into<String>,
        captions: Vec<String>,
        format: OutputFormat,
    ) -> Self {
        Self {
            template_id: template_id.into(),
            captions,
            format,
            width: None,
            height: None,
        }
    }

    /// Parse a packed path like `aag/hello_world/foo~s2.png`: template id,
    /// slug-encoded captions, extension. Slug decoding happens here, before
    /// any template or render work.
    pub fn from_slug_path(path: &str) -> MemeplateResult<Self> {
        let (stem, ext) = path
            .rsplit_once('.')
            .ok_or_else(|| MemeplateError::unsupported_format("missing file extension"))?;
        let format = OutputFormat::from_extension(ext)?;

        let (template_id, captions) = match stem.split_once('/') {
            Some((id, packed)) => (id.to_string(), slug::decode(packed)?),
            None => (stem.to_string(), Vec::new()),
        };
        if template_id.is_empty() {
            return Err(MemeplateError::malformed_slug("empty template id"));
        }

        Ok(Self::new(template_id, captions, format))
    }
}

/// Render a request to encoded image bytes.
pub fn render(
    request: &RenderRequest,
    catalog: &dyn TemplateCatalog,
    fonts: &FontStore,
) -> MemeplateResult<Vec<u8>> {
    render_with_options(request, catalog, fonts, &CompositeOptions::default())
}

#[tracing::instrument(skip_all, fields(template = %request.template_id, format = request.format.extension()))]
pub fn render_with_options(
    request: &RenderRequest,
    catalog: &dyn TemplateCatalog,
    fonts: &FontStore,
    options: &CompositeOptions,
) -> MemeplateResult<Vec<u8>> {
    // Fail fast: lookup happens before any layout or compositing work.
    let template = catalog
        .lookup(&request.template_id)
        .ok_or_else(|| MemeplateError::template_not_found(&request.template_id))?;

    let (bg_w, bg_h) = template.background.dimensions();
    let (scale_x, scale_y) = resolve_scale(bg_w, bg_h, request.width, request.height);

    let regions: Vec<TextRegion> = template
        .descriptor
        .regions
        .iter()
        .map(|r| r.scaled(scale_x, scale_y))
        .collect();

    // Layout once per region; animated backgrounds reuse it for every frame.
    let mut layouts: Vec<LayoutResult> = Vec::with_capacity(regions.len());
    for (idx, region) in regions.iter().enumerate() {
        let raw = request
            .captions
            .get(idx)
            .map(String::as_str)
            .unwrap_or(region.default_text.as_str());
        let styled = region.style.apply(raw);
        let font = fonts.get(&region.font_family)?;
        layouts.push(fit(region, &styled, font.as_ref()));
    }
    let placements: Vec<(&TextRegion, &LayoutResult)> =
        regions.iter().zip(layouts.iter()).collect();

    let composited: Vec<(RgbaImage, u32)> = match (&template.background, request.format) {
        (Background::Animated(frames), OutputFormat::Gif) => frames
            .par_iter()
            .map(|frame| {
                let scaled = scale_image(&frame.image, scale_x, scale_y);
                composite(&scaled, &template.overlays, &placements, fonts, options)
                    .map(|canvas| (canvas, frame.delay_ms))
            })
            .collect::<MemeplateResult<Vec<_>>>()?,
        (background, _) => {
            let scaled = scale_image(background.first_frame(), scale_x, scale_y);
            vec![(
                composite(&scaled, &template.overlays, &placements, fonts, options)?,
                STILL_GIF_DELAY_MS,
            )]
        }
    };

    tracing::debug!(frames = composited.len(), "compositing done, encoding");

    match request.format {
        OutputFormat::Gif => encode_gif(composited),
        still => {
            let (canvas, _) = composited
                .into_iter()
                .next()
                .ok_or_else(|| MemeplateError::render("no frame composited"))?;
            encode_still(&canvas, still)
        }
    }
}

fn resolve_scale(bg_w: u32, bg_h: u32, width: Option<u32>, height: Option<u32>) -> (f32, f32) {
    match (width, height) {
        (None, None) => (1.0, 1.0),
        (Some(w), None) => {
            let s = w as f32 / bg_w.max(1) as f32;
            (s, s)
        }
        (None, Some(h)) => {
            let s = h as f32 / bg_h.max(1) as f32;
            (s, s)
        }
        (Some(w), Some(h)) => (
            w as f32 / bg_w.max(1) as f32,
            h as f32 / bg_h.max(1) as f32,
        ),
    }
}

fn scale_image(image: &RgbaImage, scale_x: f32, scale_y: f32) -> RgbaImage {
    if (scale_x - 1.0).abs() < f32::EPSILON && (scale_y - 1.0).abs() < f32::EPSILON {
        return image.clone();
    }
    let new_w = ((image.width() as f32 * scale_x).round() as u32).max(1);
    let new_h = ((image.height() as f32 * scale_y).round() as u32).max(1);
    image::imageops::resize(image, new_w, new_h, FilterType::Lanczos3)
}

fn encode_still(canvas: &RgbaImage, format: OutputFormat) -> MemeplateResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    let result = match format {
        OutputFormat::Png => canvas.write_to(&mut buf, ImageFormat::Png),
        // JPEG has no alpha channel; flatten first.
        OutputFormat::Jpeg => DynamicImage::ImageRgba8(canvas.clone())
            .to_rgb8()
            .write_to(&mut buf, ImageFormat::Jpeg),
        OutputFormat::Webp => canvas.write_to(&mut buf, ImageFormat::WebP),
        OutputFormat::Gif => {
            return Err(MemeplateError::render(
                "gif output must go through the animated encoder",
            ));
        }
    };
    result.map_err(|e| MemeplateError::render(format!("encode {}: {e}", format.extension())))?;
    Ok(buf.into_inner())
}

fn encode_gif(frames: Vec<(RgbaImage, u32)>) -> MemeplateResult<Vec<u8>> {
    let mut buf = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut buf);
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| MemeplateError::render(format!("encode gif: {e}")))?;
        for (canvas, delay_ms) in frames {
            let frame = Frame::from_parts(canvas, 0, 0, Delay::from_numer_denom_ms(delay_ms, 1));
            encoder
                .encode_frame(frame)
                .map_err(|e| MemeplateError::render(format!("encode gif frame: {e}")))?;
        }
    }
    Ok(buf)
}
