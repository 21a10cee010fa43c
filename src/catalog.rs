//! Template catalog boundary.
//!
//! The rendering core never touches storage directly: it asks a
//! [`TemplateCatalog`] for a [`LoadedTemplate`] by id and gets back the
//! immutable descriptor plus its decoded background. Backgrounds are decoded
//! once at load time and shared read-only across requests.

use std::{
    collections::HashMap,
    io::Cursor,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;
use image::{codecs::gif::GifDecoder, AnimationDecoder, RgbaImage};
use parking_lot::RwLock;

use crate::{
    error::{MemeplateError, MemeplateResult},
    template::{OverlaySpec, TemplateDescriptor},
};

/// One frame of an animated background with its display delay.
#[derive(Clone, Debug)]
pub struct TimedFrame {
    pub image: RgbaImage,
    pub delay_ms: u32,
}

/// Decoded background bitmap(s) for a template.
#[derive(Clone, Debug)]
pub enum Background {
    Still(RgbaImage),
    /// Always holds at least one frame; loaders reject empty sequences.
    Animated(Vec<TimedFrame>),
}

impl Background {
    pub fn first_frame(&self) -> &RgbaImage {
        match self {
            Background::Still(image) => image,
            Background::Animated(frames) => &frames[0].image,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.first_frame().dimensions()
    }

    pub fn is_animated(&self) -> bool {
        matches!(self, Background::Animated(_))
    }
}

/// A foreground image with its resolved placement, composited over the
/// background before any captions.
#[derive(Clone, Debug)]
pub struct Overlay {
    pub image: RgbaImage,
    pub placement: OverlaySpec,
}

impl Overlay {
    pub fn new(image: RgbaImage, placement: OverlaySpec) -> Self {
        Self { image, placement }
    }
}

/// A template ready to render: validated descriptor plus decoded background
/// and any foreground overlays.
#[derive(Clone, Debug)]
pub struct LoadedTemplate {
    pub descriptor: TemplateDescriptor,
    pub background: Background,
    /// Must line up with `descriptor.overlays`; loaders pair them in order.
    pub overlays: Vec<Overlay>,
}

/// Lookup capability the render pipeline depends on. Implemented by whatever
/// storage backend the surrounding service chooses.
pub trait TemplateCatalog: Send + Sync {
    fn lookup(&self, template_id: &str) -> Option<Arc<LoadedTemplate>>;
}

/// Simple in-process catalog over a read-mostly map. Enough for the CLI and
/// for embedding; real services put their own backend behind the trait.
#[derive(Default)]
pub struct InMemoryCatalog {
    templates: RwLock<HashMap<String, Arc<LoadedTemplate>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, template: LoadedTemplate) {
        self.templates
            .write()
            .insert(template.descriptor.id.clone(), Arc::new(template));
    }

    pub fn len(&self) -> usize {
        self.templates.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.read().is_empty()
    }
}

impl TemplateCatalog for InMemoryCatalog {
    fn lookup(&self, template_id: &str) -> Option<Arc<LoadedTemplate>> {
        self.templates.read().get(template_id).cloned()
    }
}

/// Parse and validate a descriptor from a JSON file.
pub fn load_descriptor(path: &Path) -> MemeplateResult<TemplateDescriptor> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("open template descriptor '{}'", path.display()))?;
    let descriptor: TemplateDescriptor = serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("parse template descriptor '{}'", path.display()))?;
    descriptor.validate()?;
    Ok(descriptor)
}

/// Decode background bytes. Multi-frame GIFs become [`Background::Animated`]
/// with per-frame delays; everything else (and single-frame GIFs) decodes to
/// a still.
pub fn decode_background(bytes: &[u8]) -> MemeplateResult<Background> {
    if bytes.starts_with(b"GIF8") {
        let decoder = GifDecoder::new(Cursor::new(bytes)).context("decode gif background")?;
        let mut frames = decoder
            .into_frames()
            .collect_frames()
            .context("decode gif frames")?;
        if frames.is_empty() {
            return Err(MemeplateError::render("gif background has no frames"));
        }
        if frames.len() == 1 {
            return Ok(Background::Still(frames.remove(0).into_buffer()));
        }
        let timed = frames
            .into_iter()
            .map(|frame| {
                let (numer, denom) = frame.delay().numer_denom_ms();
                TimedFrame {
                    delay_ms: numer.checked_div(denom).unwrap_or(0).max(10),
                    image: frame.into_buffer(),
                }
            })
            .collect();
        return Ok(Background::Animated(timed));
    }

    let image = image::load_from_memory(bytes).context("decode background image")?;
    Ok(Background::Still(image.to_rgba8()))
}

/// Load a template from a descriptor JSON and a background image file.
///
/// `overlay_paths` supply one foreground image per descriptor overlay, in
/// order. An empty list skips overlays even when the descriptor declares
/// placements; a non-empty list must match the placement count.
pub fn load_template(
    descriptor_path: &Path,
    background_path: &Path,
    overlay_paths: &[PathBuf],
) -> MemeplateResult<LoadedTemplate> {
    let descriptor = load_descriptor(descriptor_path)?;
    let bytes = std::fs::read(background_path)
        .with_context(|| format!("read background '{}'", background_path.display()))?;
    let background = decode_background(&bytes)?;

    let overlays = if overlay_paths.is_empty() {
        Vec::new()
    } else {
        if overlay_paths.len() != descriptor.overlays.len() {
            return Err(MemeplateError::validation(format!(
                "template '{}' declares {} overlay placement(s) but {} image(s) were given",
                descriptor.id,
                descriptor.overlays.len(),
                overlay_paths.len()
            )));
        }
        descriptor
            .overlays
            .iter()
            .zip(overlay_paths)
            .map(|(placement, path)| {
                let image = image::open(path)
                    .with_context(|| format!("read overlay '{}'", path.display()))?
                    .to_rgba8();
                Ok(Overlay::new(image, *placement))
            })
            .collect::<MemeplateResult<Vec<_>>>()?
    };

    tracing::debug!(
        id = %descriptor.id,
        animated = background.is_animated(),
        overlays = overlays.len(),
        "loaded template"
    );
    Ok(LoadedTemplate {
        descriptor,
        background,
        overlays,
    })
}
