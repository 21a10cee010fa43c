#![forbid(unsafe_code)]

pub mod catalog;
pub mod composite;
pub mod error;
pub mod font;
pub mod layout;
pub mod pipeline;
pub mod slug;
pub mod template;

pub use catalog::{
    decode_background, load_descriptor, load_template, Background, InMemoryCatalog,
    LoadedTemplate, Overlay, TemplateCatalog, TimedFrame,
};
pub use composite::{composite, CompositeOptions, Watermark};
pub use error::{MemeplateError, MemeplateResult};
pub use font::{CaptionFont, FontStore, LineMetrics, TtfFont};
pub use layout::{fit, LayoutLine, LayoutResult};
pub use pipeline::{render, render_with_options, OutputFormat, RenderRequest};
pub use template::{
    HAlign, OverlaySpec, Rgba, TemplateDescriptor, TextRegion, TextStyle, VAlign,
};
