//! Template descriptors: a background image reference plus the ordered text
//! regions captions are drawn into. Descriptors are loaded once, validated,
//! and treated as immutable shared state from then on.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{MemeplateError, MemeplateResult};

/// Straight-alpha RGBA color, serialized as a hex string (`#RGB`, `#RRGGBB`
/// or `#RRGGBBAA`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }

    pub const fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub fn parse_hex(hex: &str) -> MemeplateResult<Self> {
        let digits = hex
            .strip_prefix('#')
            .ok_or_else(|| MemeplateError::validation("color must start with '#'"))?;

        let nibble = |s: &str| {
            u8::from_str_radix(s, 16)
                .map_err(|_| MemeplateError::validation(format!("invalid hex digit in '{hex}'")))
        };

        match digits.len() {
            // #RGB: each digit doubled, 0xF -> 0xFF
            3 => Ok(Self::new(
                nibble(&digits[0..1])? * 17,
                nibble(&digits[1..2])? * 17,
                nibble(&digits[2..3])? * 17,
                255,
            )),
            6 => Ok(Self::new(
                nibble(&digits[0..2])?,
                nibble(&digits[2..4])?,
                nibble(&digits[4..6])?,
                255,
            )),
            8 => Ok(Self::new(
                nibble(&digits[0..2])?,
                nibble(&digits[2..4])?,
                nibble(&digits[4..6])?,
                nibble(&digits[6..8])?,
            )),
            n => Err(MemeplateError::validation(format!(
                "color must be #RGB, #RRGGBB or #RRGGBBAA, got {n} digits"
            ))),
        }
    }

    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl Serialize for Rgba {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Rgba {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HAlign {
    Left,
    #[default]
    Center,
    Right,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VAlign {
    Top,
    #[default]
    Middle,
    Bottom,
}

/// Case transform applied to a caption before layout.
///
/// `Upper` is the classic meme casing and the region default; `None` leaves
/// the caller's casing alone (the slug codec never touches case, so this is
/// the only place casing policy lives).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextStyle {
    /// Leave the caller's casing untouched. Unrecognized style names in a
    /// descriptor also land here, degrading to pass-through.
    None,
    /// Sentence-case for all-lowercase input; caller-supplied casing wins.
    Default,
    #[default]
    Upper,
    Lower,
    Title,
    Capitalize,
    Mock,
}

impl<'de> Deserialize<'de> for TextStyle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "default" => TextStyle::Default,
            "upper" => TextStyle::Upper,
            "lower" => TextStyle::Lower,
            "title" => TextStyle::Title,
            "capitalize" => TextStyle::Capitalize,
            "mock" => TextStyle::Mock,
            // "none" and anything unrecognized pass the caption through.
            _ => TextStyle::None,
        })
    }
}

impl TextStyle {
    pub fn apply(self, text: &str) -> String {
        match self {
            TextStyle::None => text.to_string(),
            TextStyle::Default => {
                if text == text.to_lowercase() {
                    capitalize_word(text)
                } else {
                    text.to_string()
                }
            }
            TextStyle::Upper => text.to_uppercase(),
            TextStyle::Lower => text.to_lowercase(),
            TextStyle::Title => text
                .split(' ')
                .map(capitalize_word)
                .collect::<Vec<_>>()
                .join(" "),
            TextStyle::Capitalize => capitalize_word(text),
            TextStyle::Mock => mock_case(text),
        }
    }
}

fn capitalize_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

/// Alternate casing over alphabetic characters only, starting uppercase:
/// "these are words" becomes "ThEsE aRe WoRdS".
fn mock_case(text: &str) -> String {
    let mut upper = true;
    text.chars()
        .map(|c| {
            if !c.is_alphabetic() {
                return c;
            }
            let out = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = !upper;
            out
        })
        .collect()
}

/// Placement of a foreground image composited over the background before
/// any captions. Coordinates are canvas-relative so the placement survives
/// output resizing.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverlaySpec {
    /// Center of the overlay as a fraction of the canvas width.
    #[serde(default = "default_overlay_center")]
    pub center_x: f32,
    /// Center of the overlay as a fraction of the canvas height.
    #[serde(default = "default_overlay_center")]
    pub center_y: f32,
    /// Overlay width as a fraction of the canvas width; aspect preserved.
    #[serde(default = "default_overlay_scale")]
    pub scale: f32,
}

fn default_overlay_center() -> f32 {
    0.5
}

fn default_overlay_scale() -> f32 {
    0.25
}

impl Default for OverlaySpec {
    fn default() -> Self {
        Self {
            center_x: default_overlay_center(),
            center_y: default_overlay_center(),
            scale: default_overlay_scale(),
        }
    }
}

impl OverlaySpec {
    pub fn validate(&self) -> MemeplateResult<()> {
        if !(0.0..=1.0).contains(&self.center_x) || !(0.0..=1.0).contains(&self.center_y) {
            return Err(MemeplateError::validation(
                "overlay center must be within 0.0..=1.0",
            ));
        }
        if !(self.scale > 0.0 && self.scale <= 1.0) {
            return Err(MemeplateError::validation(
                "overlay scale must be in (0.0, 1.0]",
            ));
        }
        Ok(())
    }
}

/// One caption slot: a pixel-space box on the background plus the font and
/// style rules for text drawn into it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,

    #[serde(default = "default_font_family")]
    pub font_family: String,
    #[serde(default = "default_min_font_size")]
    pub min_font_size: u32,
    #[serde(default = "default_max_font_size")]
    pub max_font_size: u32,

    #[serde(default = "Rgba::white")]
    pub color: Rgba,
    #[serde(default = "Rgba::black")]
    pub stroke_color: Rgba,
    #[serde(default = "default_stroke_width")]
    pub stroke_width: u32,

    #[serde(default)]
    pub align: HAlign,
    #[serde(default)]
    pub valign: VAlign,

    /// Drawn when the request supplies no caption for this slot.
    #[serde(default)]
    pub default_text: String,
    #[serde(default)]
    pub style: TextStyle,
}

fn default_font_family() -> String {
    "impact".to_string()
}

fn default_min_font_size() -> u32 {
    10
}

fn default_max_font_size() -> u32 {
    48
}

fn default_stroke_width() -> u32 {
    2
}

impl TextRegion {
    pub fn validate(&self) -> MemeplateResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(MemeplateError::validation(
                "region width/height must be > 0",
            ));
        }
        if self.min_font_size == 0 {
            return Err(MemeplateError::validation("min font size must be > 0"));
        }
        if self.min_font_size > self.max_font_size {
            return Err(MemeplateError::validation(format!(
                "min font size {} exceeds max font size {}",
                self.min_font_size, self.max_font_size
            )));
        }
        if self.font_family.trim().is_empty() {
            return Err(MemeplateError::validation("font family must be non-empty"));
        }
        Ok(())
    }

    /// Region rescaled for a resized background. Geometry follows each axis;
    /// font sizes and stroke follow the smaller factor so text never grows
    /// past a squeezed box.
    pub fn scaled(&self, sx: f32, sy: f32) -> TextRegion {
        let font_scale = sx.min(sy);
        let scale_u32 = |v: u32, s: f32| ((v as f32 * s).round() as u32).max(1);
        TextRegion {
            x: (self.x as f32 * sx).round() as u32,
            y: (self.y as f32 * sy).round() as u32,
            width: scale_u32(self.width, sx),
            height: scale_u32(self.height, sy),
            min_font_size: scale_u32(self.min_font_size, font_scale),
            max_font_size: scale_u32(self.max_font_size, font_scale),
            stroke_width: (self.stroke_width as f32 * font_scale).round() as u32,
            ..self.clone()
        }
    }
}

/// Immutable template definition: id, background reference and the ordered
/// regions. Region order is the draw order (later regions draw over earlier
/// ones), so it must be preserved end to end.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemplateDescriptor {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Background image reference, resolved by the catalog.
    #[serde(default)]
    pub background: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub regions: Vec<TextRegion>,
    /// Foreground placements, drawn in order before any captions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overlays: Vec<OverlaySpec>,
}

impl TemplateDescriptor {
    pub fn validate(&self) -> MemeplateResult<()> {
        if self.id.trim().is_empty() {
            return Err(MemeplateError::validation("template id must be non-empty"));
        }
        for (idx, region) in self.regions.iter().enumerate() {
            region.validate().map_err(|e| {
                MemeplateError::validation(format!("template '{}' region {idx}: {e}", self.id))
            })?;
        }
        for (idx, overlay) in self.overlays.iter().enumerate() {
            overlay.validate().map_err(|e| {
                MemeplateError::validation(format!("template '{}' overlay {idx}: {e}", self.id))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn basic_region(x: u32, y: u32, width: u32, height: u32) -> TextRegion {
    TextRegion {
        x,
        y,
        width,
        height,
        font_family: default_font_family(),
        min_font_size: default_min_font_size(),
        max_font_size: default_max_font_size(),
        color: Rgba::white(),
        stroke_color: Rgba::black(),
        stroke_width: default_stroke_width(),
        align: HAlign::Center,
        valign: VAlign::Middle,
        default_text: String::new(),
        style: TextStyle::Upper,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic_descriptor() -> TemplateDescriptor {
        TemplateDescriptor {
            id: "aag".to_string(),
            name: "Ancient Aliens Guy".to_string(),
            background: "aag.png".to_string(),
            source_url: None,
            regions: vec![basic_region(0, 0, 300, 100), basic_region(0, 200, 300, 100)],
            overlays: Vec::new(),
        }
    }

    #[test]
    fn json_roundtrip() {
        let descriptor = basic_descriptor();
        let s = serde_json::to_string_pretty(&descriptor).unwrap();
        let de: TemplateDescriptor = serde_json::from_str(&s).unwrap();
        assert_eq!(de, descriptor);
    }

    #[test]
    fn minimal_json_fills_defaults() {
        let de: TemplateDescriptor = serde_json::from_str(
            r#"{"id":"x","regions":[{"x":0,"y":0,"width":10,"height":10}]}"#,
        )
        .unwrap();
        let region = &de.regions[0];
        assert_eq!(region.font_family, "impact");
        assert_eq!(region.min_font_size, 10);
        assert_eq!(region.max_font_size, 48);
        assert_eq!(region.color, Rgba::white());
        assert_eq!(region.align, HAlign::Center);
        assert_eq!(region.style, TextStyle::Upper);
    }

    #[test]
    fn validate_rejects_zero_size_region() {
        let mut descriptor = basic_descriptor();
        descriptor.regions[0].width = 0;
        assert!(descriptor.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_font_bounds() {
        let mut descriptor = basic_descriptor();
        descriptor.regions[1].min_font_size = 60;
        assert!(descriptor.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_id() {
        let mut descriptor = basic_descriptor();
        descriptor.id = " ".to_string();
        assert!(descriptor.validate().is_err());
    }

    #[test]
    fn overlay_json_fills_centered_defaults() {
        let overlay: OverlaySpec = serde_json::from_str("{}").unwrap();
        assert_eq!(overlay, OverlaySpec::default());
        assert_eq!(overlay.center_x, 0.5);
        assert_eq!(overlay.scale, 0.25);

        let de: TemplateDescriptor = serde_json::from_str(
            r#"{"id":"x","regions":[{"x":0,"y":0,"width":10,"height":10}],"overlays":[{"scale":0.5}]}"#,
        )
        .unwrap();
        assert_eq!(de.overlays.len(), 1);
        assert_eq!(de.overlays[0].scale, 0.5);
        assert_eq!(de.overlays[0].center_y, 0.5);
    }

    #[test]
    fn validate_rejects_out_of_range_overlay() {
        let mut descriptor = basic_descriptor();
        descriptor.overlays.push(OverlaySpec {
            center_x: 1.5,
            ..OverlaySpec::default()
        });
        assert!(descriptor.validate().is_err());

        descriptor.overlays[0] = OverlaySpec {
            scale: 0.0,
            ..OverlaySpec::default()
        };
        assert!(descriptor.validate().is_err());
    }

    #[test]
    fn hex_parses_short_long_and_alpha_forms() {
        assert_eq!(Rgba::parse_hex("#fff").unwrap(), Rgba::white());
        assert_eq!(Rgba::parse_hex("#FF0000").unwrap(), Rgba::new(255, 0, 0, 255));
        assert_eq!(
            Rgba::parse_hex("#00ff0080").unwrap(),
            Rgba::new(0, 255, 0, 128)
        );
        assert_eq!(Rgba::parse_hex("#abc").unwrap(), Rgba::new(170, 187, 204, 255));
    }

    #[test]
    fn hex_rejects_bad_input() {
        assert!(Rgba::parse_hex("ffffff").is_err());
        assert!(Rgba::parse_hex("#ff00").is_err());
        assert!(Rgba::parse_hex("#gggggg").is_err());
    }

    #[test]
    fn hex_roundtrip_through_serde() {
        let c = Rgba::new(18, 20, 28, 255);
        let s = serde_json::to_string(&c).unwrap();
        assert_eq!(s, "\"#12141c\"");
        let de: Rgba = serde_json::from_str(&s).unwrap();
        assert_eq!(de, c);
    }

    #[test]
    fn styles_match_expected_casing() {
        assert_eq!(TextStyle::None.apply("Hello, world!"), "Hello, world!");
        assert_eq!(TextStyle::Default.apply("these are words"), "These are words");
        assert_eq!(TextStyle::Default.apply("NASA launch"), "NASA launch");
        assert_eq!(TextStyle::Upper.apply("Hello, world!"), "HELLO, WORLD!");
        assert_eq!(TextStyle::Lower.apply("Hello, world!"), "hello, world!");
        assert_eq!(TextStyle::Title.apply("these are words"), "These Are Words");
        assert_eq!(
            TextStyle::Capitalize.apply("these are words"),
            "These are words"
        );
        assert_eq!(TextStyle::Mock.apply("these are words"), "ThEsE aRe WoRdS");
    }

    #[test]
    fn unknown_style_names_degrade_to_pass_through() {
        let region: TextRegion = serde_json::from_str(
            r#"{"x":0,"y":0,"width":10,"height":10,"style":"sparkle"}"#,
        )
        .unwrap();
        assert_eq!(region.style, TextStyle::None);

        let default: TextRegion = serde_json::from_str(
            r#"{"x":0,"y":0,"width":10,"height":10,"style":"default"}"#,
        )
        .unwrap();
        assert_eq!(default.style, TextStyle::Default);
    }

    #[test]
    fn scaled_halves_geometry_and_fonts() {
        let region = basic_region(10, 20, 300, 100);
        let scaled = region.scaled(0.5, 0.5);
        assert_eq!(scaled.x, 5);
        assert_eq!(scaled.y, 10);
        assert_eq!(scaled.width, 150);
        assert_eq!(scaled.height, 50);
        assert_eq!(scaled.min_font_size, 5);
        assert_eq!(scaled.max_font_size, 24);
        assert_eq!(scaled.stroke_width, 1);
    }

    #[test]
    fn scaled_never_collapses_to_zero() {
        let region = basic_region(0, 0, 3, 3);
        let scaled = region.scaled(0.1, 0.1);
        assert!(scaled.width >= 1 && scaled.height >= 1);
        assert!(scaled.min_font_size >= 1);
    }
}
