//! Watermark settings shared by every processor in a batch

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Text used when the user leaves the text field empty
pub const DEFAULT_TEXT: &str = "水印";

/// Default opacity as a percentage
pub const DEFAULT_OPACITY_PERCENT: u32 = 30;

/// RGB colour of the watermark text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Components scaled to 0.0..=1.0, as PDF `rg` operands expect
    pub fn to_unit_rgb(self) -> (f32, f32, f32) {
        (
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        )
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::new(0x99, 0x99, 0x99)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Parse a hex color string into RGB components.
///
/// Supports both `#RGB` and `#RRGGBB`.
pub fn parse_hex_color(hex: &str) -> Result<Color> {
    let digits = hex
        .trim()
        .strip_prefix('#')
        .ok_or_else(|| Error::InvalidColor(format!("{} (must start with '#')", hex)))?;

    if !digits.is_ascii() {
        return Err(Error::InvalidColor(hex.to_string()));
    }

    let component = |s: &str| {
        u8::from_str_radix(s, 16).map_err(|_| Error::InvalidColor(hex.to_string()))
    };

    match digits.len() {
        // Each digit doubled: F -> FF
        3 => Ok(Color::new(
            component(&digits[0..1])? * 17,
            component(&digits[1..2])? * 17,
            component(&digits[2..3])? * 17,
        )),
        6 => Ok(Color::new(
            component(&digits[0..2])?,
            component(&digits[2..4])?,
            component(&digits[4..6])?,
        )),
        _ => Err(Error::InvalidColor(format!(
            "{} (expected #RGB or #RRGGBB)",
            hex
        ))),
    }
}

/// Convert a 0-100 percentage into an opacity fraction, clamping out-of-range input
pub fn opacity_from_percent(percent: u32) -> f32 {
    percent.min(100) as f32 / 100.0
}

/// How many times, and where, the text is drawn on a page or image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlacementMode {
    /// One instance in the middle
    #[default]
    Center,
    /// A regular grid covering the surface
    Tile,
    /// A line of instances rising from bottom-left to top-right
    Diagonal,
}

impl PlacementMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlacementMode::Center => "center",
            PlacementMode::Tile => "tile",
            PlacementMode::Diagonal => "diagonal",
        }
    }
}

impl fmt::Display for PlacementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlacementMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "center" | "centre" => Ok(PlacementMode::Center),
            "tile" | "tiled" => Ok(PlacementMode::Tile),
            "diagonal" => Ok(PlacementMode::Diagonal),
            other => Err(Error::InvalidPlacement(other.to_string())),
        }
    }
}

/// Watermark configuration for one batch run.
///
/// Built once before processing starts and only read afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkSpec {
    /// Text to draw (never empty)
    pub text: String,
    /// Fill colour
    pub color: Color,
    /// Opacity in 0.0..=1.0
    pub opacity: f32,
    /// Placement mode
    pub position: PlacementMode,
    /// Overrides the per-format base font size hint when set
    pub font_size: Option<f32>,
}

impl Default for WatermarkSpec {
    fn default() -> Self {
        Self {
            text: DEFAULT_TEXT.to_string(),
            color: Color::default(),
            opacity: opacity_from_percent(DEFAULT_OPACITY_PERCENT),
            position: PlacementMode::Center,
            font_size: None,
        }
    }
}

impl WatermarkSpec {
    /// Build a spec from raw form values.
    ///
    /// Empty text falls back to [`DEFAULT_TEXT`]; whitespace is kept as given.
    pub fn new(text: &str, color: Color, opacity: f32, position: PlacementMode) -> Self {
        let text = if text.is_empty() {
            DEFAULT_TEXT.to_string()
        } else {
            text.to_string()
        };

        let opacity = if opacity.is_nan() {
            0.0
        } else {
            opacity.clamp(0.0, 1.0)
        };

        Self {
            text,
            color,
            opacity,
            position,
            font_size: None,
        }
    }

    /// Override the base font size hint
    pub fn with_font_size(mut self, font_size: Option<f32>) -> Self {
        self.font_size = font_size.filter(|s| s.is_finite() && *s > 0.0);
        self
    }
}
