//! Font loading and text measurement
//!
//! One font file serves both outputs: glyph outlines are rasterized onto
//! images, and the same file is embedded into PDFs when it has TrueType
//! outlines. Without a font, images cannot be watermarked and PDFs fall back
//! to the standard Helvetica-Bold font.

use std::fs;
use std::path::{Path, PathBuf};

use ab_glyph::{Font, FontVec, GlyphId, PxScale, ScaleFont};

use crate::error::{Error, Result};

/// Well-known font locations, CJK-capable faces first so the default text renders
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Bold.ttc",
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/arphic/uming.ttc",
    "/System/Library/Fonts/PingFang.ttc",
    "/System/Library/Fonts/STHeiti Medium.ttc",
    "/Library/Fonts/Arial Unicode.ttf",
    "C:\\Windows\\Fonts\\simhei.ttf",
    "C:\\Windows\\Fonts\\msyh.ttc",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// A parsed font together with its raw file bytes
pub struct WatermarkFont {
    font: FontVec,
    bytes: Vec<u8>,
    name: String,
}

impl std::fmt::Debug for WatermarkFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatermarkFont")
            .field("name", &self.name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl WatermarkFont {
    /// Parse font bytes. Collections (.ttc) use their first face.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let name = name.into();
        let font = FontVec::try_from_vec_and_index(bytes.clone(), 0)
            .map_err(|e| Error::Font(format!("{}: {}", name, e)))?;
        Ok(Self { font, bytes, name })
    }

    /// Load a font file from disk
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let bytes = fs::read(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "font".to_string());
        Self::from_bytes(name, bytes)
    }

    /// Find a system font for `text`.
    ///
    /// A TrueType font that covers every character wins since it serves images
    /// and PDFs alike. Next comes any covering font (collections only work for
    /// images), then the first font that loads at all.
    pub fn discover(text: &str) -> Option<Self> {
        Self::discover_in(SYSTEM_FONT_CANDIDATES.iter().map(PathBuf::from), text)
    }

    /// Same as [`WatermarkFont::discover`] over an explicit candidate list
    pub fn discover_in(candidates: impl IntoIterator<Item = PathBuf>, text: &str) -> Option<Self> {
        let mut covering = None;
        let mut fallback = None;

        for path in candidates {
            if !path.is_file() {
                continue;
            }
            match Self::load(&path) {
                Ok(font) if font.covers(text) && font.is_truetype() => {
                    tracing::debug!(font = %path.display(), "using system font");
                    return Some(font);
                }
                Ok(font) if font.covers(text) => {
                    if covering.is_none() {
                        covering = Some(font);
                    }
                }
                Ok(font) => {
                    if fallback.is_none() {
                        fallback = Some(font);
                    }
                }
                Err(e) => tracing::debug!(font = %path.display(), error = %e, "skipping font"),
            }
        }

        covering.or(fallback)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw font file bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// True when the file is a single TrueType font, which PDFs can embed as FontFile2
    pub fn is_truetype(&self) -> bool {
        matches!(self.bytes.get(0..4), Some([0x00, 0x01, 0x00, 0x00]) | Some(b"true"))
    }

    /// True if every non-whitespace character has a glyph
    pub fn covers(&self, text: &str) -> bool {
        text.chars()
            .filter(|c| !c.is_whitespace())
            .all(|c| self.font.glyph_id(c).0 != 0)
    }

    pub fn glyph_id(&self, c: char) -> GlyphId {
        self.font.glyph_id(c)
    }

    pub fn units_per_em(&self) -> f32 {
        self.font.units_per_em().unwrap_or(1000.0)
    }

    /// Advance width of a glyph in PDF glyph space (1/1000 em)
    pub fn advance_1000(&self, id: GlyphId) -> f32 {
        self.font.h_advance_unscaled(id) * 1000.0 / self.units_per_em()
    }

    /// Ascent and descent in PDF glyph space (descent is negative)
    pub fn vertical_metrics_1000(&self) -> (f32, f32) {
        let upem = self.units_per_em();
        (
            self.font.ascent_unscaled() * 1000.0 / upem,
            self.font.descent_unscaled() * 1000.0 / upem,
        )
    }

    /// Scale whose em square is `font_size` pixels, matching CSS/PDF font sizes
    pub fn px_scale(&self, font_size: f32) -> PxScale {
        let upem = self.units_per_em();
        let height = self.font.height_unscaled();
        PxScale::from(font_size * height / upem)
    }

    /// Width of `text` at `font_size`, including kerning
    pub fn text_width(&self, text: &str, font_size: f32) -> f32 {
        let scaled = self.font.as_scaled(self.px_scale(font_size));
        let mut width = 0.0f32;
        let mut prev: Option<GlyphId> = None;

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

    pub(crate) fn inner(&self) -> &FontVec {
        &self.font
    }
}

/// First system TrueType font covering `text`, for tests that need real outlines
#[cfg(test)]
pub(crate) fn system_truetype_font(text: &str) -> Option<WatermarkFont> {
    SYSTEM_FONT_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .filter(|p| p.is_file())
        .filter_map(|p| WatermarkFont::load(&p).ok())
        .find(|f| f.is_truetype() && f.covers(text))
}

/// Load the font named on the command line, or look for a system font
pub fn resolve_font(explicit: Option<&Path>, text: &str) -> Result<Option<WatermarkFont>> {
    match explicit {
        Some(path) => WatermarkFont::load(path).map(Some),
        None => Ok(WatermarkFont::discover(text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes_rejects_garbage() {
        let result = WatermarkFont::from_bytes("junk", b"not a font at all".to_vec());
        assert!(matches!(result, Err(Error::Font(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = WatermarkFont::load(Path::new("nonexistent-font.ttf"));
        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }

    #[test]
    fn test_discover_in_skips_missing_and_invalid() {
        let dir = tempfile::TempDir::new().unwrap();
        let bogus = dir.path().join("bogus.ttf");
        fs::write(&bogus, b"nope").unwrap();

        let found = WatermarkFont::discover_in(
            vec![PathBuf::from("/no/such/font.ttf"), bogus],
            "abc",
        );
        assert!(found.is_none());
    }

    #[test]
    fn test_resolve_font_explicit_missing_is_error() {
        let result = resolve_font(Some(Path::new("missing.ttf")), "abc");
        assert!(result.is_err());
    }

    #[test]
    fn test_discover_prefers_truetype_that_covers() {
        let Some(truetype) = system_truetype_font("Hello") else {
            eprintln!("Skipping discovery test: no system TrueType font found");
            return;
        };
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("face.ttf");
        fs::write(&path, truetype.bytes()).unwrap();

        let found = WatermarkFont::discover_in(vec![path], "Hello").unwrap();
        assert!(found.is_truetype());
        assert!(found.covers("Hello"));
    }

    #[test]
    fn test_discover_falls_back_when_nothing_covers() {
        let Some(truetype) = system_truetype_font("Hello") else {
            eprintln!("Skipping fallback test: no system TrueType font found");
            return;
        };
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("face.ttf");
        fs::write(&path, truetype.bytes()).unwrap();

        // Plane 16 private use; no real font maps it
        let found = WatermarkFont::discover_in(vec![path], "\u{10FFFD}").unwrap();
        assert!(!found.covers("\u{10FFFD}"));
    }

    #[test]
    fn test_system_font_measurements() {
        let Some(font) = WatermarkFont::discover("Hello") else {
            eprintln!("Skipping font measurement test: no system font found");
            return;
        };

        let w12 = font.text_width("Hello", 12.0);
        let w24 = font.text_width("Hello", 24.0);
        assert!(w12 > 0.0);
        assert!(w24 > w12);
        assert!(font.text_width("", 24.0) == 0.0);

        let (ascent, descent) = font.vertical_metrics_1000();
        assert!(ascent > 0.0);
        assert!(descent <= 0.0);
    }
}
