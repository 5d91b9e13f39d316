//! Watermark placement calculations
//!
//! Translates a page or canvas size and a [`PlacementMode`] into the list of
//! places the text gets drawn. Coordinates use the PDF convention: origin at
//! the bottom-left, y growing upward. Raster callers flip y with
//! [`DrawInstruction::flipped`].

use crate::watermark::PlacementMode;

/// Base font size used for centered text on PDF pages
pub const PDF_BASE_FONT_SIZE: f32 = 48.0;

/// Smallest base font size used for centered text on images
pub const MIN_IMAGE_FONT_SIZE: f32 = 24.0;

/// Surface dimensions, in pixels for images or points for PDF pages
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// US Letter in points (8.5" x 11")
    pub fn letter() -> Self {
        Self::new(612.0, 792.0)
    }

    /// A4 in points (210mm x 297mm)
    pub fn a4() -> Self {
        Self::new(595.28, 841.89)
    }

    /// Negative, NaN or infinite dimensions are treated as zero
    fn sanitized(&self) -> Self {
        let clean = |v: f32| if v.is_finite() && v > 0.0 { v } else { 0.0 };
        Self::new(clean(self.width), clean(self.height))
    }
}

/// Draw the watermark text centered at (x, y) using `font_size`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawInstruction {
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
}

impl DrawInstruction {
    pub fn new(x: f32, y: f32, font_size: f32) -> Self {
        Self { x, y, font_size }
    }

    /// Same instruction with y measured from the top edge instead of the bottom
    pub fn flipped(&self, height: f32) -> Self {
        Self::new(self.x, height - self.y, self.font_size)
    }
}

/// Step sizes and fixed font sizes for the tile and diagonal modes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementPolicy {
    /// Horizontal distance between tile columns
    pub tile_step_x: f32,
    /// Vertical distance between tile rows
    pub tile_step_y: f32,
    /// Font size used for every tile
    pub tile_font_size: f32,
    /// Horizontal distance between diagonal instances
    pub diagonal_step: f32,
    /// y = x * slope along the diagonal
    pub diagonal_slope: f32,
    /// Font size used for every diagonal instance
    pub diagonal_font_size: f32,
}

impl Default for PlacementPolicy {
    fn default() -> Self {
        Self {
            tile_step_x: 200.0,
            tile_step_y: 150.0,
            tile_font_size: 20.0,
            diagonal_step: 250.0,
            diagonal_slope: 0.5,
            diagonal_font_size: 24.0,
        }
    }
}

impl PlacementPolicy {
    /// Compute every draw instruction for one page or image.
    ///
    /// `base_font_size` is only used by [`PlacementMode::Center`]; tile and
    /// diagonal use the fixed sizes of the policy. The result may be empty
    /// (zero-sized surfaces in tile or diagonal mode) and may contain
    /// overlapping instructions on small surfaces.
    pub fn instructions(
        &self,
        page: PageSize,
        mode: PlacementMode,
        base_font_size: f32,
    ) -> Vec<DrawInstruction> {
        let page = page.sanitized();

        match mode {
            PlacementMode::Center => vec![DrawInstruction::new(
                page.width / 2.0,
                page.height / 2.0,
                base_font_size,
            )],
            PlacementMode::Tile => self.tile(page),
            PlacementMode::Diagonal => self.diagonal(page),
        }
    }

    fn tile(&self, page: PageSize) -> Vec<DrawInstruction> {
        let mut out = Vec::new();
        if self.tile_step_x <= 0.0 || self.tile_step_y <= 0.0 {
            return out;
        }

        // Multiply instead of accumulating so large pages don't drift
        let mut col = 0u32;
        loop {
            let x = col as f32 * self.tile_step_x;
            if x >= page.width {
                break;
            }
            let mut row = 0u32;
            loop {
                let y = row as f32 * self.tile_step_y;
                if y >= page.height {
                    break;
                }
                out.push(DrawInstruction::new(x, y, self.tile_font_size));
                row += 1;
            }
            col += 1;
        }

        out
    }

    fn diagonal(&self, page: PageSize) -> Vec<DrawInstruction> {
        let mut out = Vec::new();
        if self.diagonal_step <= 0.0 {
            return out;
        }

        let start = -page.height;
        let end = page.width + page.height;
        let mut i = 0u32;
        loop {
            let x = start + i as f32 * self.diagonal_step;
            if x >= end {
                break;
            }
            out.push(DrawInstruction::new(
                x,
                x * self.diagonal_slope,
                self.diagonal_font_size,
            ));
            i += 1;
        }

        out
    }
}

/// Compute draw instructions with the default policy
pub fn placement_instructions(
    page: PageSize,
    mode: PlacementMode,
    base_font_size: f32,
) -> Vec<DrawInstruction> {
    PlacementPolicy::default().instructions(page, mode, base_font_size)
}

/// Base font size hint for an image: one twentieth of its width, at least 24px
pub fn image_base_font_size(width: u32) -> f32 {
    (width as f32 / 20.0).max(MIN_IMAGE_FONT_SIZE)
}
