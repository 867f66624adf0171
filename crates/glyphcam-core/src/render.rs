//! Glyph rendering: luminance picks the character, the cell's own color
//! tints it, and anything outside the face mask is left blank.

use crate::downscale::DownscaledFrame;
use crate::geometry::GridDimensions;
use crate::locator::FaceMask;
use std::fmt::{self, Write as _};

/// Ten-level ramp from darkest to brightest.
pub const GLYPH_RAMP: [char; 10] = [' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

pub const COLOR_RESET: &str = "\x1b[0m";

/// Index into [`GLYPH_RAMP`] for a luminance value (0 → first, 255 → last).
#[inline]
pub fn ramp_index(luma: u8) -> usize {
    luma as usize * (GLYPH_RAMP.len() - 1) / 255
}

#[inline]
pub fn glyph_for(luma: u8) -> char {
    GLYPH_RAMP[ramp_index(luma)]
}

/// Write a 24-bit foreground color escape.
pub fn true_color(out: &mut impl fmt::Write, rgb: [u8; 3]) -> fmt::Result {
    write!(out, "\x1b[38;2;{};{};{}m", rgb[0], rgb[1], rgb[2])
}

/// One rendered cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlyphCell {
    /// Outside the face: a plain space with no color.
    Blank,
    Glyph { ch: char, color: [u8; 3] },
}

impl GlyphCell {
    pub fn ch(&self) -> char {
        match self {
            GlyphCell::Blank => ' ',
            GlyphCell::Glyph { ch, .. } => *ch,
        }
    }
}

/// A rendered frame: `rows` lines of exactly `cols` cells each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlyphFrame {
    grid: GridDimensions,
    cells: Vec<GlyphCell>,
}

impl GlyphFrame {
    /// A frame of blank cells.
    pub fn blank(grid: GridDimensions) -> Self {
        Self {
            grid,
            cells: vec![GlyphCell::Blank; grid.cell_count()],
        }
    }

    pub fn dimensions(&self) -> GridDimensions {
        self.grid
    }

    pub fn cell(&self, col: u32, row: u32) -> Option<GlyphCell> {
        if col >= self.grid.cols || row >= self.grid.rows {
            return None;
        }
        self.cells.get((row * self.grid.cols + col) as usize).copied()
    }

    pub fn row(&self, row: u32) -> Option<&[GlyphCell]> {
        if row >= self.grid.rows {
            return None;
        }
        let start = (row * self.grid.cols) as usize;
        self.cells.get(start..start + self.grid.cols as usize)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[GlyphCell]> {
        self.cells.chunks(self.grid.cols.max(1) as usize)
    }

    /// True when no cell carries a glyph.
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|cell| *cell == GlyphCell::Blank)
    }

    /// Terminal lines with color escapes. Every line ends with a reset so
    /// color never bleeds into the next one.
    pub fn colored_rows(&self) -> Vec<String> {
        self.rows().map(colored_line).collect()
    }

    /// Lines without escape codes, each exactly `cols` characters.
    pub fn plain_rows(&self) -> Vec<String> {
        self.rows()
            .map(|row| row.iter().map(GlyphCell::ch).collect())
            .collect()
    }

    /// The plain rendering as one text block, rows joined by newlines.
    pub fn plain_text(&self) -> String {
        self.plain_rows().join("\n")
    }
}

fn colored_line(row: &[GlyphCell]) -> String {
    // Typical escape is ~19 bytes per colored cell.
    let mut line = String::with_capacity(row.len() * 20 + COLOR_RESET.len());
    for cell in row {
        match *cell {
            GlyphCell::Blank => line.push(' '),
            GlyphCell::Glyph { ch, color } => {
                // Writing into a String cannot fail.
                let _ = true_color(&mut line, color);
                line.push(ch);
            }
        }
    }
    line.push_str(COLOR_RESET);
    line
}

/// Render the downscaled frame through the face mask.
pub fn render(frame: &DownscaledFrame, mask: &FaceMask) -> GlyphFrame {
    let grid = frame.dimensions();
    let mut cells = Vec::with_capacity(grid.cell_count());

    for row in 0..grid.rows {
        for col in 0..grid.cols {
            if !mask.contains(col, row) {
                cells.push(GlyphCell::Blank);
                continue;
            }
            let luma = frame.luma.get_pixel(col, row).0[0];
            cells.push(GlyphCell::Glyph {
                ch: glyph_for(luma),
                color: frame.color.get_pixel(col, row).0,
            });
        }
    }

    GlyphFrame { grid, cells }
}
