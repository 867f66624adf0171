//! Glyph-grid sizing with terminal cell aspect correction.

use thiserror::Error;

/// Glyph grid width used unless configured otherwise.
pub const DEFAULT_COLUMNS: u32 = 100;

/// Terminal cells are roughly twice as tall as they are wide.
pub const CELL_ASPECT_RATIO: f64 = 2.0;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GeometryError {
    #[error("degenerate frame dimensions {width}x{height}")]
    DegenerateFrame { width: u32, height: u32 },
    #[error("glyph grid needs at least one column")]
    ZeroColumns,
}

/// Size of the glyph grid a frame is rendered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridDimensions {
    pub cols: u32,
    pub rows: u32,
}

impl GridDimensions {
    /// Compute the grid for a source frame.
    ///
    /// `cols` is always `target_cols`; `rows` is the frame's height scaled to
    /// that width and halved for the cell aspect, never less than one.
    pub fn compute(
        frame_width: u32,
        frame_height: u32,
        target_cols: u32,
    ) -> Result<Self, GeometryError> {
        if frame_width == 0 || frame_height == 0 {
            return Err(GeometryError::DegenerateFrame {
                width: frame_width,
                height: frame_height,
            });
        }
        if target_cols == 0 {
            return Err(GeometryError::ZeroColumns);
        }

        // cols / (w / h) / aspect, arranged so exact halves stay exact.
        let rows = (target_cols as f64 * frame_height as f64
            / (frame_width as f64 * CELL_ASPECT_RATIO))
            .round();
        let rows = (rows as u32).max(1);

        Ok(Self {
            cols: target_cols,
            rows,
        })
    }

    pub fn cell_count(&self) -> usize {
        self.cols as usize * self.rows as usize
    }
}

/// True when two frame sizes share the same aspect ratio.
pub fn same_aspect(a: (u32, u32), b: (u32, u32)) -> bool {
    a.0 as u64 * b.1 as u64 == b.0 as u64 * a.1 as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vga_frame() {
        // 4:3 at 100 columns → 37.5 rows, rounded up
        let grid = GridDimensions::compute(640, 480, 100).unwrap();
        assert_eq!(grid, GridDimensions { cols: 100, rows: 38 });
    }

    #[test]
    fn test_hd_frame() {
        let grid = GridDimensions::compute(1280, 720, 100).unwrap();
        assert_eq!(grid, GridDimensions { cols: 100, rows: 28 });
    }

    #[test]
    fn test_square_frame() {
        let grid = GridDimensions::compute(500, 500, 100).unwrap();
        assert_eq!(grid.rows, 50);
    }

    #[test]
    fn test_extreme_panorama_keeps_one_row() {
        let grid = GridDimensions::compute(100_000, 1, 100).unwrap();
        assert_eq!(grid.rows, 1);
        assert_eq!(grid.cols, 100);
    }

    #[test]
    fn test_rows_and_cols_invariant_over_many_sizes() {
        for width in [1u32, 2, 3, 7, 64, 320, 641, 1920, 4096] {
            for height in [1u32, 2, 5, 48, 240, 479, 1080, 3000] {
                let grid = GridDimensions::compute(width, height, DEFAULT_COLUMNS).unwrap();
                assert!(grid.rows >= 1, "{width}x{height} produced zero rows");
                assert_eq!(grid.cols, DEFAULT_COLUMNS);
            }
        }
    }

    #[test]
    fn test_zero_width_is_rejected() {
        assert_eq!(
            GridDimensions::compute(0, 480, 100),
            Err(GeometryError::DegenerateFrame { width: 0, height: 480 })
        );
    }

    #[test]
    fn test_zero_height_is_rejected() {
        assert!(GridDimensions::compute(640, 0, 100).is_err());
    }

    #[test]
    fn test_zero_columns_is_rejected() {
        assert_eq!(
            GridDimensions::compute(640, 480, 0),
            Err(GeometryError::ZeroColumns)
        );
    }

    #[test]
    fn test_cell_count() {
        assert_eq!(GridDimensions { cols: 100, rows: 38 }.cell_count(), 3800);
    }

    #[test]
    fn test_same_aspect() {
        assert!(same_aspect((640, 480), (1280, 960)));
        assert!(same_aspect((640, 480), (320, 240)));
        assert!(!same_aspect((640, 480), (1280, 720)));
    }
}
