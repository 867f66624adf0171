//! Dominant-face selection and elliptical face masks.

use crate::detector::DetectorError;
use crate::geometry::GridDimensions;
use crate::types::FaceBox;
use image::GrayImage;

/// Faces are taller than their detection box; the mask's vertical radius is
/// stretched by this factor to take in chin and forehead.
pub const ELLIPSE_VERTICAL_STRETCH: f32 = 1.2;

/// Smallest radius used when rasterizing, so one-cell boxes still cover
/// their center.
const MIN_RADIUS: f32 = 0.5;

/// Something that finds faces in a grayscale grid.
///
/// Boxes come back in the grid's own coordinates, in no particular order.
pub trait FaceDetect {
    fn detect(&mut self, gray: &GrayImage) -> Result<Vec<FaceBox>, DetectorError>;
}

impl<D: FaceDetect + ?Sized> FaceDetect for Box<D> {
    fn detect(&mut self, gray: &GrayImage) -> Result<Vec<FaceBox>, DetectorError> {
        (**self).detect(gray)
    }
}

/// Pick the box with the largest area; the first one wins a tie.
pub fn select_dominant(boxes: &[FaceBox]) -> Option<FaceBox> {
    boxes.iter().copied().fold(None, |best, candidate| match best {
        Some(current) if current.area() >= candidate.area() => Some(current),
        _ => Some(candidate),
    })
}

/// Boolean inclusion grid marking the cells that belong to the face.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceMask {
    grid: GridDimensions,
    cells: Vec<bool>,
    face: Option<FaceBox>,
}

impl FaceMask {
    /// An all-false mask: no face was found.
    pub fn empty(grid: GridDimensions) -> Self {
        Self {
            grid,
            cells: vec![false; grid.cell_count()],
            face: None,
        }
    }

    /// Rasterize the ellipse inscribed in `face` (vertically stretched).
    ///
    /// A cell `(col, row)` is inside when
    /// `((col - cx) / rx)^2 + ((row - cy) / ry)^2 <= 1`. Parts of the
    /// ellipse that fall outside the grid are clipped.
    pub fn from_face(grid: GridDimensions, face: FaceBox) -> Self {
        let cx = face.x as f32 + (face.width / 2) as f32;
        let cy = face.y as f32 + (face.height / 2) as f32;
        let rx = (face.width as f32 / 2.0).max(MIN_RADIUS);
        let ry = (face.height as f32 / 2.0 * ELLIPSE_VERTICAL_STRETCH).max(MIN_RADIUS);

        let mut cells = Vec::with_capacity(grid.cell_count());
        for row in 0..grid.rows {
            let dy = (row as f32 - cy) / ry;
            for col in 0..grid.cols {
                let dx = (col as f32 - cx) / rx;
                cells.push(dx * dx + dy * dy <= 1.0);
            }
        }

        Self {
            grid,
            cells,
            face: Some(face),
        }
    }

    pub fn face_found(&self) -> bool {
        self.face.is_some()
    }

    /// The box the mask was built from.
    pub fn face(&self) -> Option<FaceBox> {
        self.face
    }

    pub fn dimensions(&self) -> GridDimensions {
        self.grid
    }

    /// Whether the cell is part of the face. Out-of-grid cells never are.
    pub fn contains(&self, col: u32, row: u32) -> bool {
        if col >= self.grid.cols || row >= self.grid.rows {
            return false;
        }
        self.cells[(row * self.grid.cols + col) as usize]
    }

    pub fn covered_cells(&self) -> usize {
        self.cells.iter().filter(|&&inside| inside).count()
    }
}

/// Runs a detector over the grayscale grid and turns its answer into a mask.
pub struct FaceLocator<D> {
    detector: D,
}

impl<D: FaceDetect> FaceLocator<D> {
    pub fn new(detector: D) -> Self {
        Self { detector }
    }

    pub fn locate(&mut self, gray: &GrayImage) -> Result<FaceMask, DetectorError> {
        let grid = GridDimensions {
            cols: gray.width(),
            rows: gray.height(),
        };
        let boxes = self.detector.detect(gray)?;

        match select_dominant(&boxes) {
            Some(face) => {
                tracing::trace!(candidates = boxes.len(), ?face, "face selected");
                Ok(FaceMask::from_face(grid, face))
            }
            None => Ok(FaceMask::empty(grid)),
        }
    }
}
