//! SCRFD face detector via ONNX Runtime.
//!
//! Runs the SCRFD anchor-free model on the grayscale glyph grid: letterbox to
//! the model's square input, decode the three stride levels, suppress
//! overlapping boxes and map the survivors back to grid cells.

use crate::locator::FaceDetect;
use crate::types::FaceBox;
use image::imageops::{self, FilterType};
use image::GrayImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const SCRFD_INPUT_SIZE: usize = 640;
const SCRFD_MEAN: f32 = 127.5;
const SCRFD_STD: f32 = 128.0;
const SCRFD_CONFIDENCE_THRESHOLD: f32 = 0.5;
const SCRFD_NMS_THRESHOLD: f32 = 0.4;
const SCRFD_STRIDES: [usize; 3] = [8, 16, 32];
const SCRFD_ANCHORS_PER_CELL: usize = 2;
/// Score and box tensors for three strides. Keypoint tensors, when the
/// export has them, are ignored.
const SCRFD_MIN_OUTPUTS: usize = 6;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} (download det_10g.onnx from insightface)")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Scale and padding applied when fitting the grid into the model input.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl Letterbox {
    fn fit(width: usize, height: usize) -> (Self, usize, usize) {
        let scale =
            (SCRFD_INPUT_SIZE as f32 / width as f32).min(SCRFD_INPUT_SIZE as f32 / height as f32);
        let new_w = ((width as f32 * scale).round() as usize).clamp(1, SCRFD_INPUT_SIZE);
        let new_h = ((height as f32 * scale).round() as usize).clamp(1, SCRFD_INPUT_SIZE);
        let letterbox = Self {
            scale,
            pad_x: (SCRFD_INPUT_SIZE - new_w) as f32 / 2.0,
            pad_y: (SCRFD_INPUT_SIZE - new_h) as f32 / 2.0,
        };
        (letterbox, new_w, new_h)
    }

    /// Model-input coordinates back to grid coordinates.
    fn unmap(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// A decoded detection before suppression, corners in grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
}

impl Candidate {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    fn to_face_box(self) -> FaceBox {
        let x = self.x1.round();
        let y = self.y1.round();
        FaceBox {
            x: x as i32,
            y: y as i32,
            width: (self.x2.round() - x).max(0.0) as u32,
            height: (self.y2.round() - y).max(0.0) as u32,
        }
    }
}

/// Output tensor indices for one stride: (score_idx, bbox_idx).
type StrideOutputIndices = (usize, usize);

/// SCRFD-based face detector.
pub struct ScrfdDetector {
    session: Session,
    stride_indices: [StrideOutputIndices; 3],
}

impl ScrfdDetector {
    /// Load the SCRFD ONNX model from the given path.
    pub fn load(model_path: &Path) -> Result<Self, DetectorError> {
        if !model_path.exists() {
            return Err(DetectorError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> = session
            .outputs()
            .iter()
            .map(|o| o.name().to_string())
            .collect();

        tracing::info!(
            path = %model_path.display(),
            outputs = ?output_names,
            "loaded SCRFD model"
        );

        if output_names.len() < SCRFD_MIN_OUTPUTS {
            return Err(DetectorError::InferenceFailed(format!(
                "SCRFD model needs at least {SCRFD_MIN_OUTPUTS} outputs (3 strides x score/bbox), got {}",
                output_names.len()
            )));
        }

        let stride_indices = discover_output_indices(&output_names);
        tracing::debug!(?stride_indices, "SCRFD output tensor mapping");

        Ok(Self {
            session,
            stride_indices,
        })
    }
}

impl FaceDetect for ScrfdDetector {
    fn detect(&mut self, gray: &GrayImage) -> Result<Vec<FaceBox>, DetectorError> {
        if gray.width() == 0 || gray.height() == 0 {
            return Ok(Vec::new());
        }

        let (input, letterbox) = preprocess(gray);
        let stride_indices = self.stride_indices;
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut candidates = Vec::new();
        for (&stride, (score_idx, bbox_idx)) in SCRFD_STRIDES.iter().zip(stride_indices) {
            let (_, scores) = outputs[score_idx].try_extract_tensor::<f32>().map_err(|e| {
                DetectorError::InferenceFailed(format!("scores stride {stride}: {e}"))
            })?;
            let (_, bboxes) = outputs[bbox_idx].try_extract_tensor::<f32>().map_err(|e| {
                DetectorError::InferenceFailed(format!("bboxes stride {stride}: {e}"))
            })?;

            candidates.extend(decode_stride(
                scores,
                bboxes,
                stride,
                &letterbox,
                SCRFD_CONFIDENCE_THRESHOLD,
            ));
        }

        let faces: Vec<FaceBox> = nms(candidates, SCRFD_NMS_THRESHOLD)
            .into_iter()
            .map(Candidate::to_face_box)
            .filter(|face| face.area() > 0)
            .collect();

        tracing::trace!(count = faces.len(), "SCRFD detections");
        Ok(faces)
    }
}

/// Letterbox the grid into an NCHW float tensor, luminance copied to all
/// three channels.
fn preprocess(gray: &GrayImage) -> (Array4<f32>, Letterbox) {
    let (letterbox, new_w, new_h) = Letterbox::fit(gray.width() as usize, gray.height() as usize);
    let resized = imageops::resize(gray, new_w as u32, new_h as u32, FilterType::Triangle);

    let pad_x = letterbox.pad_x.floor() as usize;
    let pad_y = letterbox.pad_y.floor() as usize;

    // Padding holds the mean, which normalizes to 0.0.
    let mut tensor = Array4::<f32>::zeros((1, 3, SCRFD_INPUT_SIZE, SCRFD_INPUT_SIZE));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let normalized = (pixel.0[0] as f32 - SCRFD_MEAN) / SCRFD_STD;
        let (tx, ty) = (x as usize + pad_x, y as usize + pad_y);
        for channel in 0..3 {
            tensor[[0, channel, ty, tx]] = normalized;
        }
    }

    (tensor, letterbox)
}

/// Find score/bbox tensors by name ("score_8", "bbox_16", ...), falling back
/// to the standard export order: [0-2] scores, [3-5] boxes.
fn discover_output_indices(names: &[String]) -> [StrideOutputIndices; 3] {
    let find = |prefix: &str, stride: usize| -> Option<usize> {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| n == &target)
    };

    let named: Option<Vec<StrideOutputIndices>> = SCRFD_STRIDES
        .iter()
        .map(|&stride| Some((find("score", stride)?, find("bbox", stride)?)))
        .collect();

    match named.as_deref() {
        Some(&[a, b, c]) => [a, b, c],
        _ => {
            tracing::debug!(
                ?names,
                "SCRFD: output names not recognized, using positional mapping"
            );
            [(0, 3), (1, 4), (2, 5)]
        }
    }
}

/// Decode detections for a single stride level.
fn decode_stride(
    scores: &[f32],
    bboxes: &[f32],
    stride: usize,
    letterbox: &Letterbox,
    threshold: f32,
) -> Vec<Candidate> {
    let grid_w = SCRFD_INPUT_SIZE / stride;
    let grid_h = SCRFD_INPUT_SIZE / stride;
    let num_anchors = grid_w * grid_h * SCRFD_ANCHORS_PER_CELL;
    let step = stride as f32;

    let mut candidates = Vec::new();
    for idx in 0..num_anchors {
        let score = scores.get(idx).copied().unwrap_or(0.0);
        if score <= threshold {
            continue;
        }
        let Some(offsets) = bboxes.get(idx * 4..idx * 4 + 4) else {
            continue;
        };

        let cell = idx / SCRFD_ANCHORS_PER_CELL;
        let anchor_x = (cell % grid_w) as f32 * step;
        let anchor_y = (cell / grid_w) as f32 * step;

        let (x1, y1) = letterbox.unmap(anchor_x - offsets[0] * step, anchor_y - offsets[1] * step);
        let (x2, y2) = letterbox.unmap(anchor_x + offsets[2] * step, anchor_y + offsets[3] * step);

        candidates.push(Candidate {
            x1,
            y1,
            x2,
            y2,
            score,
        });
    }

    candidates
}

/// Non-maximum suppression: keep the best-scoring box of each overlapping group.
fn nms(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if keep.iter().all(|kept| iou(kept, &candidate) <= iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}

/// Intersection-over-union of two candidates.
fn iou(a: &Candidate, b: &Candidate) -> f32 {
    let inter_w = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
    let inter_h = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
    let inter = inter_w * inter_h;
    let union = a.area() + b.area() - inter;

    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(x: f32, y: f32, w: f32, h: f32, score: f32) -> Candidate {
        Candidate {
            x1: x,
            y1: y,
            x2: x + w,
            y2: y + h,
            score,
        }
    }

    #[test]
    fn test_iou_identical() {
        let a = candidate(0.0, 0.0, 100.0, 100.0, 1.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_no_overlap() {
        let a = candidate(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = candidate(20.0, 20.0, 10.0, 10.0, 1.0);
        assert!(iou(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_iou_partial() {
        let a = candidate(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = candidate(5.0, 0.0, 10.0, 10.0, 1.0);
        // 50 shared out of 150
        assert!((iou(&a, &b) - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_nms_suppresses_overlapping() {
        let result = nms(
            vec![
                candidate(5.0, 5.0, 100.0, 100.0, 0.8),
                candidate(0.0, 0.0, 100.0, 100.0, 0.9),
                candidate(200.0, 200.0, 50.0, 50.0, 0.7),
            ],
            0.4,
        );
        assert_eq!(result.len(), 2);
        assert!((result[0].score - 0.9).abs() < 1e-6);
        assert!((result[1].score - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_nms_empty() {
        assert!(nms(Vec::new(), 0.4).is_empty());
    }

    #[test]
    fn test_letterbox_wide_grid() {
        // 100x38 grid: width-limited, scale 6.4, vertical padding
        let (letterbox, new_w, new_h) = Letterbox::fit(100, 38);
        assert_eq!(new_w, 640);
        assert_eq!(new_h, 243);
        assert!((letterbox.scale - 6.4).abs() < 1e-4);
        assert_eq!(letterbox.pad_x, 0.0);
        assert!((letterbox.pad_y - 198.5).abs() < 1e-4);
    }

    #[test]
    fn test_letterbox_unmap_roundtrip() {
        let (letterbox, _, _) = Letterbox::fit(100, 38);
        let (x, y) = (20.0f32, 15.0f32);
        let (rx, ry) = letterbox.unmap(
            x * letterbox.scale + letterbox.pad_x,
            y * letterbox.scale + letterbox.pad_y,
        );
        assert!((rx - x).abs() < 1e-3);
        assert!((ry - y).abs() < 1e-3);
    }

    #[test]
    fn test_candidate_to_face_box_rounds() {
        let face = Candidate {
            x1: 9.6,
            y1: 10.2,
            x2: 30.4,
            y2: 29.7,
            score: 0.9,
        }
        .to_face_box();
        assert_eq!(face, FaceBox::new(10, 10, 20, 20));
    }

    #[test]
    fn test_candidate_inverted_collapses_to_empty() {
        let face = candidate(10.0, 10.0, -4.0, 5.0, 0.9).to_face_box();
        assert_eq!(face.width, 0);
        assert_eq!(face.area(), 0);
    }

    #[test]
    fn test_decode_stride_single_anchor() {
        let (letterbox, _, _) = Letterbox::fit(640, 640);
        let stride = 32;
        let anchors = (640 / stride) * (640 / stride) * SCRFD_ANCHORS_PER_CELL;
        let mut scores = vec![0.0; anchors];
        let mut bboxes = vec![0.0; anchors * 4];
        // Anchor cell (col 2, row 1), first anchor of the pair.
        let idx = (640 / stride + 2) * SCRFD_ANCHORS_PER_CELL;
        scores[idx] = 0.9;
        bboxes[idx * 4..idx * 4 + 4].copy_from_slice(&[1.0, 1.0, 1.0, 1.0]);

        let found = decode_stride(&scores, &bboxes, stride, &letterbox, 0.5);
        assert_eq!(found.len(), 1);
        let c = found[0];
        assert!((c.x1 - 32.0).abs() < 1e-3);
        assert!((c.y1 - 0.0).abs() < 1e-3);
        assert!((c.x2 - 96.0).abs() < 1e-3);
        assert!((c.y2 - 64.0).abs() < 1e-3);
    }

    #[test]
    fn test_decode_stride_below_threshold() {
        let (letterbox, _, _) = Letterbox::fit(640, 640);
        let scores = vec![0.5; 800];
        let bboxes = vec![1.0; 3200];
        assert!(decode_stride(&scores, &bboxes, 32, &letterbox, 0.5).is_empty());
    }

    #[test]
    fn test_preprocess_pads_with_zero() {
        let gray = GrayImage::from_pixel(100, 38, image::Luma([255]));
        let (tensor, letterbox) = preprocess(&gray);
        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        // Top padding row normalizes to zero, image rows do not.
        assert_eq!(tensor[[0, 0, 0, 0]], 0.0);
        let inside = letterbox.pad_y as usize + 10;
        let expected = (255.0 - SCRFD_MEAN) / SCRFD_STD;
        assert!((tensor[[0, 1, inside, 320]] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_discover_output_indices_named() {
        let names: Vec<String> = [
            "score_8", "score_16", "score_32", "bbox_8", "bbox_16", "bbox_32", "kps_8", "kps_16",
            "kps_32",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(discover_output_indices(&names), [(0, 3), (1, 4), (2, 5)]);
    }

    #[test]
    fn test_discover_output_indices_shuffled_named() {
        let names: Vec<String> = [
            "bbox_8", "kps_8", "score_8", "bbox_16", "kps_16", "score_16", "bbox_32", "kps_32",
            "score_32",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(discover_output_indices(&names), [(2, 0), (5, 3), (8, 6)]);
    }

    #[test]
    fn test_discover_output_indices_positional_fallback() {
        let names: Vec<String> = (0..9).map(|i: usize| i.to_string()).collect();
        assert_eq!(discover_output_indices(&names), [(0, 3), (1, 4), (2, 5)]);
    }

    #[test]
    fn test_load_missing_model() {
        let err = ScrfdDetector::load(Path::new("/nonexistent/det_10g.onnx"))
            .err()
            .unwrap();
        assert!(matches!(err, DetectorError::ModelNotFound(_)));
    }
}
