//! The per-frame pipeline and the session loop that drives it.
//!
//! Each iteration: grid check → downscale → locate → render → capture step →
//! stream write. Everything is synchronous; one frame is fully handled before
//! the next is read.

use crate::artifacts::ArtifactSink;
use crate::downscale::{downscale, DownscaleError};
use crate::geometry::{same_aspect, GeometryError, GridDimensions, DEFAULT_COLUMNS};
use crate::locator::{FaceDetect, FaceLocator, FaceMask};
use crate::render::{render, GlyphFrame};
use crate::schedule::{CaptureState, LifecycleMarker, CAPTURE_INTERVAL};
use crate::source::FrameSource;
use crate::stream::StreamWriter;
use crate::types::RawFrame;
use std::io::{self, Write};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Consecutive transient read failures tolerated before giving up on a source.
pub const DEFAULT_MAX_READ_FAILURES: u32 = 30;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Glyph grid width.
    pub columns: u32,
    pub capture_interval: Duration,
    pub max_read_failures: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            columns: DEFAULT_COLUMNS,
            capture_interval: CAPTURE_INTERVAL,
            max_read_failures: DEFAULT_MAX_READ_FAILURES,
        }
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Downscale(#[from] DownscaleError),
    #[error("frame stream closed: {0}")]
    Output(#[source] io::Error),
}

impl SessionError {
    /// Errors that cost one frame but leave the session running.
    pub fn is_frame_local(&self) -> bool {
        !matches!(self, SessionError::Output(_))
    }
}

/// What happened to one frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub face_found: bool,
    pub markers: Vec<LifecycleMarker>,
    pub status: Option<String>,
    pub glyphs: GlyphFrame,
}

/// Per-session processing state, built once before the first iteration.
pub struct Pipeline<D, S, W: Write> {
    columns: u32,
    grid: GridDimensions,
    source_dims: (u32, u32),
    state: CaptureState,
    locator: FaceLocator<D>,
    sink: S,
    writer: StreamWriter<W>,
}

impl<D: FaceDetect, S: ArtifactSink, W: Write> Pipeline<D, S, W> {
    /// Size the grid for `source_dims` and start the capture clock at `start`.
    pub fn new(
        source_dims: (u32, u32),
        start: Instant,
        config: &PipelineConfig,
        detector: D,
        sink: S,
        out: W,
    ) -> Result<Self, SessionError> {
        let grid = GridDimensions::compute(source_dims.0, source_dims.1, config.columns)?;
        tracing::info!(
            frame_width = source_dims.0,
            frame_height = source_dims.1,
            cols = grid.cols,
            rows = grid.rows,
            "glyph grid sized"
        );

        Ok(Self {
            columns: config.columns,
            grid,
            source_dims,
            state: CaptureState::with_interval(start, config.capture_interval),
            locator: FaceLocator::new(detector),
            sink,
            writer: StreamWriter::new(out),
        })
    }

    pub fn grid(&self) -> GridDimensions {
        self.grid
    }

    pub fn capture_state(&self) -> CaptureState {
        self.state
    }

    pub fn into_output(self) -> W {
        self.writer.into_inner()
    }

    /// Run one frame through the pipeline and write it to the stream.
    ///
    /// Lifecycle markers produced by this frame are written before its body.
    /// A detector failure is logged and the frame renders without a face, so
    /// the capture cadence never depends on inference.
    pub fn process_frame(
        &mut self,
        frame: &RawFrame,
        now: Instant,
    ) -> Result<FrameReport, SessionError> {
        let dims = (frame.width, frame.height);
        if dims != self.source_dims && !same_aspect(dims, self.source_dims) {
            let grid = GridDimensions::compute(dims.0, dims.1, self.columns)?;
            tracing::info!(
                frame_width = dims.0,
                frame_height = dims.1,
                rows = grid.rows,
                "source aspect changed, resizing glyph grid"
            );
            self.grid = grid;
        }
        self.source_dims = dims;

        let scaled = downscale(frame, self.grid)?;
        let mask = match self.locator.locate(&scaled.luma) {
            Ok(mask) => mask,
            Err(e) => {
                tracing::error!(
                    sequence = frame.sequence,
                    error = %e,
                    "face detection failed, rendering without a face"
                );
                FaceMask::empty(self.grid)
            }
        };
        let glyphs = render(&scaled, &mask);

        let (state, outcome) = self.state.step(now, frame, &glyphs, &mut self.sink);
        self.state = state;

        for marker in &outcome.markers {
            self.writer
                .write_marker(*marker)
                .map_err(SessionError::Output)?;
        }
        self.writer
            .write_frame(&glyphs, outcome.status.as_deref())
            .map_err(SessionError::Output)?;

        tracing::trace!(
            sequence = frame.sequence,
            face = mask.face_found(),
            captures = self.state.capture_count(),
            "frame written"
        );

        Ok(FrameReport {
            face_found: mask.face_found(),
            markers: outcome.markers,
            status: outcome.status,
            glyphs,
        })
    }
}

/// Totals for a finished session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub frames_rendered: u64,
    pub frames_dropped: u64,
    pub read_failures: u64,
    pub captures: u8,
    pub done: bool,
}

/// A complete run: pulls frames until the source is exhausted.
pub struct Session<D, S, W> {
    config: PipelineConfig,
    detector: D,
    sink: S,
    out: W,
}

impl<D: FaceDetect, S: ArtifactSink, W: Write> Session<D, S, W> {
    pub fn new(config: PipelineConfig, detector: D, sink: S, out: W) -> Self {
        Self {
            config,
            detector,
            sink,
            out,
        }
    }

    /// Drive the loop until `source` ends.
    ///
    /// The scheduler clock is each frame's capture timestamp. Per-frame
    /// failures are logged and the frame dropped; only a degenerate first
    /// frame or a closed output ends the session with an error.
    pub fn run<F: FrameSource + ?Sized>(
        self,
        source: &mut F,
    ) -> Result<SessionSummary, SessionError> {
        let mut summary = SessionSummary::default();
        let mut reader = FrameReader::new(self.config.max_read_failures);

        let Some(mut frame) = reader.next(source, &mut summary) else {
            tracing::warn!("source ended before the first frame");
            return Ok(summary);
        };

        let mut pipeline = Pipeline::new(
            (frame.width, frame.height),
            frame.timestamp,
            &self.config,
            self.detector,
            self.sink,
            self.out,
        )?;

        loop {
            match pipeline.process_frame(&frame, frame.timestamp) {
                Ok(_) => summary.frames_rendered += 1,
                Err(e) if e.is_frame_local() => {
                    tracing::warn!(sequence = frame.sequence, error = %e, "frame dropped");
                    summary.frames_dropped += 1;
                }
                Err(e) => return Err(e),
            }

            match reader.next(source, &mut summary) {
                Some(next) => frame = next,
                None => break,
            }
        }

        let state = pipeline.capture_state();
        summary.captures = state.capture_count();
        summary.done = state.is_done();
        tracing::info!(
            rendered = summary.frames_rendered,
            dropped = summary.frames_dropped,
            captures = summary.captures,
            "session ended"
        );
        Ok(summary)
    }
}

/// Pulls frames, absorbing transient failures up to a limit.
struct FrameReader {
    max_failures: u32,
    consecutive: u32,
}

impl FrameReader {
    fn new(max_failures: u32) -> Self {
        Self {
            max_failures,
            consecutive: 0,
        }
    }

    fn next<F: FrameSource + ?Sized>(
        &mut self,
        source: &mut F,
        summary: &mut SessionSummary,
    ) -> Option<RawFrame> {
        loop {
            match source.read_frame() {
                Ok(Some(frame)) => {
                    self.consecutive = 0;
                    return Some(frame);
                }
                Ok(None) => {
                    tracing::info!("frame source exhausted");
                    return None;
                }
                Err(e) => {
                    summary.read_failures += 1;
                    self.consecutive += 1;
                    if self.consecutive > self.max_failures {
                        tracing::error!(
                            failures = self.consecutive,
                            "too many consecutive read failures, treating source as exhausted"
                        );
                        return None;
                    }
                    tracing::warn!(error = %e, "frame read failed, retrying");
                }
            }
        }
    }
}
