//! glyphcam-core: face-masked glyph rendering of camera frames.
//!
//! Frames are downscaled to a terminal grid, masked to the dominant face,
//! rendered as true-color glyphs and streamed line by line, while a timed
//! scheduler persists two snapshots per session.

pub mod artifacts;
pub mod detector;
pub mod downscale;
pub mod geometry;
pub mod locator;
pub mod render;
pub mod schedule;
pub mod session;
pub mod source;
pub mod stream;
pub mod types;

pub use artifacts::{ArtifactSink, DirectorySink};
pub use detector::ScrfdDetector;
pub use geometry::GridDimensions;
pub use locator::{FaceDetect, FaceMask};
pub use render::GlyphFrame;
pub use schedule::{CaptureState, LifecycleMarker};
pub use session::{Pipeline, PipelineConfig, Session, SessionSummary};
pub use source::{FrameSource, SourceError};
pub use types::{FaceBox, RawFrame};
