//! glyphcam-hw: V4L2 camera capture into packed RGB frames.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, CameraSettings, PixelFormat};
