//! V4L2 camera capture via the `v4l` crate.

use crate::frame::{self, FrameError};
use glyphcam_core::source::{FrameSource, SourceError};
use glyphcam_core::types::RawFrame;
use std::io;
use std::path::Path;
use std::time::Instant;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

const STREAM_BUFFERS: u32 = 4;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
    #[error("device disconnected")]
    Disconnected,
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Requested capture parameters. The driver may choose a different size.
#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub width: u32,
    pub height: u32,
    /// Flip frames left-right (selfie view).
    pub mirror: bool,
    /// Frames to throw away after opening while exposure settles.
    pub warmup_frames: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            mirror: false,
            warmup_frames: 0,
        }
    }
}

/// Negotiated pixel format for the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel).
    Yuyv,
    /// Packed RGB24 (3 bytes/pixel).
    Rgb3,
    /// Motion JPEG, one JPEG per buffer.
    Mjpg,
}

impl PixelFormat {
    fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        match &fourcc.repr {
            b"YUYV" => Some(Self::Yuyv),
            b"RGB3" => Some(Self::Rgb3),
            b"MJPG" => Some(Self::Mjpg),
            _ => None,
        }
    }
}

/// An open, streaming V4L2 camera.
pub struct Camera {
    stream: MmapStream<'static>,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    pub fourcc: FourCC,
    pixel_format: PixelFormat,
    mirror: bool,
}

impl Camera {
    /// Open `/dev/video{index}`.
    pub fn open(index: u32, settings: &CameraSettings) -> Result<Self, CameraError> {
        Self::open_path(&format!("/dev/video{index}"), settings)
    }

    /// Open a V4L2 camera device by path, start streaming and drop the
    /// first `settings.warmup_frames` frames.
    pub fn open_path(device_path: &str, settings: &CameraSettings) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| {
            if e.raw_os_error() == Some(libc::EBUSY) {
                CameraError::DeviceBusy
            } else {
                CameraError::DeviceNotFound(format!("{device_path}: {e}"))
            }
        })?;

        let caps = device.query_caps().map_err(|e| {
            CameraError::CaptureFailed(format!("failed to query capabilities: {e}"))
        })?;

        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        if !caps
            .capabilities
            .contains(v4l::capability::Flags::VIDEO_CAPTURE)
        {
            return Err(CameraError::StreamingNotSupported);
        }

        // Ask for YUYV; accept RGB3 or MJPG if the driver insists.
        let mut fmt = device.format().map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to get format: {e}"))
        })?;
        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = settings.width;
        fmt.height = settings.height;

        let negotiated = device.set_format(&fmt).map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to set format: {e}"))
        })?;

        let fourcc = negotiated.fourcc;
        let pixel_format = PixelFormat::from_fourcc(fourcc).ok_or_else(|| {
            CameraError::FormatNegotiationFailed(format!(
                "unsupported pixel format: {fourcc} (need YUYV, RGB3, or MJPG)"
            ))
        })?;

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            fourcc = %fourcc,
            "negotiated format"
        );

        let stream = MmapStream::with_buffers(&device, BufType::VideoCapture, STREAM_BUFFERS)
            .map_err(|e| {
                CameraError::CaptureFailed(format!("failed to create mmap stream: {e}"))
            })?;

        let mut camera = Self {
            stream,
            width: negotiated.width,
            height: negotiated.height,
            device_path: device_path.to_string(),
            fourcc,
            pixel_format,
            mirror: settings.mirror,
        };
        camera.discard_frames(settings.warmup_frames)?;
        Ok(camera)
    }

    /// Dequeue one buffer and convert it to an RGB frame.
    pub fn capture_frame(&mut self) -> Result<RawFrame, CameraError> {
        let (buf, meta) = self.stream.next().map_err(|e| dequeue_error(&e))?;
        let sequence = meta.sequence;

        let (data, width, height) = match self.pixel_format {
            PixelFormat::Yuyv => (
                frame::yuyv_to_rgb(buf, self.width, self.height)?,
                self.width,
                self.height,
            ),
            PixelFormat::Rgb3 => (
                frame::rgb24_from_buffer(buf, self.width, self.height)?,
                self.width,
                self.height,
            ),
            PixelFormat::Mjpg => frame::decode_mjpeg(buf)?,
        };

        let mut raw = RawFrame {
            data,
            width,
            height,
            timestamp: Instant::now(),
            sequence,
        };
        if self.mirror {
            frame::mirror_horizontal(&mut raw);
        }
        Ok(raw)
    }

    /// Read and drop `count` frames while auto-exposure settles.
    fn discard_frames(&mut self, count: u32) -> Result<(), CameraError> {
        for _ in 0..count {
            self.stream.next().map_err(|e| dequeue_error(&e))?;
        }
        if count > 0 {
            tracing::debug!(count, "discarded warm-up frames");
        }
        Ok(())
    }
}

fn dequeue_error(e: &io::Error) -> CameraError {
    if e.raw_os_error() == Some(libc::ENODEV) {
        CameraError::Disconnected
    } else {
        CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}"))
    }
}

impl FrameSource for Camera {
    fn read_frame(&mut self) -> Result<Option<RawFrame>, SourceError> {
        match self.capture_frame() {
            Ok(frame) => Ok(Some(frame)),
            Err(CameraError::Disconnected) => {
                tracing::warn!(device = %self.device_path, "camera disconnected");
                Ok(None)
            }
            Err(e) => Err(SourceError::Transient(e.to_string())),
        }
    }
}
