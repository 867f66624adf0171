use crate::types::RawFrame;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    /// One read failed; the next may succeed.
    #[error("transient read failure: {0}")]
    Transient(String),
}

/// A pull-based supplier of camera frames.
pub trait FrameSource {
    /// Block until the next frame is available.
    ///
    /// `Ok(None)` means the source is exhausted and no frame will follow.
    fn read_frame(&mut self) -> Result<Option<RawFrame>, SourceError>;
}

impl<F: FrameSource + ?Sized> FrameSource for Box<F> {
    fn read_frame(&mut self) -> Result<Option<RawFrame>, SourceError> {
        (**self).read_frame()
    }
}
