//! Capture artifact persistence: the raw frame as a JPEG and the plain glyph
//! rendering as text, both named by capture number.

use crate::types::RawFrame;
use image::ImageFormat;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ARTIFACT_PREFIX: &str = "captured_face";

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("frame {width}x{height} does not hold a full RGB image")]
    MalformedFrame { width: u32, height: u32 },
    #[error("failed to write image {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to write glyph text {}: {source}", path.display())]
    Text {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("neither artifact was written: {image}; {text}")]
    Both {
        image: Box<PersistError>,
        text: Box<PersistError>,
    },
}

/// Where one capture's artifacts were written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub image: PathBuf,
    pub text: PathBuf,
}

/// Destination for capture artifacts.
pub trait ArtifactSink {
    /// Persist capture number `index` (1-based).
    fn persist(
        &mut self,
        index: u8,
        raw: &RawFrame,
        plain_text: &str,
    ) -> Result<ArtifactPaths, PersistError>;
}

/// Writes `captured_face_{n}.jpg` and `captured_face_{n}.txt` into a directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn paths_for(&self, index: u8) -> ArtifactPaths {
        ArtifactPaths {
            image: self.dir.join(format!("{ARTIFACT_PREFIX}_{index}.jpg")),
            text: self.dir.join(format!("{ARTIFACT_PREFIX}_{index}.txt")),
        }
    }
}

impl ArtifactSink for DirectorySink {
    fn persist(
        &mut self,
        index: u8,
        raw: &RawFrame,
        plain_text: &str,
    ) -> Result<ArtifactPaths, PersistError> {
        let paths = self.paths_for(index);

        // Each artifact is attempted even when the other one fails.
        let image = write_image(&paths.image, raw);
        let text = fs::write(&paths.text, plain_text).map_err(|source| PersistError::Text {
            path: paths.text.clone(),
            source,
        });

        match (image, text) {
            (Ok(()), Ok(())) => {}
            (Err(e), Ok(())) | (Ok(()), Err(e)) => return Err(e),
            (Err(image), Err(text)) => {
                return Err(PersistError::Both {
                    image: Box::new(image),
                    text: Box::new(text),
                })
            }
        }

        tracing::info!(
            index,
            image = %paths.image.display(),
            text = %paths.text.display(),
            "capture persisted"
        );
        Ok(paths)
    }
}

fn write_image(path: &Path, raw: &RawFrame) -> Result<(), PersistError> {
    let image = raw.to_rgb_image().ok_or(PersistError::MalformedFrame {
        width: raw.width,
        height: raw.height,
    })?;
    image
        .save_with_format(path, ImageFormat::Jpeg)
        .map_err(|source| PersistError::Image {
            path: path.to_path_buf(),
            source,
        })
}
