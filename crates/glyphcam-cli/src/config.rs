use glyphcam_core::geometry::DEFAULT_COLUMNS;
use glyphcam_core::session::{PipelineConfig, DEFAULT_MAX_READ_FAILURES};
use glyphcam_hw::CameraSettings;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Runtime configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// SCRFD ONNX model file.
    pub model_path: PathBuf,
    /// Directory that receives `captured_face_{n}.*`.
    pub output_dir: PathBuf,
    /// Glyph grid width.
    pub columns: u32,
    pub capture_interval_secs: u64,
    /// Requested camera resolution; the driver may pick another.
    pub frame_width: u32,
    pub frame_height: u32,
    pub mirror: bool,
    /// Frames discarded after opening the camera (AE/AGC settling).
    pub warmup_frames: u32,
    pub max_read_failures: u32,
    /// Seconds `watch` keeps the last frames up after all captures are done.
    pub close_delay_secs: u64,
}

impl Config {
    /// Load configuration from `GLYPHCAM_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let model_path = var("GLYPHCAM_MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir(&var).join("models/det_10g.onnx"));

        Self {
            model_path,
            output_dir: var("GLYPHCAM_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            columns: parse_or(var("GLYPHCAM_COLUMNS").filter(|v| v.trim() != "0"), DEFAULT_COLUMNS),
            capture_interval_secs: parse_or(var("GLYPHCAM_CAPTURE_INTERVAL_SECS"), 5),
            frame_width: parse_or(var("GLYPHCAM_FRAME_WIDTH"), 640),
            frame_height: parse_or(var("GLYPHCAM_FRAME_HEIGHT"), 480),
            mirror: var("GLYPHCAM_MIRROR").is_some_and(|v| v != "0"),
            warmup_frames: parse_or(var("GLYPHCAM_WARMUP_FRAMES"), 0),
            max_read_failures: parse_or(var("GLYPHCAM_MAX_READ_FAILURES"), DEFAULT_MAX_READ_FAILURES),
            close_delay_secs: parse_or(var("GLYPHCAM_CLOSE_DELAY_SECS"), 5),
        }
    }

    pub fn camera_settings(&self) -> CameraSettings {
        CameraSettings {
            width: self.frame_width,
            height: self.frame_height,
            mirror: self.mirror,
            warmup_frames: self.warmup_frames,
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            columns: self.columns,
            capture_interval: Duration::from_secs(self.capture_interval_secs),
            max_read_failures: self.max_read_failures,
        }
    }
}

/// `$XDG_DATA_HOME/glyphcam`, falling back to `~/.local/share/glyphcam`.
fn data_dir(var: &impl Fn(&str) -> Option<String>) -> PathBuf {
    var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("glyphcam")
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}
