use crate::config::Config;
use anyhow::{Context, Result};
use glyphcam_core::artifacts::DirectorySink;
use glyphcam_core::detector::ScrfdDetector;
use glyphcam_core::session::Session;
use glyphcam_hw::Camera;
use std::io::{self, BufWriter};

/// Stream the face-masked glyph feed of one camera to stdout.
///
/// Blocks until the camera stops delivering frames or stdout closes.
pub fn run(camera_index: u32, config: &Config) -> Result<()> {
    let mut camera = Camera::open(camera_index, &config.camera_settings())
        .with_context(|| format!("could not open camera {camera_index}"))?;

    let detector = ScrfdDetector::load(&config.model_path).context("could not load face detector")?;

    tracing::info!(
        camera = camera_index,
        device = %camera.device_path,
        fourcc = %camera.fourcc,
        output_dir = %config.output_dir.display(),
        "streaming"
    );

    let sink = DirectorySink::new(&config.output_dir);
    let out = BufWriter::new(io::stdout().lock());
    let summary = Session::new(config.pipeline_config(), detector, sink, out)
        .run(&mut camera)
        .context("stream aborted")?;

    tracing::info!(
        frames = summary.frames_rendered,
        dropped = summary.frames_dropped,
        captures = summary.captures,
        "stream finished"
    );
    Ok(())
}
