//! Terminal viewer: runs `glyphcam stream` as a child process and repaints
//! its frames in place.

use anyhow::{Context, Result};
use glyphcam_core::schedule::LifecycleMarker;
use glyphcam_core::stream::{parse_line, StreamLine};
use std::io::Write as _;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

const HIDE_CURSOR: &str = "\x1b[?25l";
const SHOW_CURSOR: &str = "\x1b[?25h";
const CURSOR_HOME: &str = "\x1b[H";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Countdown {
    Continue,
    Expired,
}

/// Frame assembly and auto-close countdown, independent of any I/O.
#[derive(Debug)]
pub struct Viewer {
    frame: String,
    close_delay: u64,
    remaining: Option<u64>,
}

impl Viewer {
    pub fn new(close_delay: u64) -> Self {
        Self {
            frame: String::new(),
            close_delay,
            remaining: None,
        }
    }

    /// Seconds left before closing, once the capture phase is over.
    pub fn remaining(&self) -> Option<u64> {
        self.remaining
    }

    /// Feed one stream line. Returns text to write to the terminal, if any.
    pub fn handle_line(&mut self, line: &str) -> Option<String> {
        match parse_line(line) {
            StreamLine::Row(row) => {
                self.frame.push_str(row);
                self.frame.push('\n');
                None
            }
            StreamLine::FrameEnd => {
                let mut out = String::with_capacity(CURSOR_HOME.len() + self.frame.len() + 32);
                out.push_str(CURSOR_HOME);
                out.push_str(&self.frame);
                if let Some(n) = self.remaining {
                    out.push_str(&format!("\n\nClosing in {n} seconds..."));
                }
                self.frame.clear();
                Some(out)
            }
            StreamLine::Marker(LifecycleMarker::Captured(_)) => {
                Some("\n\n*** IMAGE CAPTURED! ***\n".to_string())
            }
            StreamLine::Marker(LifecycleMarker::Done) => {
                if self.remaining.is_some() {
                    return None;
                }
                self.remaining = Some(self.close_delay);
                Some(format!(
                    "\n\nAll images captured. Auto-closing in {} seconds...\n",
                    self.close_delay
                ))
            }
        }
    }

    /// Advance the countdown by one second.
    pub fn tick(&mut self) -> Countdown {
        match self.remaining {
            Some(n) => {
                let left = n.saturating_sub(1);
                self.remaining = Some(left);
                if left == 0 {
                    Countdown::Expired
                } else {
                    Countdown::Continue
                }
            }
            None => Countdown::Continue,
        }
    }
}

/// Shows the cursor again however the viewer exits.
struct CursorGuard;

impl CursorGuard {
    fn hide() -> Self {
        print!("{HIDE_CURSOR}");
        let _ = std::io::stdout().flush();
        Self
    }
}

impl Drop for CursorGuard {
    fn drop(&mut self) {
        print!("{SHOW_CURSOR}");
        let _ = std::io::stdout().flush();
    }
}

pub async fn run(camera_index: u32, close_delay_secs: u64) -> Result<()> {
    let exe = std::env::current_exe().context("could not locate the glyphcam executable")?;

    println!("Launching with Camera {camera_index}...");
    let mut child = Command::new(exe)
        .arg("stream")
        .arg(camera_index.to_string())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .context("could not start the stream process")?;

    let stdout = child
        .stdout
        .take()
        .context("stream process has no stdout")?;
    let mut lines = BufReader::new(stdout).lines();

    let _cursor = CursorGuard::hide();
    let mut out = tokio::io::stdout();
    let mut viewer = Viewer::new(close_delay_secs);

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    // The first tick completes immediately.
    ticker.tick().await;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    println!("Starting face stream... (Press Ctrl+C to quit)");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read the frame stream")? else {
                    tracing::info!("frame stream ended");
                    break;
                };
                if let Some(text) = viewer.handle_line(&line) {
                    out.write_all(text.as_bytes()).await?;
                    out.flush().await?;
                }
            }
            _ = ticker.tick() => {
                if viewer.tick() == Countdown::Expired {
                    out.write_all(b"\n\nTimer expired. Shutting down...\n").await?;
                    out.flush().await?;
                    break;
                }
            }
            _ = &mut ctrl_c => {
                tracing::debug!("interrupted");
                break;
            }
        }
    }

    if let Err(e) = child.kill().await {
        tracing::debug!(error = %e, "stream process already gone");
    }
    Ok(())
}
