//! Timed capture state machine.
//!
//! Captures fire on a wall-clock cadence whether or not a face is visible:
//! two captures per session, then a single completion marker. The state is a
//! plain value threaded through [`CaptureState::step`]; time is always passed
//! in, never read here.

use crate::artifacts::ArtifactSink;
use crate::render::GlyphFrame;
use crate::types::RawFrame;
use std::fmt;
use std::time::{Duration, Instant};

pub const CAPTURE_INTERVAL: Duration = Duration::from_secs(5);

pub const CAPTURES_PER_SESSION: u8 = 2;

pub const DONE_STATUS: &str = "All captures done. Waiting for close...";

/// Out-of-band line announcing a capture or the end of the capture phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleMarker {
    Captured(u8),
    Done,
}

impl LifecycleMarker {
    /// Parse a full protocol line such as `---CAPTURED 2---`.
    pub fn parse(line: &str) -> Option<Self> {
        let inner = line.strip_prefix("---")?.strip_suffix("---")?;
        if inner == "DONE" {
            return Some(Self::Done);
        }
        let n = inner.strip_prefix("CAPTURED ")?.parse().ok()?;
        Some(Self::Captured(n))
    }
}

impl fmt::Display for LifecycleMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Captured(n) => write!(f, "---CAPTURED {n}---"),
            Self::Done => f.write_str("---DONE---"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    /// `completed` captures are behind us; waiting for the next deadline.
    Waiting { completed: u8 },
    /// All captures taken and the done marker emitted. Terminal.
    Done,
}

/// What one scheduler step produced for the stream writer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureOutcome {
    /// Overlay for the first row of this iteration's frame.
    pub status: Option<String>,
    pub markers: Vec<LifecycleMarker>,
}

/// Session-lifetime capture bookkeeping.
///
/// `capture_count` only grows and never exceeds [`CAPTURES_PER_SESSION`];
/// once `done_signal_sent` is set the state never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureState {
    capture_count: u8,
    next_deadline: Instant,
    done_signal_sent: bool,
    interval: Duration,
}

impl CaptureState {
    /// Fresh session state with the first deadline one interval after `start`.
    pub fn new(start: Instant) -> Self {
        Self::with_interval(start, CAPTURE_INTERVAL)
    }

    pub fn with_interval(start: Instant, interval: Duration) -> Self {
        Self {
            capture_count: 0,
            next_deadline: start + interval,
            done_signal_sent: false,
            interval,
        }
    }

    pub fn capture_count(&self) -> u8 {
        self.capture_count
    }

    pub fn next_deadline(&self) -> Instant {
        self.next_deadline
    }

    pub fn done_signal_sent(&self) -> bool {
        self.done_signal_sent
    }

    pub fn phase(&self) -> CapturePhase {
        if self.done_signal_sent {
            CapturePhase::Done
        } else {
            CapturePhase::Waiting {
                completed: self.capture_count,
            }
        }
    }

    pub fn is_done(&self) -> bool {
        self.phase() == CapturePhase::Done
    }

    /// Advance the machine by one loop iteration.
    ///
    /// When the deadline has passed, `raw` and the plain form of `glyphs` are
    /// handed to `sink`. A failed write is logged and still consumes the
    /// capture slot.
    pub fn step<S: ArtifactSink + ?Sized>(
        self,
        now: Instant,
        raw: &RawFrame,
        glyphs: &GlyphFrame,
        sink: &mut S,
    ) -> (Self, CaptureOutcome) {
        let mut next = self;
        let mut outcome = CaptureOutcome::default();

        if self.capture_count >= CAPTURES_PER_SESSION {
            if !self.done_signal_sent {
                next.done_signal_sent = true;
                outcome.markers.push(LifecycleMarker::Done);
                tracing::info!("all captures complete");
            }
            outcome.status = Some(DONE_STATUS.to_string());
            return (next, outcome);
        }

        let index = self.capture_count + 1;
        if now < self.next_deadline {
            let left = self.next_deadline - now;
            outcome.status = Some(format!("Capture {index} in {:.1}s...", left.as_secs_f64()));
            return (next, outcome);
        }

        if let Err(e) = sink.persist(index, raw, &glyphs.plain_text()) {
            tracing::error!(index, error = %e, "failed to persist capture");
        }
        next.capture_count = index;
        next.next_deadline = now + self.interval;
        outcome.markers.push(LifecycleMarker::Captured(index));
        (next, outcome)
    }
}
