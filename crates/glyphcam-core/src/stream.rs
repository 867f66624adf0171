//! Line-oriented frame stream: producer side ([`StreamWriter`]) and the
//! shared line grammar ([`parse_line`]) used by consumers.
//!
//! A frame is `rows` lines followed by [`FRAME_DELIMITER`]. Lifecycle
//! markers travel on their own lines between frames.

use crate::render::{true_color, GlyphFrame, COLOR_RESET};
use crate::schedule::LifecycleMarker;
use std::io::{self, Write};

pub const FRAME_DELIMITER: &str = "---FRAME---";

/// Status overlays are drawn in yellow.
pub const STATUS_COLOR: [u8; 3] = [255, 255, 0];

/// Serializes frames and markers onto a byte sink, flushing after every frame.
pub struct StreamWriter<W: Write> {
    out: W,
}

impl<W: Write> StreamWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn write_marker(&mut self, marker: LifecycleMarker) -> io::Result<()> {
        writeln!(self.out, "{marker}")
    }

    /// Write one frame. When `status` is given it replaces the first row.
    pub fn write_frame(&mut self, frame: &GlyphFrame, status: Option<&str>) -> io::Result<()> {
        for (i, row) in frame.colored_rows().iter().enumerate() {
            match status {
                Some(text) if i == 0 => writeln!(self.out, "{}", status_line(text))?,
                _ => writeln!(self.out, "{row}")?,
            }
        }
        writeln!(self.out, "{FRAME_DELIMITER}")?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn status_line(text: &str) -> String {
    let mut line = String::with_capacity(text.len() + 24);
    // Writing into a String cannot fail.
    let _ = true_color(&mut line, STATUS_COLOR);
    line.push_str(text);
    line.push_str(COLOR_RESET);
    line
}

/// One line of the stream as seen by a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamLine<'a> {
    Row(&'a str),
    FrameEnd,
    Marker(LifecycleMarker),
}

/// Classify a line (without its trailing newline).
pub fn parse_line(line: &str) -> StreamLine<'_> {
    if line == FRAME_DELIMITER {
        return StreamLine::FrameEnd;
    }
    match LifecycleMarker::parse(line) {
        Some(marker) => StreamLine::Marker(marker),
        None => StreamLine::Row(line),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GridDimensions;

    fn lines(bytes: &[u8]) -> Vec<String> {
        String::from_utf8(bytes.to_vec())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_frame_layout_without_status() {
        let frame = GlyphFrame::blank(GridDimensions { cols: 3, rows: 2 });
        let mut writer = StreamWriter::new(Vec::new());
        writer.write_frame(&frame, None).unwrap();

        let out = lines(&writer.into_inner());
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], format!("   {COLOR_RESET}"));
        assert_eq!(out[2], FRAME_DELIMITER);
    }

    #[test]
    fn test_status_replaces_first_row() {
        let frame = GlyphFrame::blank(GridDimensions { cols: 3, rows: 2 });
        let mut writer = StreamWriter::new(Vec::new());
        writer.write_frame(&frame, Some("Capture 1 in 4.0s...")).unwrap();

        let out = lines(&writer.into_inner());
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], "\x1b[38;2;255;255;0mCapture 1 in 4.0s...\x1b[0m");
        assert_eq!(out[1], format!("   {COLOR_RESET}"));
    }

    #[test]
    fn test_markers_are_own_lines() {
        let frame = GlyphFrame::blank(GridDimensions { cols: 1, rows: 1 });
        let mut writer = StreamWriter::new(Vec::new());
        writer.write_marker(LifecycleMarker::Captured(2)).unwrap();
        writer.write_frame(&frame, None).unwrap();
        writer.write_marker(LifecycleMarker::Done).unwrap();

        let out = lines(&writer.into_inner());
        assert_eq!(out[0], "---CAPTURED 2---");
        assert_eq!(out[2], FRAME_DELIMITER);
        assert_eq!(out[3], "---DONE---");
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("---FRAME---"), StreamLine::FrameEnd);
        assert_eq!(
            parse_line("---CAPTURED 1---"),
            StreamLine::Marker(LifecycleMarker::Captured(1))
        );
        assert_eq!(
            parse_line("---DONE---"),
            StreamLine::Marker(LifecycleMarker::Done)
        );
        assert_eq!(parse_line("  @@#  "), StreamLine::Row("  @@#  "));
        assert_eq!(parse_line(""), StreamLine::Row(""));
    }

    #[test]
    fn test_writer_output_parses_back() {
        let frame = GlyphFrame::blank(GridDimensions { cols: 4, rows: 3 });
        let mut writer = StreamWriter::new(Vec::new());
        writer.write_marker(LifecycleMarker::Captured(1)).unwrap();
        writer.write_frame(&frame, Some("status")).unwrap();

        let out = lines(&writer.into_inner());
        let parsed: Vec<StreamLine<'_>> = out.iter().map(|l| parse_line(l)).collect();
        assert_eq!(parsed[0], StreamLine::Marker(LifecycleMarker::Captured(1)));
        assert!(matches!(parsed[1], StreamLine::Row(_)));
        assert!(matches!(parsed[3], StreamLine::Row(_)));
        assert_eq!(parsed[4], StreamLine::FrameEnd);
    }
}
