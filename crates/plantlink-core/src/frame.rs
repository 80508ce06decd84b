//! Line protocol spoken by the upstream sensor MCU.
//!
//! The stream is a sequence of newline-terminated tokens. A marker line
//! (`=`) announces exactly three value lines in fixed order: soil, light,
//! pump. Any other token is logged and dropped. Nothing is remembered
//! between drains, so a frame cut short has to start over at a new marker.

use core::fmt::Debug;

use heapless::String;
use log::{info, warn};

use crate::validate::FieldKind;

/// Token announcing the start of a frame.
pub const MARKER: &str = "=";
/// Longest line kept; the rest of an overlong line is discarded.
pub const LINE_BYTES: usize = 32;

pub type Line = String<LINE_BYTES>;

/// Byte stream split into newline-terminated lines.
pub trait LineSource {
    type Error: Debug;

    /// True while at least one byte is buffered.
    fn bytes_available(&mut self) -> bool;

    /// Reads up to the next `\n` into `line`, terminator excluded.
    ///
    /// Blocks until the terminator arrives or the source's own line
    /// timeout elapses. Bytes beyond [`LINE_BYTES`] are dropped.
    fn read_line(&mut self, line: &mut Line) -> Result<(), Self::Error>;
}

/// Value lines of one frame, whitespace already trimmed.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RawFrame {
    pub soil: Line,
    pub light: Line,
    pub pump: Line,
}

impl RawFrame {
    pub fn field(&self, kind: FieldKind) -> &str {
        match kind {
            FieldKind::Soil => &self.soil,
            FieldKind::Light => &self.light,
            FieldKind::Pump => &self.pump,
        }
    }

    fn field_mut(&mut self, kind: FieldKind) -> &mut Line {
        match kind {
            FieldKind::Soil => &mut self.soil,
            FieldKind::Light => &mut self.light,
            FieldKind::Pump => &mut self.pump,
        }
    }
}

/// Why a drain stopped.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DrainEnd {
    /// No more buffered bytes.
    Idle,
    /// Reading a key line failed.
    KeyReadFailed,
    /// The frame limit was reached; later lines stay buffered.
    FrameLimit,
    /// A marker was seen but the named value line never arrived.
    Abandoned(FieldKind),
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ReaderStats {
    pub frames: u32,
    pub unexpected_keys: u32,
    pub abandoned_frames: u32,
}

/// Reassembles frames from a [`LineSource`].
#[derive(Debug, Default)]
pub struct FrameReader {
    stats: ReaderStats,
}

impl FrameReader {
    pub const fn new() -> Self {
        Self {
            stats: ReaderStats {
                frames: 0,
                unexpected_keys: 0,
                abandoned_frames: 0,
            },
        }
    }

    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// Consumes lines while bytes are buffered, handing every complete
    /// frame to `on_frame`.
    pub fn drain<S, F>(&mut self, source: &mut S, on_frame: F) -> DrainEnd
    where
        S: LineSource,
        F: FnMut(&RawFrame),
    {
        self.drain_up_to(source, u32::MAX, on_frame)
    }

    /// Like [`FrameReader::drain`], but stops before the next key once
    /// `max_frames` frames were handed out.
    pub fn drain_up_to<S, F>(
        &mut self,
        source: &mut S,
        max_frames: u32,
        mut on_frame: F,
    ) -> DrainEnd
    where
        S: LineSource,
        F: FnMut(&RawFrame),
    {
        let mut key = Line::new();
        let mut emitted = 0u32;

        while source.bytes_available() {
            if emitted >= max_frames {
                return DrainEnd::FrameLimit;
            }

            if let Err(err) = source.read_line(&mut key) {
                warn!("frame: key read failed: {:?}", err);
                return DrainEnd::KeyReadFailed;
            }

            let token = key.trim();
            if token != MARKER {
                self.stats.unexpected_keys = self.stats.unexpected_keys.saturating_add(1);
                info!("frame: unexpected key: {}", token);
                continue;
            }

            match read_values(source) {
                Ok(frame) => {
                    self.stats.frames = self.stats.frames.saturating_add(1);
                    emitted += 1;
                    on_frame(&frame);
                }
                Err(missing) => {
                    self.stats.abandoned_frames = self.stats.abandoned_frames.saturating_add(1);
                    warn!(
                        "frame: abandoned after marker, {} line missing",
                        missing.label()
                    );
                    return DrainEnd::Abandoned(missing);
                }
            }
        }

        DrainEnd::Idle
    }
}

fn read_values<S: LineSource>(source: &mut S) -> Result<RawFrame, FieldKind> {
    let mut frame = RawFrame::default();
    let mut line = Line::new();

    for kind in FieldKind::ALL {
        if let Err(err) = source.read_line(&mut line) {
            warn!("frame: {} read failed: {:?}", kind.label(), err);
            return Err(kind);
        }
        let slot = frame.field_mut(kind);
        slot.clear();
        // Trimmed text is never longer than the line it came from.
        let _ = slot.push_str(line.trim());
    }

    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedLines<'a> {
        lines: &'a [&'a str],
        cursor: usize,
        /// Reads fail from this index on while bytes still look available.
        fail_from: Option<usize>,
    }

    impl<'a> ScriptedLines<'a> {
        fn new(lines: &'a [&'a str]) -> Self {
            Self {
                lines,
                cursor: 0,
                fail_from: None,
            }
        }

        fn failing_from(lines: &'a [&'a str], index: usize) -> Self {
            Self {
                fail_from: Some(index),
                ..Self::new(lines)
            }
        }
    }

    impl LineSource for ScriptedLines<'_> {
        type Error = &'static str;

        fn bytes_available(&mut self) -> bool {
            self.cursor < self.lines.len()
        }

        fn read_line(&mut self, line: &mut Line) -> Result<(), Self::Error> {
            if self.fail_from.is_some_and(|index| self.cursor >= index) {
                return Err("framing error");
            }
            let Some(next) = self.lines.get(self.cursor) else {
                return Err("timeout");
            };
            self.cursor += 1;
            line.clear();
            line.push_str(next).map_err(|_| "overlong")
        }
    }

    fn collect(lines: &[&str]) -> (Vec<RawFrame>, DrainEnd, ReaderStats) {
        let mut source = ScriptedLines::new(lines);
        let mut reader = FrameReader::new();
        let mut frames = Vec::new();
        let end = reader.drain(&mut source, |frame| frames.push(frame.clone()));
        (frames, end, reader.stats())
    }

    #[test]
    fn noise_before_marker_is_skipped() {
        let (frames, end, stats) = collect(&["noise", "=", "80", "200", "1"]);

        assert_eq!(end, DrainEnd::Idle);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].field(FieldKind::Soil), "80");
        assert_eq!(frames[0].field(FieldKind::Light), "200");
        assert_eq!(frames[0].field(FieldKind::Pump), "1");
        assert_eq!(stats.unexpected_keys, 1);
    }

    #[test]
    fn empty_value_lines_are_kept_as_empty_strings() {
        let (frames, _, _) = collect(&["=", "", "300", "0"]);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].soil.as_str(), "");
        assert_eq!(frames[0].light.as_str(), "300");
        assert_eq!(frames[0].pump.as_str(), "0");
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        let (frames, _, stats) = collect(&[" = \r", "\t42\r", "7 ", " 1"]);

        assert_eq!(stats.unexpected_keys, 0);
        assert_eq!(frames[0].soil.as_str(), "42");
        assert_eq!(frames[0].light.as_str(), "7");
        assert_eq!(frames[0].pump.as_str(), "1");
    }

    #[test]
    fn truncated_frame_is_abandoned_without_emitting() {
        let (frames, end, stats) = collect(&["=", "80", "200"]);

        assert!(frames.is_empty());
        assert_eq!(end, DrainEnd::Abandoned(FieldKind::Pump));
        assert_eq!(stats.abandoned_frames, 1);
    }

    #[test]
    fn marker_must_reappear_after_an_abandoned_frame() {
        let mut reader = FrameReader::new();
        let mut frames = Vec::new();

        let mut first = ScriptedLines::new(&["=", "80"]);
        reader.drain(&mut first, |frame| frames.push(frame.clone()));

        // The tail of the broken frame arrives next cycle without a marker.
        let mut second = ScriptedLines::new(&["200", "1", "=", "10", "20", "0"]);
        reader.drain(&mut second, |frame| frames.push(frame.clone()));

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].soil.as_str(), "10");
        assert_eq!(reader.stats().unexpected_keys, 2);
    }

    #[test]
    fn back_to_back_frames_are_all_emitted() {
        let (frames, end, stats) = collect(&["=", "1", "2", "0", "=", "3", "4", "1"]);

        assert_eq!(end, DrainEnd::Idle);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].soil.as_str(), "3");
        assert_eq!(stats.frames, 2);
    }

    #[test]
    fn value_line_equal_to_marker_is_data() {
        let (frames, _, _) = collect(&["=", "=", "5", "1"]);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].soil.as_str(), "=");
    }

    #[test]
    fn key_read_error_ends_the_drain() {
        let mut source = ScriptedLines::failing_from(&["=", "1", "2", "0", "noise", "="], 4);
        let mut reader = FrameReader::new();
        let mut frames = Vec::new();

        let end = reader.drain(&mut source, |frame| frames.push(frame.clone()));

        assert_eq!(end, DrainEnd::KeyReadFailed);
        assert_eq!(frames.len(), 1);
        assert!(source.bytes_available());
        assert_eq!(reader.stats().unexpected_keys, 0);
    }

    #[test]
    fn frame_limit_leaves_the_rest_buffered() {
        let lines = ["=", "1", "2", "0", "=", "3", "4", "1", "=", "5", "6", "0"];
        let mut source = ScriptedLines::new(&lines);
        let mut reader = FrameReader::new();
        let mut frames = Vec::new();

        let end = reader.drain_up_to(&mut source, 2, |frame| frames.push(frame.clone()));
        assert_eq!(end, DrainEnd::FrameLimit);
        assert_eq!(frames.len(), 2);

        let end = reader.drain_up_to(&mut source, 2, |frame| frames.push(frame.clone()));
        assert_eq!(end, DrainEnd::Idle);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2].soil.as_str(), "5");
    }

    #[test]
    fn zero_limit_reads_nothing() {
        let mut source = ScriptedLines::new(&["=", "1", "2", "0"]);
        let mut reader = FrameReader::new();

        let end = reader.drain_up_to(&mut source, 0, |_| panic!("no frame expected"));

        assert_eq!(end, DrainEnd::FrameLimit);
        assert_eq!(source.cursor, 0);
    }
}
