//! Picks the lyric line that is audible at a playback position.

use super::parser::TimedLyricLine;

/// Default compensation for output-device buffering, in seconds.
pub const DEFAULT_AUDIO_LATENCY: f64 = 0.45;

/// Index of the line current at `position`, or `None` before the first line.
///
/// The position is shifted back by `audio_latency` so a line lights up when
/// it is heard rather than when it is decoded. Scans from the end: the result
/// is the greatest index whose time is `<=` the shifted position.
pub fn select(lines: &[TimedLyricLine], position: f64, audio_latency: f64) -> Option<usize> {
    let target = position - audio_latency;
    lines.iter().rposition(|line| line.time <= target)
}
