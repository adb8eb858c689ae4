//! LRC format parser
//!
//! Parses synchronized lyrics in LRC format:
//! [mm:ss.xx] Lyrics line here
//!
//! Entries whose timestamps fall within 50 ms of each other are folded into
//! one line: the first text is the lyric, the second its translation and the
//! third its transliteration.
//!
//! Example:
//! [00:12.34] Hello world
//! [00:12.34] Bonjour le monde
//! [00:15.00] Another line

/// Entries closer than this (in milliseconds) belong to the same line.
const MERGE_WINDOW_MS: u64 = 50;

/// A single line of lyrics with timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct TimedLyricLine {
    /// Seconds from the start of the track
    pub time: f64,
    pub text: String,
    pub translation: Option<String>,
    pub transliteration: Option<String>,
}

/// Parse LRC formatted lyrics into timed lines, ascending by time.
///
/// Lines without a timestamp tag (metadata such as `[ti:Title]`, plain
/// text) are ignored. An empty result means "no synced lyrics"; callers
/// track "not loaded yet" separately.
pub fn parse(content: &str) -> Vec<TimedLyricLine> {
    let mut entries: Vec<(u64, String)> = Vec::new();

    for line in content.lines() {
        let Some((stamps, text)) = parse_timed_line(line) else {
            continue;
        };
        if text.is_empty() {
            continue;
        }
        entries.extend(stamps.into_iter().map(|ms| (ms, text.clone())));
    }

    // Stable, so entries sharing a timestamp keep file order.
    entries.sort_by_key(|(ms, _)| *ms);

    let mut lines = Vec::new();
    let mut group: Option<(u64, Vec<String>)> = None;

    for (ms, text) in entries {
        if let Some((start, texts)) = group.as_mut()
            && ms - *start < MERGE_WINDOW_MS
        {
            texts.push(text);
            continue;
        }
        if let Some((start, texts)) = group.replace((ms, vec![text])) {
            lines.push(group_to_line(start, texts));
        }
    }
    if let Some((start, texts)) = group {
        lines.push(group_to_line(start, texts));
    }

    lines
}

fn group_to_line(start_ms: u64, texts: Vec<String>) -> TimedLyricLine {
    let mut texts = texts.into_iter();
    TimedLyricLine {
        time: start_ms as f64 / 1000.0,
        text: texts.next().unwrap_or_default(),
        translation: texts.next(),
        transliteration: texts.next(),
    }
}

/// Extract every `[mm:ss.xx]` tag in a line and the text left over once the
/// tags are removed. Returns `None` when the line carries no timestamp.
fn parse_timed_line(line: &str) -> Option<(Vec<u64>, String)> {
    let mut stamps = Vec::new();
    let mut text = String::with_capacity(line.len());
    let mut rest = line;

    while let Some(open) = rest.find('[') {
        text.push_str(&rest[..open]);
        let after = &rest[open..];
        match after.find(']').and_then(|close| {
            parse_timestamp(&after[1..close]).map(|ms| (ms, close))
        }) {
            Some((ms, close)) => {
                stamps.push(ms);
                rest = &after[close + 1..];
            }
            None => {
                text.push('[');
                rest = &after[1..];
            }
        }
    }
    text.push_str(rest);

    if stamps.is_empty() {
        return None;
    }
    Some((stamps, text.trim().to_string()))
}

/// Parse "mm:ss.xx" or "mm:ss.xxx" to milliseconds.
fn parse_timestamp(s: &str) -> Option<u64> {
    let (min, rest) = s.split_once(':')?;
    let (sec, frac) = rest.split_once('.')?;

    if min.len() != 2 || sec.len() != 2 || !all_digits(min) || !all_digits(sec) || !all_digits(frac) {
        return None;
    }

    let min: u64 = min.parse().ok()?;
    let sec: u64 = sec.parse().ok()?;
    // "34" is centiseconds, "340" milliseconds
    let ms: u64 = match frac.len() {
        2 => frac.parse::<u64>().ok()? * 10,
        3 => frac.parse().ok()?,
        _ => return None,
    };
    Some(min * 60 * 1000 + sec * 1000 + ms)
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
