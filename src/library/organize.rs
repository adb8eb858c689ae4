use super::model::{Song, UNKNOWN};
use crate::config::settings::AppSettings;

const ILLEGAL: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

fn sanitize(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| if ILLEGAL.contains(&c) { '_' } else { c })
        .collect()
}

fn or_placeholder(value: &str, placeholder: &str) -> String {
    let clean = sanitize(value);
    if clean.is_empty() { placeholder.to_string() } else { clean }
}

fn split_ext(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}

/// Where `song` would live under the organize rule, or `None` when
/// auto-organize is off or no root is configured.
///
/// The rule uses `/` between segments; the result uses whichever
/// separator the root uses.
pub fn organized_path(song: &Song, settings: &AppSettings) -> Option<String> {
    if !settings.enable_auto_organize {
        return None;
    }
    let root = settings.organize_root.trim();
    if root.is_empty() {
        return None;
    }
    let sep = if root.contains('\\') && !root.contains('/') { '\\' } else { '/' };

    let file = song.file_name();
    let (stem, ext) = split_ext(file);
    let title = if song.title.trim().is_empty() { stem } else { song.title.as_str() };

    let relative = settings
        .organize_rule
        .replace("{Artist}", &or_placeholder(&song.artist, "Unknown Artist"))
        .replace("{Album}", &or_placeholder(&song.album, "Unknown Album"))
        .replace("{Title}", &or_placeholder(title, "Unknown Title"))
        .replace("{Year}", &or_placeholder(year_digits(song), "0000"));

    let segments: Vec<&str> = relative
        .split(['/', '\\'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if segments.is_empty() {
        return None;
    }

    let mut out = root.trim_end_matches(['/', '\\']).to_string();
    for seg in segments {
        out.push(sep);
        out.push_str(seg);
    }
    if let Some(ext) = ext {
        out.push('.');
        out.push_str(ext);
    }
    Some(out)
}

fn year_digits(song: &Song) -> &str {
    match song.year_or_unknown() {
        UNKNOWN => "",
        y => y,
    }
}
