//! Lyrics module for synchronized lyrics display
//!
//! This module provides:
//! - LRC format parser producing timed lines (with translation/transliteration)
//! - Line selection against the playback clock
//! - The load state and display text consumed by the front end

pub mod parser;
pub mod selector;

pub use parser::TimedLyricLine;
pub use selector::DEFAULT_AUDIO_LATENCY;

const NO_SYNCED_LYRICS: &str = "No synced lyrics";
const NO_LYRICS: &str = "Instrumental / no lyrics";

/// Which extra rows to show under the current line.
#[derive(Debug, Clone, Copy)]
pub struct LyricOptions {
    pub show_translation: bool,
    pub show_transliteration: bool,
}

impl Default for LyricOptions {
    fn default() -> Self {
        Self {
            show_translation: true,
            show_transliteration: true,
        }
    }
}

impl From<&crate::config::LyricsConfig> for LyricOptions {
    fn from(cfg: &crate::config::LyricsConfig) -> Self {
        Self {
            show_translation: cfg.show_translation,
            show_transliteration: cfg.show_transliteration,
        }
    }
}

/// Lyrics for the active song. Rebuilt wholesale whenever the song changes.
#[derive(Debug, Clone, Default)]
pub enum LyricsState {
    #[default]
    NotLoaded,
    Loading {
        path: String,
    },
    Ready {
        path: String,
        /// The backend returned some text, even if none of it was timed.
        raw_present: bool,
        lines: Vec<TimedLyricLine>,
    },
}

/// What the front end shows for the lyric area.
#[derive(Debug, Clone, PartialEq)]
pub struct LyricDisplay {
    pub text: String,
    pub lines: Vec<String>,
}

impl LyricDisplay {
    fn single(text: &str) -> Self {
        Self {
            text: text.to_string(),
            lines: vec![text.to_string()],
        }
    }
}

impl LyricsState {
    pub fn loading(path: impl Into<String>) -> Self {
        Self::Loading { path: path.into() }
    }

    /// Build the ready state from the backend's raw lyric text.
    pub fn from_raw(path: impl Into<String>, raw: &str) -> Self {
        Self::Ready {
            path: path.into(),
            raw_present: !raw.trim().is_empty(),
            lines: parser::parse(raw),
        }
    }

    pub fn is_loading_for(&self, song_path: &str) -> bool {
        matches!(self, Self::Loading { path } if path == song_path)
    }

    pub fn lines(&self) -> &[TimedLyricLine] {
        match self {
            Self::Ready { lines, .. } => lines,
            _ => &[],
        }
    }

    pub fn current_index(&self, position: f64, audio_latency: f64) -> Option<usize> {
        selector::select(self.lines(), position, audio_latency)
    }

    /// Display text for the line at `index`. `None` while nothing is loaded.
    pub fn display(&self, index: Option<usize>, opts: LyricOptions) -> Option<LyricDisplay> {
        let Self::Ready {
            raw_present, lines, ..
        } = self
        else {
            return None;
        };

        if lines.is_empty() {
            let fallback = if *raw_present { NO_SYNCED_LYRICS } else { NO_LYRICS };
            return Some(LyricDisplay::single(fallback));
        }

        let Some(current) = index.and_then(|i| lines.get(i)) else {
            // Not started yet: preview the first line.
            return Some(LyricDisplay::single(&lines[0].text));
        };

        let mut rows = vec![current.text.clone()];
        if opts.show_translation
            && let Some(t) = &current.translation
        {
            rows.push(t.clone());
        }
        if opts.show_transliteration
            && let Some(t) = &current.transliteration
        {
            rows.push(t.clone());
        }
        Some(LyricDisplay {
            text: current.text.clone(),
            lines: rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LRC: &str = "[00:01.00]hello\n[00:01.00]bonjour\n[00:01.00]haro\n[00:04.00]world\n";

    #[test]
    fn display_includes_enabled_extras() {
        let state = LyricsState::from_raw("a.mp3", LRC);
        let shown = state.display(Some(0), LyricOptions::default()).unwrap();
        assert_eq!(shown.text, "hello");
        assert_eq!(shown.lines, vec!["hello", "bonjour", "haro"]);

        let opts = LyricOptions {
            show_translation: false,
            show_transliteration: true,
        };
        let shown = state.display(Some(0), opts).unwrap();
        assert_eq!(shown.lines, vec!["hello", "haro"]);
    }

    #[test]
    fn before_first_line_previews_it() {
        let state = LyricsState::from_raw("a.mp3", LRC);
        let idx = state.current_index(0.5, 0.45);
        assert_eq!(idx, None);
        let shown = state.display(idx, LyricOptions::default()).unwrap();
        assert_eq!(shown.lines, vec!["hello"]);
    }

    #[test]
    fn fallback_distinguishes_untimed_from_missing() {
        let untimed = LyricsState::from_raw("a.mp3", "just some words");
        assert_eq!(
            untimed.display(None, LyricOptions::default()).unwrap().text,
            NO_SYNCED_LYRICS
        );

        let missing = LyricsState::from_raw("a.mp3", "  \n");
        assert_eq!(
            missing.display(None, LyricOptions::default()).unwrap().text,
            NO_LYRICS
        );
    }

    #[test]
    fn nothing_to_show_until_loaded() {
        assert!(LyricsState::NotLoaded.display(None, LyricOptions::default()).is_none());
        let loading = LyricsState::loading("a.mp3");
        assert!(loading.is_loading_for("a.mp3"));
        assert!(!loading.is_loading_for("b.mp3"));
        assert!(loading.display(None, LyricOptions::default()).is_none());
    }
}
