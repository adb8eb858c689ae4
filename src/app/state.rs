use crate::config::settings::AppSettings;
use crate::library::model::Song;
use crate::library::view::View;
use crate::lyrics::LyricsState;
use crate::theme::ThemeColor;

pub const DEFAULT_VOLUME: u8 = 100;

#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub kind: ToastKind,
    pub created_at: std::time::Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
}

impl Toast {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ToastKind::Success,
            created_at: std::time::Instant::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ToastKind::Error,
            created_at: std::time::Instant::now(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() > std::time::Duration::from_secs(3)
    }
}

/// Everything the console renders. Owned and mutated only by the app loop.
#[derive(Debug)]
pub struct AppState {
    pub should_quit: bool,

    // Playback
    pub current_song: Option<Song>,
    pub is_playing: bool,
    /// Whether the backend has the current song open. False after a
    /// restore, so the first play opens it.
    pub is_song_loaded: bool,
    pub position: f64,
    /// 0-100.
    pub volume: u8,
    /// Volume to return to when un-muting.
    pub muted_from: Option<u8>,

    // Browsing
    pub view: View,
    pub search_query: String,

    // Lyrics
    pub lyrics: LyricsState,
    pub lyric_index: Option<usize>,

    // Artwork
    pub cover: Option<String>,
    pub palette: Vec<ThemeColor>,

    pub settings: AppSettings,

    pub toast: Option<Toast>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            should_quit: false,
            current_song: None,
            is_playing: false,
            is_song_loaded: false,
            position: 0.0,
            volume: DEFAULT_VOLUME,
            muted_from: None,
            view: View::default(),
            search_query: String::new(),
            lyrics: LyricsState::NotLoaded,
            lyric_index: None,
            cover: None,
            palette: Vec::new(),
            settings: AppSettings::default(),
            toast: None,
        }
    }

    pub fn duration(&self) -> f64 {
        self.current_song.as_ref().map_or(0.0, |s| s.duration)
    }

    pub fn is_current(&self, path: &str) -> bool {
        self.current_song.as_ref().is_some_and(|s| s.path == path)
    }

    /// Backend volume level.
    pub fn volume_level(&self) -> f32 {
        f32::from(self.volume) / 100.0
    }

    pub fn active_toast(&self) -> Option<&Toast> {
        self.toast.as_ref().filter(|t| !t.is_expired())
    }
}
