use crate::lyrics::LyricsState;
use crate::player::BackendEvent;
use crate::theme::ThemeColor;

/// Everything the app loop reacts to, serialised onto one channel.
#[derive(Debug)]
pub enum Event {
    Input(InputEvent),
    Backend(BackendEvent),
    Timer(TimerEvent),
    Task(TaskEvent),
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Line(String),
    /// Stdin reached EOF.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimerEvent {
    /// Display-refresh step of the playback clock.
    Frame { generation: u64 },
    /// Time to ask the backend for its position.
    Sync { generation: u64 },
    /// Debounced seek is due.
    SeekCommit { seq: u64, target: f64 },
    /// Un-mute after a seek.
    RestoreVolume { seq: u64 },
}

/// Results of work spawned off the loop.
#[derive(Debug)]
pub enum TaskEvent {
    Progress { generation: u64, seconds: f64 },
    LyricsLoaded { path: String, lyrics: LyricsState },
    CoverLoaded { path: String, cover: Option<String> },
    PaletteReady { cover: String, colors: Vec<ThemeColor> },
}
