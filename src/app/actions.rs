use crate::library::view::View;

/// A song named on the console: a 1-based row of the current view, the
/// current song, or a path.
#[derive(Debug, Clone, PartialEq)]
pub enum SongRef {
    Current,
    Row(usize),
    Path(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Quit,
    Help,
    Status,
    /// Print the current view.
    List,

    // Playback
    Play(SongRef),
    TogglePlay,
    Next,
    Prev,
    SeekTo(f64),
    StepSeek(f64),
    /// One configured step forward (`1`) or back (`-1`).
    Step(i8),
    /// Seek and make sure playback runs.
    PlayAt(f64),
    SetVolume(u8),
    ToggleMute,
    CycleMode,

    // Queue
    PlayNext(SongRef),
    ShowQueue,
    ClearQueue,
    /// 1-based queue positions.
    MoveInQueue { from: usize, to: usize },
    RemoveFromQueue(usize),

    // Browsing
    SetView(View),
    Search(String),

    // Library and favorites
    ToggleFavorite(SongRef),
    ClearFavorites,
    RemoveFromView(SongRef),
    ClearHistory,

    // Folders
    AddFolder(String),
    ImportFolder(String),
    RefreshFolder(String),
    Unwatch(String),
    ClearLibrary,

    // Playlists
    CreatePlaylist(String),
    DeletePlaylist(String),
    AddToPlaylist { id: String, song: SongRef },
    RemoveFromPlaylist { id: String, song: SongRef },
    ListPlaylists,

    // Files on disk
    MoveFile { song: SongRef, new_path: String },
    MoveToFolder { songs: Vec<SongRef>, folder: String },
    Organize(SongRef),
    DeleteFile(SongRef),
    Reveal(SongRef),
}
