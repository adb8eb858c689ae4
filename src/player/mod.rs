//! Playback plumbing: the native backend bridge and the local clock that
//! tracks its position between reports.

pub mod clock;
pub mod ipc;
pub mod timers;

#[cfg(test)]
pub mod fake;

use crate::library::model::Song;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Metadata handed to the backend with `play_audio` (used for OS media
/// controls).
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub cover: String,
    pub duration: u32,
}

impl TrackMetadata {
    pub fn for_song(song: &Song, cover: Option<&str>) -> Self {
        Self {
            title: song.display_title().to_string(),
            artist: song.artist.clone(),
            album: song.album.clone(),
            cover: cover.unwrap_or_default().to_string(),
            duration: song.duration.max(0.0).round() as u32,
        }
    }
}

/// One folder's worth of songs from `scan_folder_as_playlists`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneratedFolder {
    pub name: String,
    pub path: String,
    pub songs: Vec<Song>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKey {
    Play,
    Pause,
    Next,
    Previous,
}

/// Unsolicited notifications from the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    MediaKey(MediaKey),
    Disconnected,
}

/// Structured error reply from the backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BackendError {
    pub code: String,
    pub message: String,
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl std::error::Error for BackendError {}

/// The remote calls the native backend answers. Every call is an
/// independent request; the backend never changes playback state on its
/// own except through [`BackendEvent`]s.
pub trait Backend: Clone + Send + Sync + 'static {
    fn play_audio(
        &self,
        path: &str,
        meta: &TrackMetadata,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
    fn pause_audio(&self) -> impl Future<Output = anyhow::Result<()>> + Send;
    fn resume_audio(&self) -> impl Future<Output = anyhow::Result<()>> + Send;
    fn seek_audio(
        &self,
        seconds: u32,
        is_playing: bool,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
    /// `level` in `0.0..=1.0`.
    fn set_volume(&self, level: f32) -> impl Future<Output = anyhow::Result<()>> + Send;
    fn get_playback_progress(&self) -> impl Future<Output = anyhow::Result<f64>> + Send;
    /// Path of the extracted cover image, empty when the song has none.
    fn get_song_cover(&self, path: &str) -> impl Future<Output = anyhow::Result<String>> + Send;
    /// Raw lyric text, empty when none was found.
    fn get_song_lyrics(&self, path: &str) -> impl Future<Output = anyhow::Result<String>> + Send;
    fn scan_music_folder(
        &self,
        path: &str,
    ) -> impl Future<Output = anyhow::Result<Vec<Song>>> + Send;
    fn scan_folder_as_playlists(
        &self,
        root: &str,
    ) -> impl Future<Output = anyhow::Result<Vec<GeneratedFolder>>> + Send;
    /// Returns how many files were moved.
    fn batch_move_music_files(
        &self,
        paths: &[String],
        target_folder: &str,
    ) -> impl Future<Output = anyhow::Result<u32>> + Send;
    fn move_music_file(
        &self,
        old_path: &str,
        new_path: &str,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
    fn delete_music_file(&self, path: &str) -> impl Future<Output = anyhow::Result<()>> + Send;
    fn show_in_folder(&self, path: &str) -> impl Future<Output = anyhow::Result<()>> + Send;
}
