//! In-memory backend that records every call.

use super::{Backend, BackendError, GeneratedFolder, TrackMetadata};
use crate::library::model::Song;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct FakeState {
    pub calls: Vec<String>,
    pub progress: f64,
    pub scans: HashMap<String, Vec<Song>>,
    pub generated: HashMap<String, Vec<GeneratedFolder>>,
    pub lyrics: HashMap<String, String>,
    pub covers: HashMap<String, String>,
    /// Method names that answer with an error.
    pub failing: HashSet<&'static str>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn take_calls(&self) -> Vec<String> {
        std::mem::take(&mut self.state().calls)
    }

    pub fn fail(&self, method: &'static str) {
        self.state().failing.insert(method);
    }

    fn record(&self, method: &'static str, call: String) -> anyhow::Result<()> {
        let mut st = self.state();
        st.calls.push(call);
        if st.failing.contains(method) {
            return Err(BackendError {
                code: "IO_ERROR".into(),
                message: format!("{method} failed"),
            }
            .into());
        }
        Ok(())
    }
}

impl Backend for FakeBackend {
    async fn play_audio(&self, path: &str, meta: &TrackMetadata) -> anyhow::Result<()> {
        self.record("play_audio", format!("play_audio {path} {}", meta.title))
    }

    async fn pause_audio(&self) -> anyhow::Result<()> {
        self.record("pause_audio", "pause_audio".into())
    }

    async fn resume_audio(&self) -> anyhow::Result<()> {
        self.record("resume_audio", "resume_audio".into())
    }

    async fn seek_audio(&self, seconds: u32, is_playing: bool) -> anyhow::Result<()> {
        self.record("seek_audio", format!("seek_audio {seconds} {is_playing}"))
    }

    async fn set_volume(&self, level: f32) -> anyhow::Result<()> {
        self.record("set_volume", format!("set_volume {level}"))
    }

    async fn get_playback_progress(&self) -> anyhow::Result<f64> {
        self.record("get_playback_progress", "get_playback_progress".into())?;
        Ok(self.state().progress)
    }

    async fn get_song_cover(&self, path: &str) -> anyhow::Result<String> {
        self.record("get_song_cover", format!("get_song_cover {path}"))?;
        Ok(self.state().covers.get(path).cloned().unwrap_or_default())
    }

    async fn get_song_lyrics(&self, path: &str) -> anyhow::Result<String> {
        self.record("get_song_lyrics", format!("get_song_lyrics {path}"))?;
        Ok(self.state().lyrics.get(path).cloned().unwrap_or_default())
    }

    async fn scan_music_folder(&self, path: &str) -> anyhow::Result<Vec<Song>> {
        self.record("scan_music_folder", format!("scan_music_folder {path}"))?;
        Ok(self.state().scans.get(path).cloned().unwrap_or_default())
    }

    async fn scan_folder_as_playlists(&self, root: &str) -> anyhow::Result<Vec<GeneratedFolder>> {
        self.record("scan_folder_as_playlists", format!("scan_folder_as_playlists {root}"))?;
        Ok(self.state().generated.get(root).cloned().unwrap_or_default())
    }

    async fn batch_move_music_files(&self, paths: &[String], target_folder: &str) -> anyhow::Result<u32> {
        self.record(
            "batch_move_music_files",
            format!("batch_move_music_files {} {target_folder}", paths.join(",")),
        )?;
        Ok(paths.len() as u32)
    }

    async fn move_music_file(&self, old_path: &str, new_path: &str) -> anyhow::Result<()> {
        self.record("move_music_file", format!("move_music_file {old_path} {new_path}"))
    }

    async fn delete_music_file(&self, path: &str) -> anyhow::Result<()> {
        self.record("delete_music_file", format!("delete_music_file {path}"))
    }

    async fn show_in_folder(&self, path: &str) -> anyhow::Result<()> {
        self.record("show_in_folder", format!("show_in_folder {path}"))
    }
}
