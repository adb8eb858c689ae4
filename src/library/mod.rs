//! The local song library and everything keyed by song path: watched
//! folders, favorites and playlists.

pub mod display;
pub mod groups;
pub mod history;
pub mod model;
pub mod organize;
pub mod view;

use model::{Playlist, Song};
use rand::Rng;
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct Library {
    songs: Vec<Song>,
    watched_folders: Vec<String>,
    favorites: Vec<String>,
    playlists: Vec<Playlist>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(
        songs: Vec<Song>,
        watched_folders: Vec<String>,
        favorites: Vec<String>,
        playlists: Vec<Playlist>,
    ) -> Self {
        let mut lib = Self {
            songs: Vec::new(),
            watched_folders,
            favorites,
            playlists,
        };
        // Keep the path-is-identity invariant even for old snapshots.
        lib.merge(songs);
        lib
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn watched_folders(&self) -> &[String] {
        &self.watched_folders
    }

    pub fn favorites(&self) -> &[String] {
        &self.favorites
    }

    pub fn playlists(&self) -> &[Playlist] {
        &self.playlists
    }

    pub fn get(&self, path: &str) -> Option<&Song> {
        self.songs.iter().find(|s| s.path == path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Append songs whose path is not already known. Returns how many were
    /// added.
    pub fn merge(&mut self, songs: Vec<Song>) -> usize {
        let mut known: HashSet<String> = self.songs.iter().map(|s| s.path.clone()).collect();
        let before = self.songs.len();
        for song in songs {
            if known.insert(song.path.clone()) {
                self.songs.push(song);
            }
        }
        self.songs.len() - before
    }

    /// Start watching `folder`. Returns false when it already was.
    pub fn watch(&mut self, folder: &str) -> bool {
        if self.watched_folders.iter().any(|f| f == folder) {
            return false;
        }
        self.watched_folders.push(folder.to_string());
        true
    }

    /// Replace every song under `folder` with a fresh scan result.
    pub fn replace_folder(&mut self, folder: &str, scanned: Vec<Song>) {
        self.songs.retain(|s| !in_folder(&s.path, folder));
        self.merge(scanned);
    }

    /// Stop watching `folder` and drop its songs.
    pub fn remove_folder(&mut self, folder: &str) {
        self.watched_folders.retain(|f| f != folder);
        self.songs.retain(|s| !in_folder(&s.path, folder));
    }

    pub fn songs_in_folder<'a>(&'a self, folder: &'a str) -> impl Iterator<Item = &'a Song> {
        self.songs.iter().filter(move |s| in_folder(&s.path, folder))
    }

    pub fn remove_song(&mut self, path: &str) {
        self.songs.retain(|s| s.path != path);
    }

    /// The file at `old` now lives at `new`; follow it everywhere.
    pub fn rename_path(&mut self, old: &str, new: &str) {
        if let Some(song) = self.songs.iter_mut().find(|s| s.path == old) {
            song.path = new.to_string();
            song.name = model::file_name_of(new).to_string();
        }
        for p in self.favorites.iter_mut().filter(|p| p.as_str() == old) {
            *p = new.to_string();
        }
        for pl in &mut self.playlists {
            for p in pl.song_paths.iter_mut().filter(|p| p.as_str() == old) {
                *p = new.to_string();
            }
        }
    }

    /// The file at `path` is gone; drop every reference to it.
    pub fn forget_path(&mut self, path: &str) {
        self.remove_song(path);
        self.favorites.retain(|p| p != path);
        for pl in &mut self.playlists {
            pl.song_paths.retain(|p| p != path);
        }
    }

    /// Forget all songs and watched folders.
    pub fn clear(&mut self) {
        self.songs.clear();
        self.watched_folders.clear();
    }

    // --- favorites ---

    pub fn is_favorite(&self, path: &str) -> bool {
        self.favorites.iter().any(|p| p == path)
    }

    /// Returns the new favorite state.
    pub fn toggle_favorite(&mut self, path: &str) -> bool {
        if self.is_favorite(path) {
            self.favorites.retain(|p| p != path);
            false
        } else {
            self.favorites.push(path.to_string());
            true
        }
    }

    pub fn remove_favorite(&mut self, path: &str) {
        self.favorites.retain(|p| p != path);
    }

    pub fn clear_favorites(&mut self) {
        self.favorites.clear();
    }

    /// Library songs that are favorites, in library order.
    pub fn favorite_songs(&self) -> impl Iterator<Item = &Song> {
        let favs: HashSet<&str> = self.favorites.iter().map(String::as_str).collect();
        self.songs.iter().filter(move |s| favs.contains(s.path.as_str()))
    }

    // --- playlists ---

    /// Create a playlist; blank names are ignored. Returns the new id.
    pub fn create_playlist(&mut self, name: &str, initial: &[String], now_ms: i64) -> Option<String> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let id = loop {
            let candidate = format!("{now_ms}{:06}", rand::rng().random_range(0..1_000_000u32));
            if !self.playlists.iter().any(|p| p.id == candidate) {
                break candidate;
            }
        };
        let mut song_paths: Vec<String> = Vec::with_capacity(initial.len());
        for p in initial {
            if !song_paths.contains(p) {
                song_paths.push(p.clone());
            }
        }
        self.playlists.push(Playlist {
            id: id.clone(),
            name: name.to_string(),
            song_paths,
            created_at: now_ms,
        });
        Some(id)
    }

    pub fn delete_playlist(&mut self, id: &str) -> bool {
        let before = self.playlists.len();
        self.playlists.retain(|p| p.id != id);
        self.playlists.len() != before
    }

    pub fn playlist(&self, id: &str) -> Option<&Playlist> {
        self.playlists.iter().find(|p| p.id == id)
    }

    /// Add paths not already in the playlist. Returns how many were added.
    pub fn add_songs_to_playlist(&mut self, id: &str, paths: &[String]) -> usize {
        let Some(pl) = self.playlists.iter_mut().find(|p| p.id == id) else {
            return 0;
        };
        let mut added = 0;
        for path in paths {
            if !pl.song_paths.contains(path) {
                pl.song_paths.push(path.clone());
                added += 1;
            }
        }
        added
    }

    pub fn add_to_playlist(&mut self, id: &str, path: &str) -> bool {
        self.add_songs_to_playlist(id, &[path.to_string()]) == 1
    }

    pub fn remove_from_playlist(&mut self, id: &str, path: &str) {
        if let Some(pl) = self.playlists.iter_mut().find(|p| p.id == id) {
            pl.song_paths.retain(|p| p != path);
        }
    }

    /// Songs of a playlist in playlist order. Paths no longer in the library
    /// are skipped.
    pub fn playlist_songs(&self, id: &str) -> Vec<Song> {
        self.playlist(id)
            .map(|pl| {
                pl.song_paths
                    .iter()
                    .filter_map(|p| self.get(p).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// True when `path` is `folder` itself or lies somewhere below it.
/// `/music/rock` does not contain `/music/rockabilly/a.mp3`.
pub(crate) fn in_folder(path: &str, folder: &str) -> bool {
    let folder = folder.trim_end_matches(['/', '\\']);
    match path.strip_prefix(folder) {
        Some(rest) => rest.is_empty() || rest.starts_with(['/', '\\']),
        None => false,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn song(path: &str, artist: &str, album: &str) -> Song {
        Song {
            name: model::file_name_of(path).to_string(),
            title: model::file_name_of(path).to_string(),
            path: path.to_string(),
            artist: artist.to_string(),
            album: album.to_string(),
            duration: 180.0,
            ..Default::default()
        }
    }

    fn sample() -> Library {
        let mut lib = Library::new();
        lib.watch("/m/rock");
        lib.merge(vec![
            song("/m/rock/a.mp3", "X", "One"),
            song("/m/rock/b.mp3", "Y", "Two"),
            song("/m/jazz/c.mp3", "X", "Three"),
        ]);
        lib
    }

    #[test]
    fn merge_skips_known_paths() {
        let mut lib = sample();
        let added = lib.merge(vec![song("/m/rock/a.mp3", "Z", "Z"), song("/m/new.mp3", "", "")]);
        assert_eq!(added, 1);
        assert_eq!(lib.songs().len(), 4);
        assert_eq!(lib.get("/m/rock/a.mp3").unwrap().artist, "X");
    }

    #[test]
    fn replace_and_remove_folder() {
        let mut lib = sample();
        lib.replace_folder("/m/rock", vec![song("/m/rock/d.mp3", "Q", "Q")]);
        let paths: Vec<_> = lib.songs().iter().map(|s| s.path.as_str()).collect();
        assert_eq!(paths, vec!["/m/jazz/c.mp3", "/m/rock/d.mp3"]);

        lib.remove_folder("/m/rock");
        assert!(lib.watched_folders().is_empty());
        assert_eq!(lib.songs().len(), 1);
    }

    #[test]
    fn sibling_folder_with_shared_prefix_is_untouched() {
        let mut lib = Library::new();
        lib.watch("/music/rock");
        lib.watch("/music/rockabilly");
        lib.merge(vec![
            song("/music/rock/a.mp3", "X", "One"),
            song("/music/rockabilly/b.mp3", "Y", "Two"),
        ]);
        assert_eq!(lib.songs_in_folder("/music/rock").count(), 1);
        assert_eq!(lib.songs_in_folder("/music/rock/").count(), 1);

        lib.replace_folder("/music/rock", vec![song("/music/rock/c.mp3", "Z", "Three")]);
        assert!(lib.contains("/music/rockabilly/b.mp3"));
        assert!(!lib.contains("/music/rock/a.mp3"));

        lib.remove_folder("/music/rock");
        let paths: Vec<_> = lib.songs().iter().map(|s| s.path.as_str()).collect();
        assert_eq!(paths, vec!["/music/rockabilly/b.mp3"]);
        assert_eq!(lib.watched_folders(), ["/music/rockabilly".to_string()]);
    }

    #[test]
    fn folder_membership_accepts_either_separator() {
        assert!(in_folder("C:\\Music\\a.mp3", "C:\\Music"));
        assert!(in_folder("/m/rock/sub/a.mp3", "/m/rock"));
        assert!(!in_folder("/m/rocks.mp3", "/m/rock"));
        assert!(!in_folder("/m/jazz/a.mp3", "/m/rock"));
    }

    #[test]
    fn rename_follows_favorites_and_playlists() {
        let mut lib = sample();
        lib.toggle_favorite("/m/rock/a.mp3");
        let id = lib
            .create_playlist("mix", &["/m/rock/a.mp3".to_string()], 1)
            .unwrap();

        lib.rename_path("/m/rock/a.mp3", "/sorted/X/a.mp3");
        assert!(lib.contains("/sorted/X/a.mp3"));
        assert!(lib.is_favorite("/sorted/X/a.mp3"));
        assert_eq!(lib.playlist(&id).unwrap().song_paths, vec!["/sorted/X/a.mp3"]);
    }

    #[test]
    fn forget_drops_every_reference() {
        let mut lib = sample();
        lib.toggle_favorite("/m/rock/b.mp3");
        let id = lib
            .create_playlist("p", &["/m/rock/b.mp3".to_string()], 1)
            .unwrap();
        lib.forget_path("/m/rock/b.mp3");
        assert!(!lib.contains("/m/rock/b.mp3"));
        assert!(lib.favorites().is_empty());
        assert!(lib.playlist(&id).unwrap().song_paths.is_empty());
    }

    #[test]
    fn playlist_crud() {
        let mut lib = sample();
        assert!(lib.create_playlist("   ", &[], 1).is_none());

        let id = lib.create_playlist("Road trip", &[], 7).unwrap();
        let other = lib.create_playlist("Road trip", &[], 7).unwrap();
        assert_ne!(id, other);

        let added = lib.add_songs_to_playlist(
            &id,
            &["/m/jazz/c.mp3".to_string(), "/m/rock/a.mp3".to_string(), "/m/jazz/c.mp3".to_string()],
        );
        assert_eq!(added, 2);
        assert!(!lib.add_to_playlist(&id, "/m/rock/a.mp3"));

        lib.remove_from_playlist(&id, "/m/jazz/c.mp3");
        assert_eq!(lib.playlist(&id).unwrap().song_paths, vec!["/m/rock/a.mp3"]);

        assert!(lib.delete_playlist(&id));
        assert!(!lib.delete_playlist(&id));
        assert_eq!(lib.add_songs_to_playlist(&id, &["x".to_string()]), 0);
    }

    #[test]
    fn playlist_songs_skip_stale_paths() {
        let mut lib = sample();
        let paths = vec![
            "/m/jazz/c.mp3".to_string(),
            "/gone.mp3".to_string(),
            "/m/rock/a.mp3".to_string(),
        ];
        let id = lib.create_playlist("p", &paths, 1).unwrap();
        let songs = lib.playlist_songs(&id);
        let got: Vec<_> = songs.iter().map(|s| s.path.as_str()).collect();
        assert_eq!(got, vec!["/m/jazz/c.mp3", "/m/rock/a.mp3"]);
        assert!(lib.playlist_songs("nope").is_empty());
    }

    #[test]
    fn favorites_toggle() {
        let mut lib = sample();
        assert!(lib.toggle_favorite("/m/rock/b.mp3"));
        assert_eq!(lib.favorite_songs().count(), 1);
        assert!(!lib.toggle_favorite("/m/rock/b.mp3"));
        assert_eq!(lib.favorite_songs().count(), 0);
    }
}
