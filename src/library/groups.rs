//! Read-time aggregations over the library. Nothing here is cached; every
//! call walks the song list.

use super::Library;
use super::history::History;
use super::model::{Playlist, Song};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub name: String,
    pub count: usize,
    /// Used to fetch a representative cover.
    pub first_song_path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlbumGroup {
    pub name: String,
    pub artist: String,
    pub count: usize,
    pub first_song_path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FolderGroup {
    pub path: String,
    pub name: String,
    pub count: usize,
    pub first_song_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecentAlbum {
    pub name: String,
    pub artist: String,
    pub played_at: i64,
    pub first_song_path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecentPlaylist {
    pub id: String,
    pub name: String,
    pub count: usize,
    pub played_at: i64,
    pub first_song_path: Option<String>,
}

/// Count songs per key, first-seen order, then sort by count descending.
/// The sort is stable so ties keep first-seen order.
fn count_by<'a, I, F>(songs: I, key: F) -> Vec<Group>
where
    I: IntoIterator<Item = &'a Song>,
    F: Fn(&Song) -> &str,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();
    for song in songs {
        let k = key(song);
        match index.get(k) {
            Some(&i) => groups[i].count += 1,
            None => {
                index.insert(k.to_string(), groups.len());
                groups.push(Group {
                    name: k.to_string(),
                    count: 1,
                    first_song_path: song.path.clone(),
                });
            }
        }
    }
    groups.sort_by(|a, b| b.count.cmp(&a.count));
    groups
}

pub fn artists<'a>(songs: impl IntoIterator<Item = &'a Song>) -> Vec<Group> {
    count_by(songs, Song::artist_or_unknown)
}

pub fn genres<'a>(songs: impl IntoIterator<Item = &'a Song>) -> Vec<Group> {
    count_by(songs, Song::genre_or_unknown)
}

/// Years sorted newest first (by name, so `Unknown` sorts above digits).
pub fn years<'a>(songs: impl IntoIterator<Item = &'a Song>) -> Vec<Group> {
    let mut groups = count_by(songs, Song::year_or_unknown);
    groups.sort_by(|a, b| b.name.cmp(&a.name));
    groups
}

pub fn albums<'a>(songs: impl IntoIterator<Item = &'a Song>) -> Vec<AlbumGroup> {
    let songs: Vec<&Song> = songs.into_iter().collect();
    let artist_of: HashMap<&str, &str> = songs.iter().rev().map(|s| (s.album_or_unknown(), s.artist.as_str())).collect();
    count_by(songs.iter().copied(), Song::album_or_unknown)
        .into_iter()
        .map(|g| AlbumGroup {
            artist: artist_of.get(g.name.as_str()).copied().unwrap_or_default().to_string(),
            name: g.name,
            count: g.count,
            first_song_path: g.first_song_path,
        })
        .collect()
}

pub fn favorite_artists(lib: &Library) -> Vec<Group> {
    artists(lib.favorite_songs())
}

pub fn favorite_albums(lib: &Library) -> Vec<AlbumGroup> {
    albums(lib.favorite_songs())
}

/// One entry per watched folder, in watch order.
pub fn folders(watched: &[String], songs: &[Song]) -> Vec<FolderGroup> {
    watched
        .iter()
        .map(|folder| {
            let mut inside = songs.iter().filter(|s| super::in_folder(&s.path, folder));
            let first = inside.next().map(|s| s.path.clone());
            let count = first.as_ref().map_or(0, |_| 1 + inside.count());
            FolderGroup {
                path: folder.clone(),
                name: super::model::file_name_of(folder.trim_end_matches(['/', '\\'])).to_string(),
                count,
                first_song_path: first,
            }
        })
        .collect()
}

/// Albums by most recent play.
pub fn recent_albums(history: &History) -> Vec<RecentAlbum> {
    let mut out: Vec<RecentAlbum> = Vec::new();
    for item in history.items() {
        let name = item.song.album_or_unknown();
        match out.iter_mut().find(|a| a.name == name) {
            Some(a) if item.played_at > a.played_at => {
                a.artist = item.song.artist.clone();
                a.played_at = item.played_at;
                a.first_song_path = item.song.path.clone();
            }
            Some(_) => {}
            None => out.push(RecentAlbum {
                name: name.to_string(),
                artist: item.song.artist.clone(),
                played_at: item.played_at,
                first_song_path: item.song.path.clone(),
            }),
        }
    }
    out.sort_by(|a, b| b.played_at.cmp(&a.played_at));
    out
}

/// Playlists that contain at least one played song, by most recent play.
pub fn recent_playlists(playlists: &[Playlist], history: &History) -> Vec<RecentPlaylist> {
    let mut out: Vec<RecentPlaylist> = playlists
        .iter()
        .filter_map(|pl| {
            let played_at = history
                .items()
                .iter()
                .filter(|h| pl.song_paths.contains(&h.song.path))
                .map(|h| h.played_at)
                .max()?;
            Some(RecentPlaylist {
                id: pl.id.clone(),
                name: pl.name.clone(),
                count: pl.song_paths.len(),
                played_at,
                first_song_path: pl.song_paths.first().cloned(),
            })
        })
        .collect();
    out.sort_by(|a, b| b.played_at.cmp(&a.played_at));
    out
}
