use super::Library;
use super::history::History;
use super::model::Song;
use std::fmt;

/// Sub-tab of the "all songs" view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AllTab {
    #[default]
    Songs,
    /// `None` lists every song; `Some` narrows to one artist.
    Artist(Option<String>),
    Album(Option<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FavoritesTab {
    #[default]
    Songs,
    Artist(Option<String>),
    Album(Option<String>),
}

/// What the song list is currently showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    All { tab: AllTab },
    Folder(String),
    Artist(Option<String>),
    Album(Option<String>),
    Genre(Option<String>),
    Year(Option<String>),
    Playlist(String),
    Recent,
    Favorites { tab: FavoritesTab },
}

impl Default for View {
    fn default() -> Self {
        View::All { tab: AllTab::default() }
    }
}

impl View {
    /// Views whose songs come straight from the library.
    pub fn is_library_view(&self) -> bool {
        !matches!(self, View::Recent | View::Favorites { .. } | View::Playlist(_))
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn narrowed(f: &mut fmt::Formatter<'_>, label: &str, name: &Option<String>) -> fmt::Result {
            match name {
                Some(n) => write!(f, "{label}: {n}"),
                None => f.write_str(label),
            }
        }
        match self {
            View::All { tab: AllTab::Songs } => f.write_str("All songs"),
            View::All { tab: AllTab::Artist(n) } => narrowed(f, "All songs / artist", n),
            View::All { tab: AllTab::Album(n) } => narrowed(f, "All songs / album", n),
            View::Folder(p) => write!(f, "Folder: {p}"),
            View::Artist(n) => narrowed(f, "Artist", n),
            View::Album(n) => narrowed(f, "Album", n),
            View::Genre(n) => narrowed(f, "Genre", n),
            View::Year(n) => narrowed(f, "Year", n),
            View::Playlist(id) => write!(f, "Playlist {id}"),
            View::Recent => f.write_str("Recently played"),
            View::Favorites { tab: FavoritesTab::Songs } => f.write_str("Favorites"),
            View::Favorites { tab: FavoritesTab::Artist(n) } => narrowed(f, "Favorites / artist", n),
            View::Favorites { tab: FavoritesTab::Album(n) } => narrowed(f, "Favorites / album", n),
        }
    }
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

fn narrow<'a, F>(songs: impl Iterator<Item = &'a Song>, name: &Option<String>, key: F) -> Vec<&'a Song>
where
    F: Fn(&Song) -> &str,
{
    match name {
        Some(n) => songs.filter(|s| key(s) == n.as_str()).collect(),
        None => songs.collect(),
    }
}

/// Materialise the song list for `view`, filtered by the search query.
///
/// Library views match name, artist or album; favorites match name or
/// artist; recent matches name only. Playlists are not searched.
pub fn display_songs(lib: &Library, history: &History, view: &View, query: &str) -> Vec<Song> {
    let q = query.trim().to_lowercase();
    let lib_match = |s: &Song| {
        q.is_empty() || contains_ci(&s.name, &q) || contains_ci(&s.artist, &q) || contains_ci(&s.album, &q)
    };

    let picked: Vec<&Song> = match view {
        View::All { tab } => {
            let all = lib.songs().iter();
            match tab {
                AllTab::Songs => all.collect(),
                AllTab::Artist(n) => narrow(all, n, Song::artist_or_unknown),
                AllTab::Album(n) => narrow(all, n, Song::album_or_unknown),
            }
            .into_iter()
            .filter(|&s| lib_match(s))
            .collect()
        }
        View::Folder(path) => lib.songs_in_folder(path).filter(|&s| lib_match(s)).collect(),
        View::Artist(n) | View::Album(n) | View::Genre(n) | View::Year(n) => {
            let key: fn(&Song) -> &str = match view {
                View::Artist(_) => Song::artist_or_unknown,
                View::Album(_) => Song::album_or_unknown,
                View::Genre(_) => Song::genre_or_unknown,
                _ => Song::year_or_unknown,
            };
            narrow(lib.songs().iter(), n, key)
                .into_iter()
                .filter(|&s| lib_match(s))
                .collect()
        }
        View::Playlist(id) => return lib.playlist_songs(id),
        View::Recent => history
            .songs()
            .filter(|s| q.is_empty() || contains_ci(&s.name, &q))
            .collect(),
        View::Favorites { tab } => {
            let favs = lib.favorite_songs();
            match tab {
                FavoritesTab::Songs => favs.collect(),
                FavoritesTab::Artist(n) => narrow(favs, n, Song::artist_or_unknown),
                FavoritesTab::Album(n) => narrow(favs, n, Song::album_or_unknown),
            }
            .into_iter()
            .filter(|s| q.is_empty() || contains_ci(&s.name, &q) || contains_ci(&s.artist, &q))
            .collect()
        }
    };
    picked.into_iter().cloned().collect()
}
