use serde::{Deserialize, Serialize};

/// A track in the local library. `path` is its identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Song {
    /// File name as found on disk.
    pub name: String,
    #[serde(default)]
    pub title: String,
    pub path: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub album: String,
    /// Seconds; 0 when unknown.
    #[serde(default)]
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_depth: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl Song {
    /// Tag title, falling back to the file name.
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.name
        } else {
            &self.title
        }
    }

    pub fn artist_or_unknown(&self) -> &str {
        non_empty_or_unknown(&self.artist)
    }

    pub fn album_or_unknown(&self) -> &str {
        non_empty_or_unknown(&self.album)
    }

    pub fn genre_or_unknown(&self) -> &str {
        non_empty_or_unknown(self.genre.as_deref().unwrap_or_default())
    }

    /// First four characters of the year tag, or `Unknown`.
    pub fn year_or_unknown(&self) -> &str {
        match self.year.as_deref() {
            Some(y) if y.chars().count() >= 4 => {
                let end = y.char_indices().nth(4).map(|(i, _)| i).unwrap_or(y.len());
                &y[..end]
            }
            _ => UNKNOWN,
        }
    }

    /// File name portion of `path`, for either separator style.
    pub fn file_name(&self) -> &str {
        file_name_of(&self.path)
    }
}

pub const UNKNOWN: &str = "Unknown";

fn non_empty_or_unknown(s: &str) -> &str {
    if s.is_empty() { UNKNOWN } else { s }
}

pub fn file_name_of(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// A play-history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub song: Song,
    /// Unix milliseconds.
    pub played_at: i64,
}

/// A user playlist. Songs are referenced by path and resolved against the
/// library when shown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub song_paths: Vec<String>,
    /// Unix milliseconds.
    #[serde(default)]
    pub created_at: i64,
}

/// Current time in unix milliseconds.
pub fn now_millis() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
