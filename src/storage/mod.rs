use anyhow::Context;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::warn;

/// Persisted slices of app state. Each one is an independent JSON value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Volume,
    PlayMode,
    Library,
    WatchedFolders,
    Favorites,
    Playlists,
    Settings,
    History,
    Queue,
    LastSong,
    LastPosition,
}

impl Key {
    pub fn as_str(self) -> &'static str {
        match self {
            Key::Volume => "volume",
            Key::PlayMode => "play_mode",
            Key::Library => "library",
            Key::WatchedFolders => "watched_folders",
            Key::Favorites => "favorites",
            Key::Playlists => "playlists",
            Key::Settings => "settings",
            Key::History => "history",
            Key::Queue => "queue",
            Key::LastSong => "last_song",
            Key::LastPosition => "last_position",
        }
    }
}

pub struct Storage {
    conn: Connection,
}

impl Storage {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }

        let conn = Connection::open(path).with_context(|| format!("open {}", path.display()))?;
        let s = Self { conn };
        s.init_schema()?;
        Ok(s)
    }

    fn init_schema(&self) -> anyhow::Result<()> {
        self.conn
            .execute_batch(
                r#"
CREATE TABLE IF NOT EXISTS kv (
  key TEXT PRIMARY KEY,
  value_json TEXT NOT NULL,
  updated_at INTEGER NOT NULL
);
"#,
            )
            .context("init schema")?;
        Ok(())
    }

    pub fn save<T: Serialize + ?Sized>(&self, key: Key, value: &T) -> anyhow::Result<()> {
        let json = serde_json::to_string(value).with_context(|| format!("serialize {}", key.as_str()))?;
        self.conn
            .execute(
                r#"
INSERT INTO kv(key, value_json, updated_at)
VALUES(?1, ?2, ?3)
ON CONFLICT(key) DO UPDATE SET
  value_json=excluded.value_json,
  updated_at=excluded.updated_at
"#,
                params![key.as_str(), json, crate::library::model::now_millis()],
            )
            .with_context(|| format!("save {}", key.as_str()))?;
        Ok(())
    }

    pub fn load_raw(&self, key: Key) -> anyhow::Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value_json FROM kv WHERE key=?1",
                params![key.as_str()],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("load {}", key.as_str()))
    }

    /// Missing, unreadable or malformed slices all come back as `None`;
    /// the latter two are logged.
    pub fn load<T: DeserializeOwned>(&self, key: Key) -> Option<T> {
        let raw = match self.load_raw(key) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("{e:#}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key = key.as_str(), "ignoring malformed stored value: {e}");
                None
            }
        }
    }

    pub fn remove(&self, key: Key) -> anyhow::Result<()> {
        self.conn
            .execute("DELETE FROM kv WHERE key=?1", params![key.as_str()])
            .with_context(|| format!("remove {}", key.as_str()))?;
        Ok(())
    }

    #[cfg(test)]
    fn put_raw(&self, key: Key, raw: &str) {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO kv(key, value_json, updated_at) VALUES(?1, ?2, 0)",
                params![key.as_str(), raw],
            )
            .unwrap();
    }
}
