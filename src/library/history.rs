use super::model::{HistoryItem, Song};

/// Upper bound on remembered plays.
pub const HISTORY_CAP: usize = 1000;

/// Recently played songs, most recent first, one entry per path.
#[derive(Debug, Clone, Default)]
pub struct History {
    items: Vec<HistoryItem>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore from persisted entries, enforcing the invariants in case the
    /// stored list predates them.
    pub fn from_items(items: Vec<HistoryItem>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let mut items: Vec<_> = items
            .into_iter()
            .filter(|i| seen.insert(i.song.path.clone()))
            .collect();
        items.truncate(HISTORY_CAP);
        Self { items }
    }

    /// Record a play. A song already present moves to the front.
    pub fn record(&mut self, song: Song, played_at: i64) {
        self.items.retain(|i| i.song.path != song.path);
        self.items.insert(0, HistoryItem { song, played_at });
        self.items.truncate(HISTORY_CAP);
    }

    pub fn remove(&mut self, path: &str) {
        self.items.retain(|i| i.song.path != path);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn items(&self) -> &[HistoryItem] {
        &self.items
    }

    pub fn songs(&self) -> impl Iterator<Item = &Song> {
        self.items.iter().map(|i| &i.song)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(path: &str) -> Song {
        Song {
            name: path.to_string(),
            path: path.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn replay_moves_to_front_without_duplicate() {
        let mut h = History::new();
        h.record(song("a"), 1);
        h.record(song("b"), 2);
        h.record(song("a"), 3);

        let paths: Vec<_> = h.songs().map(|s| s.path.as_str()).collect();
        assert_eq!(paths, vec!["a", "b"]);
        assert_eq!(h.items()[0].played_at, 3);
    }

    #[test]
    fn caps_at_one_thousand_evicting_oldest() {
        let mut h = History::new();
        for i in 0..=HISTORY_CAP {
            h.record(song(&format!("s{i}")), i as i64);
        }
        assert_eq!(h.len(), HISTORY_CAP);
        assert_eq!(h.items()[0].song.path, format!("s{HISTORY_CAP}"));
        assert!(h.songs().all(|s| s.path != "s0"));
    }

    #[test]
    fn restore_drops_duplicates() {
        let items = vec![
            HistoryItem { song: song("a"), played_at: 5 },
            HistoryItem { song: song("a"), played_at: 1 },
            HistoryItem { song: song("b"), played_at: 0 },
        ];
        let h = History::from_items(items);
        assert_eq!(h.len(), 2);
        assert_eq!(h.items()[0].played_at, 5);
    }
}
