use crate::library::model::Song;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// How the queue moves on when a track ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayMode {
    #[default]
    Sequential,
    RepeatOne,
    Shuffle,
}

impl PlayMode {
    /// Sequential → RepeatOne → Shuffle → Sequential.
    pub fn next(self) -> Self {
        match self {
            PlayMode::Sequential => PlayMode::RepeatOne,
            PlayMode::RepeatOne => PlayMode::Shuffle,
            PlayMode::Shuffle => PlayMode::Sequential,
        }
    }
}

impl fmt::Display for PlayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlayMode::Sequential => "sequential",
            PlayMode::RepeatOne => "repeat one",
            PlayMode::Shuffle => "shuffle",
        })
    }
}

/// Persisted form of the queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub songs: Vec<Song>,
    pub current_index: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct Queue {
    songs: Vec<Song>,
    current_index: Option<usize>,
    mode: PlayMode,
    shuffle_order: Vec<usize>,
    /// Songs queued with "play next"; the front plays first.
    play_next: VecDeque<Song>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: QueueSnapshot, mode: PlayMode) -> Self {
        let current_index = snapshot.current_index.filter(|&i| i < snapshot.songs.len());
        let mut queue = Self {
            songs: snapshot.songs,
            current_index,
            mode,
            ..Self::default()
        };
        queue.rebuild_shuffle_order();
        queue
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            songs: self.songs.clone(),
            current_index: self.current_index,
        }
    }

    pub fn mode(&self) -> PlayMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: PlayMode) {
        self.mode = mode;
        self.rebuild_shuffle_order();
    }

    /// Advance to the next play mode and return it.
    pub fn cycle_mode(&mut self) -> PlayMode {
        self.set_mode(self.mode.next());
        self.mode
    }

    /// Replace the queue with `view` and focus `start_path`. Returns false,
    /// leaving the queue untouched, when the path is not in the view.
    pub fn replace_with(&mut self, view: Vec<Song>, start_path: &str) -> bool {
        let Some(index) = view.iter().position(|s| s.path == start_path) else {
            return false;
        };
        self.songs = view;
        self.current_index = Some(index);
        self.rebuild_shuffle_order();
        true
    }

    /// Focus `song` if it is queued, otherwise append it and focus it.
    pub fn focus_or_append(&mut self, song: Song) {
        match self.songs.iter().position(|s| s.path == song.path) {
            Some(index) => self.current_index = Some(index),
            None => {
                self.songs.push(song);
                self.current_index = Some(self.songs.len() - 1);
                self.rebuild_shuffle_order();
            }
        }
    }

    /// Queue `song` to play after the current one. The latest request
    /// plays first.
    pub fn push_play_next(&mut self, song: Song) {
        self.play_next.retain(|s| s.path != song.path);
        self.play_next.push_front(song);
    }

    pub fn play_next_queue(&self) -> impl Iterator<Item = &Song> {
        self.play_next.iter()
    }

    /// Remove a track at the given index
    pub fn remove(&mut self, index: usize) -> Option<Song> {
        if index >= self.songs.len() {
            return None;
        }

        let song = self.songs.remove(index);

        if let Some(current) = self.current_index {
            if index < current {
                self.current_index = Some(current - 1);
            } else if index == current {
                if self.songs.is_empty() {
                    self.current_index = None;
                } else if current >= self.songs.len() {
                    self.current_index = Some(self.songs.len() - 1);
                }
            }
        }

        self.rebuild_shuffle_order();
        Some(song)
    }

    /// Drop `path` from both the queue and the play-next list.
    pub fn remove_path(&mut self, path: &str) {
        self.play_next.retain(|s| s.path != path);
        if let Some(index) = self.songs.iter().position(|s| s.path == path) {
            self.remove(index);
        }
    }

    /// The file at `old` moved to `new`.
    pub fn rename_path(&mut self, old: &str, new: &str) {
        for song in self.songs.iter_mut().chain(self.play_next.iter_mut()) {
            if song.path == old {
                song.path = new.to_string();
                song.name = crate::library::model::file_name_of(new).to_string();
            }
        }
    }

    pub fn clear(&mut self) {
        self.songs.clear();
        self.current_index = None;
        self.shuffle_order.clear();
        self.play_next.clear();
    }

    /// Move a track from one position to another
    pub fn move_track(&mut self, from: usize, to: usize) {
        if from >= self.songs.len() || to >= self.songs.len() || from == to {
            return;
        }

        let song = self.songs.remove(from);
        self.songs.insert(to, song);

        if let Some(current) = self.current_index {
            if from == current {
                self.current_index = Some(to);
            } else if from < current && to >= current {
                self.current_index = Some(current - 1);
            } else if from > current && to <= current {
                self.current_index = Some(current + 1);
            }
        }

        self.rebuild_shuffle_order();
    }

    /// Drop entries whose path `known` rejects, keeping the current song
    /// focused when it survives.
    pub fn retain_known(&mut self, known: impl Fn(&str) -> bool) {
        let current_path = self.current().map(|s| s.path.clone());
        self.songs.retain(|s| known(&s.path));
        self.play_next.retain(|s| known(&s.path));
        self.current_index = match current_path {
            Some(p) => self
                .songs
                .iter()
                .position(|s| s.path == p)
                .or(if self.songs.is_empty() { None } else { Some(0) }),
            None => None,
        };
        self.rebuild_shuffle_order();
    }

    pub fn current(&self) -> Option<&Song> {
        self.current_index.and_then(|i| self.songs.get(i))
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    /// Move to the next song. A pending play-next song wins and is placed
    /// right after the current position; otherwise the index wraps.
    pub fn advance(&mut self) -> Option<&Song> {
        if let Some(song) = self.play_next.pop_front() {
            self.insert_after_current(song);
            return self.current();
        }
        let next = match self.current_index {
            Some(current) => self.step(current, true)?,
            None if self.songs.is_empty() => return None,
            None => 0,
        };
        self.current_index = Some(next);
        self.songs.get(next)
    }

    /// Move to the previous song, wrapping to the end.
    pub fn go_back(&mut self) -> Option<&Song> {
        let current = self.current_index?;
        let prev = self.step(current, false)?;
        self.current_index = Some(prev);
        self.songs.get(prev)
    }

    /// The song to play after the current one ended: the same one in
    /// repeat-one mode, otherwise the next.
    pub fn after_finish(&mut self) -> Option<&Song> {
        if self.mode == PlayMode::RepeatOne && self.play_next.is_empty() && self.current_index.is_some() {
            return self.current();
        }
        self.advance()
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    fn insert_after_current(&mut self, song: Song) {
        if let Some(existing) = self.songs.iter().position(|s| s.path == song.path) {
            self.current_index = Some(existing);
            return;
        }
        let at = self.current_index.map_or(self.songs.len(), |i| i + 1);
        self.songs.insert(at, song);
        self.current_index = Some(at);
        self.rebuild_shuffle_order();
    }

    fn step(&self, current: usize, forward: bool) -> Option<usize> {
        let len = self.songs.len();
        if len == 0 {
            return None;
        }
        if self.mode == PlayMode::Shuffle && self.shuffle_order.len() == len {
            let pos = self.shuffle_order.iter().position(|&x| x == current)?;
            let next = if forward { (pos + 1) % len } else { (pos + len - 1) % len };
            Some(self.shuffle_order[next])
        } else if forward {
            Some((current + 1) % len)
        } else {
            Some((current + len - 1) % len)
        }
    }

    fn rebuild_shuffle_order(&mut self) {
        if self.mode != PlayMode::Shuffle || self.songs.is_empty() {
            self.shuffle_order.clear();
            return;
        }

        let mut rng = rand::rng();
        self.shuffle_order = (0..self.songs.len()).collect();
        self.shuffle_order.shuffle(&mut rng);

        // Current song leads the permutation.
        if let Some(current) = self.current_index
            && let Some(pos) = self.shuffle_order.iter().position(|&x| x == current)
        {
            self.shuffle_order.swap(0, pos);
        }
    }
}
