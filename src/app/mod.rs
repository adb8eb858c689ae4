pub mod actions;
pub mod events;
pub mod state;

use crate::config::Config;
use crate::config::settings::AppSettings;
use crate::input;
use crate::library::Library;
use crate::library::display::{format_duration, format_time_ago};
use crate::library::groups;
use crate::library::history::History;
use crate::library::model::{self, HistoryItem, Playlist, Song};
use crate::library::organize::organized_path;
use crate::library::view::{self, AllTab, FavoritesTab, View};
use crate::lyrics::{LyricOptions, LyricsState};
use crate::player::clock::{PlaybackClock, Reconcile, Tick};
use crate::player::timers::{self, PlaybackTimers, ScheduledTask, SeekDebouncer};
use crate::player::{Backend, BackendEvent, MediaKey, TrackMetadata};
use crate::queue::{PlayMode, Queue, QueueSnapshot};
use crate::storage::{Key, Storage};
use crate::theme::{self, PaletteCache};
use actions::{Action, SongRef};
use events::{Event, InputEvent, TaskEvent, TimerEvent};
use serde::Serialize;
use state::{AppState, DEFAULT_VOLUME, Toast, ToastKind};
use std::io::Write;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub struct App<B: Backend> {
    cfg: Config,
    backend: B,
    storage: Option<Storage>,
    state: AppState,
    library: Library,
    history: History,
    queue: Queue,
    clock: PlaybackClock,
    timers: PlaybackTimers,
    seek: SeekDebouncer,
    /// Resume playback once the pending seek lands.
    play_after_seek: bool,
    volume_restore: Option<ScheduledTask>,
    volume_restore_seq: u64,
    palettes: PaletteCache,
    out: Box<dyn Write + Send>,
}

impl<B: Backend> App<B> {
    pub fn new(cfg: Config, backend: B, storage: Option<Storage>) -> Self {
        let clock = PlaybackClock::new(cfg.playback.snap_threshold_secs);
        let seek = SeekDebouncer::new(cfg.playback.seek_debounce());
        Self {
            cfg,
            backend,
            storage,
            state: AppState::new(),
            library: Library::new(),
            history: History::new(),
            queue: Queue::new(),
            clock,
            timers: PlaybackTimers::new(),
            seek,
            play_after_seek: false,
            volume_restore: None,
            volume_restore_seq: 0,
            palettes: PaletteCache::new(),
            out: Box::new(std::io::stdout()),
        }
    }

    /// Send console output somewhere other than stdout.
    pub fn with_output(mut self, out: Box<dyn Write + Send>) -> Self {
        self.out = out;
        self
    }

    pub async fn run(&mut self, tx: mpsc::Sender<Event>, mut rx: mpsc::Receiver<Event>) -> anyhow::Result<()> {
        self.restore(&tx).await;
        self.print_status();

        while let Some(ev) = rx.recv().await {
            self.handle_event(ev, &tx).await;
            if self.state.should_quit {
                break;
            }
        }

        self.save_state_on_quit();
        Ok(())
    }

    // --- persistence ---

    /// Load every persisted slice. Each one is independent: a missing or
    /// malformed slice leaves its default in place.
    async fn restore(&mut self, tx: &mpsc::Sender<Event>) {
        let Some(storage) = &self.storage else {
            return;
        };

        let settings = storage
            .load::<serde_json::Value>(Key::Settings)
            .map(|raw| AppSettings::from_stored(&raw))
            .unwrap_or_default();
        let volume = storage.load::<u8>(Key::Volume);
        let mode = storage.load::<PlayMode>(Key::PlayMode).unwrap_or_default();
        let songs = storage.load::<Vec<Song>>(Key::Library).unwrap_or_default();
        let folders = storage.load::<Vec<String>>(Key::WatchedFolders).unwrap_or_default();
        let favorites = storage.load::<Vec<String>>(Key::Favorites).unwrap_or_default();
        let playlists = storage.load::<Vec<Playlist>>(Key::Playlists).unwrap_or_default();
        let history = storage.load::<Vec<HistoryItem>>(Key::History).unwrap_or_default();
        let queue = storage.load::<QueueSnapshot>(Key::Queue).unwrap_or_default();
        let last_song = storage.load::<Song>(Key::LastSong);
        let last_position = storage.load::<f64>(Key::LastPosition).unwrap_or(0.0);

        self.state.settings = settings;
        self.persist(Key::Settings, &self.state.settings.to_stored());

        self.library = Library::from_parts(songs, folders, favorites, playlists);
        self.history = History::from_items(history);
        self.queue = Queue::from_snapshot(queue, mode);
        let library = &self.library;
        self.queue.retain_known(|p| library.contains(p));

        if let Some(volume) = volume {
            self.state.volume = volume.min(100);
            if let Err(e) = self.backend.set_volume(self.state.volume_level()).await {
                warn!("restore volume: {e:#}");
            }
        }

        if let Some(song) = last_song {
            info!("restored last song {}", song.path);
            self.queue.focus_or_append(song.clone());
            self.state.is_song_loaded = false;
            self.state.position = if song.duration > 0.0 {
                last_position.clamp(0.0, song.duration)
            } else {
                last_position.max(0.0)
            };
            self.clock.hold(self.state.position);
            self.spawn_cover_load(song.path.clone(), tx);
            self.state.current_song = Some(song);
        }
    }

    fn persist<T: Serialize + ?Sized>(&self, key: Key, value: &T) {
        if let Some(storage) = &self.storage
            && let Err(e) = storage.save(key, value)
        {
            warn!("{e:#}");
        }
    }

    fn persist_library(&self) {
        self.persist(Key::Library, self.library.songs());
        self.persist(Key::WatchedFolders, self.library.watched_folders());
        self.persist(Key::Favorites, self.library.favorites());
        self.persist(Key::Playlists, self.library.playlists());
    }

    fn persist_history(&self) {
        self.persist(Key::History, self.history.items());
    }

    fn persist_queue(&self) {
        self.persist(Key::Queue, &self.queue.snapshot());
    }

    fn persist_position(&self) {
        self.persist(Key::LastPosition, &self.state.position);
    }

    fn save_state_on_quit(&mut self) {
        self.halt_timers();
        self.state.position = self.clock.interpolate();
        self.persist_position();
        self.persist_queue();
        if let Some(song) = &self.state.current_song {
            self.persist(Key::LastSong, song);
        }
    }

    // --- event dispatch ---

    pub async fn handle_event(&mut self, ev: Event, tx: &mpsc::Sender<Event>) {
        match ev {
            Event::Input(input_ev) => match input::map_input_to_action(input_ev) {
                Ok(Some(action)) => self.handle_action(action, tx).await,
                Ok(None) => {}
                Err(msg) => self.say(msg),
            },
            Event::Backend(be) => self.handle_backend(be, tx).await,
            Event::Timer(te) => self.handle_timer(te, tx).await,
            Event::Task(task) => self.handle_task(task, tx),
        }
    }

    async fn handle_backend(&mut self, ev: BackendEvent, tx: &mpsc::Sender<Event>) {
        match ev {
            BackendEvent::MediaKey(MediaKey::Play) if !self.state.is_playing => self.toggle_play(tx).await,
            BackendEvent::MediaKey(MediaKey::Pause) if self.state.is_playing => self.toggle_play(tx).await,
            BackendEvent::MediaKey(MediaKey::Play | MediaKey::Pause) => {}
            BackendEvent::MediaKey(MediaKey::Next) => self.next(tx).await,
            BackendEvent::MediaKey(MediaKey::Previous) => self.prev(tx).await,
            BackendEvent::Disconnected => {
                self.halt_timers();
                self.clock.stop();
                self.state.position = self.clock.interpolate();
                self.state.is_playing = false;
                self.state.is_song_loaded = false;
                self.toast(Toast::error("audio backend disconnected"));
            }
        }
    }

    async fn handle_timer(&mut self, ev: TimerEvent, tx: &mpsc::Sender<Event>) {
        match ev {
            TimerEvent::Frame { generation } => {
                if !self.timers.is_current(generation) {
                    return;
                }
                match self.clock.tick(self.state.duration()) {
                    Tick::Position(p) => {
                        self.state.position = p;
                        self.refresh_lyric();
                    }
                    Tick::Finished => {
                        self.state.position = self.state.duration();
                        self.on_track_finished(tx).await;
                    }
                    Tick::Idle => {}
                }
            }
            TimerEvent::Sync { generation } => {
                if self.timers.is_current(generation) {
                    self.spawn_progress_fetch(generation, tx);
                }
            }
            TimerEvent::SeekCommit { seq, target } => {
                if self.seek.take(seq) {
                    self.commit_seek(target, tx).await;
                }
            }
            TimerEvent::RestoreVolume { seq } => {
                if seq != self.volume_restore_seq || self.volume_restore.take().is_none() {
                    return;
                }
                if let Err(e) = self.backend.set_volume(self.state.volume_level()).await {
                    warn!("restore volume after seek: {e:#}");
                }
            }
        }
    }

    fn handle_task(&mut self, ev: TaskEvent, tx: &mpsc::Sender<Event>) {
        match ev {
            TaskEvent::Progress { generation, seconds } => {
                if !self.timers.is_current(generation) {
                    return;
                }
                match self.clock.reconcile(seconds) {
                    Reconcile::Snapped { drift, to } => {
                        debug!("clock snapped by {drift:+.3}s to {to:.3}");
                        self.state.position = to;
                        self.refresh_lyric();
                    }
                    Reconcile::Kept { .. } | Reconcile::Idle => {}
                }
            }
            TaskEvent::LyricsLoaded { path, lyrics } => {
                if !self.state.lyrics.is_loading_for(&path) {
                    debug!("dropping stale lyrics for {path}");
                    return;
                }
                self.state.lyrics = lyrics;
                self.state.lyric_index = None;
                let opts = self.lyric_options();
                let index = self.state.lyrics.current_index(self.state.position, self.cfg.playback.audio_latency_secs);
                self.state.lyric_index = index;
                if let Some(shown) = self.state.lyrics.display(index, opts) {
                    self.say(format!("  ~ {}", shown.lines.join(" / ")));
                }
            }
            TaskEvent::CoverLoaded { path, cover } => {
                if !self.state.is_current(&path) {
                    return;
                }
                self.state.cover = cover.clone();
                let count = self.cfg.theme.palette_size;
                match cover {
                    None => self.state.palette = theme::palette::fallback(count),
                    Some(c) => match self.palettes.get(&c, count) {
                        Some(colors) => self.state.palette = colors,
                        None => self.spawn_palette(c, count, tx),
                    },
                }
            }
            TaskEvent::PaletteReady { cover, colors } => {
                self.palettes.put(cover.clone(), colors.clone());
                if self.state.cover.as_deref() == Some(cover.as_str()) {
                    self.state.palette = colors;
                    debug!("palette {}", self.palette_text());
                }
            }
        }
    }

    pub async fn handle_action(&mut self, action: Action, tx: &mpsc::Sender<Event>) {
        match action {
            Action::Quit => self.state.should_quit = true,
            Action::Help => self.say(input::HELP),
            Action::Status => self.print_status(),
            Action::List => self.print_view(),

            Action::Play(r) => {
                if let Some(song) = self.resolve(&r) {
                    self.select_song(song, tx).await;
                }
            }
            Action::TogglePlay => self.toggle_play(tx).await,
            Action::Next => self.next(tx).await,
            Action::Prev => self.prev(tx).await,
            Action::SeekTo(t) => {
                self.seek_to(t, tx);
            }
            Action::StepSeek(delta) => {
                let target = self.clock.interpolate() + delta;
                self.seek_to(target, tx);
            }
            Action::Step(direction) => {
                let target = self.clock.interpolate() + f64::from(direction) * self.cfg.playback.step_seek_secs;
                self.seek_to(target, tx);
            }
            Action::PlayAt(t) => {
                if self.seek_to(t, tx) && !self.state.is_playing {
                    self.play_after_seek = true;
                }
            }
            Action::SetVolume(v) => {
                if self.apply_volume(v).await {
                    self.state.muted_from = None;
                }
            }
            Action::ToggleMute => {
                if self.state.volume > 0 {
                    let before = self.state.volume;
                    if self.apply_volume(0).await {
                        self.state.muted_from = Some(before);
                    }
                } else {
                    let back = self.state.muted_from.filter(|v| *v > 0).unwrap_or(DEFAULT_VOLUME);
                    if self.apply_volume(back).await {
                        self.state.muted_from = None;
                    }
                }
            }
            Action::CycleMode => {
                let mode = self.queue.cycle_mode();
                self.persist(Key::PlayMode, &mode);
                self.say(format!("mode: {mode}"));
            }

            Action::PlayNext(r) => {
                if let Some(song) = self.resolve(&r) {
                    let title = song.display_title().to_string();
                    self.queue.push_play_next(song);
                    self.toast(Toast::success(format!("{title} plays next")));
                }
            }
            Action::ShowQueue => self.print_queue(),
            Action::ClearQueue => {
                self.queue.clear();
                self.persist_queue();
                self.toast(Toast::success("queue cleared"));
            }

            Action::MoveInQueue { from, to } => {
                let len = self.queue.len();
                if from == 0 || to == 0 || from > len || to > len {
                    self.toast(Toast::error(format!("queue has {len} songs")));
                    return;
                }
                self.queue.move_track(from - 1, to - 1);
                self.persist_queue();
                self.print_queue();
            }
            Action::RemoveFromQueue(n) => match n.checked_sub(1).and_then(|i| self.queue.remove(i)) {
                Some(song) => {
                    self.persist_queue();
                    self.toast(Toast::success(format!("removed {} from queue", song.display_title())));
                }
                None => self.toast(Toast::error(format!("no queue position {n}"))),
            },

            Action::SetView(v) => {
                if let View::Playlist(id) = &v
                    && self.library.playlist(id).is_none()
                {
                    self.toast(Toast::error(format!("no playlist {id}")));
                    return;
                }
                self.state.view = v;
                self.print_view();
            }
            Action::Search(q) => {
                self.state.search_query = q;
                self.print_view();
            }

            Action::ToggleFavorite(r) => {
                if let Some(song) = self.resolve(&r) {
                    let now = self.library.toggle_favorite(&song.path);
                    self.persist_library();
                    let verb = if now { "added to" } else { "removed from" };
                    self.toast(Toast::success(format!("{} {verb} favorites", song.display_title())));
                }
            }
            Action::ClearFavorites => {
                self.library.clear_favorites();
                self.persist_library();
                self.toast(Toast::success("favorites cleared"));
            }
            Action::RemoveFromView(r) => {
                if let Some(song) = self.resolve(&r) {
                    self.remove_from_view(&song);
                }
            }
            Action::ClearHistory => {
                self.history.clear();
                self.persist_history();
                self.toast(Toast::success("history cleared"));
            }

            Action::AddFolder(path) => self.add_folder(&path).await,
            Action::ImportFolder(root) => self.import_folder_structure(&root).await,
            Action::RefreshFolder(path) => self.refresh_folder(&path).await,
            Action::Unwatch(path) => {
                self.library.remove_folder(&path);
                if self.state.view == View::Folder(path.clone()) {
                    self.state.view = View::default();
                }
                self.persist_library();
                self.toast(Toast::success(format!("stopped watching {path}")));
            }
            Action::ClearLibrary => {
                self.library.clear();
                self.persist_library();
                self.toast(Toast::success("library cleared"));
            }

            Action::CreatePlaylist(name) => {
                match self.library.create_playlist(&name, &[], model::now_millis()) {
                    Some(id) => {
                        self.persist_library();
                        self.toast(Toast::success(format!("created playlist {} ({id})", name.trim())));
                    }
                    None => self.toast(Toast::error("playlist name is empty")),
                }
            }
            Action::DeletePlaylist(id) => {
                if self.library.delete_playlist(&id) {
                    if self.state.view == View::Playlist(id.clone()) {
                        self.state.view = View::default();
                    }
                    self.persist_library();
                    self.toast(Toast::success("playlist deleted"));
                } else {
                    self.toast(Toast::error(format!("no playlist {id}")));
                }
            }
            Action::AddToPlaylist { id, song } => {
                let Some(song) = self.resolve(&song) else {
                    return;
                };
                if self.library.playlist(&id).is_none() {
                    self.toast(Toast::error(format!("no playlist {id}")));
                } else if self.library.add_to_playlist(&id, &song.path) {
                    self.persist_library();
                    self.toast(Toast::success(format!("added {}", song.display_title())));
                } else {
                    self.toast(Toast::error("already in that playlist"));
                }
            }
            Action::RemoveFromPlaylist { id, song } => {
                if let Some(song) = self.resolve(&song) {
                    self.library.remove_from_playlist(&id, &song.path);
                    self.persist_library();
                }
            }
            Action::ListPlaylists => self.print_playlists(),

            Action::MoveFile { song, new_path } => {
                if let Some(song) = self.resolve(&song)
                    && self.move_file(&song, &new_path).await
                {
                    self.toast(Toast::success(format!("moved to {new_path}")));
                }
            }
            Action::MoveToFolder { songs, folder } => {
                let songs: Vec<Song> = songs.iter().filter_map(|r| self.resolve(r)).collect();
                if !songs.is_empty() {
                    self.move_files_to_folder(&songs, &folder).await;
                }
            }
            Action::Organize(r) => {
                if let Some(song) = self.resolve(&r) {
                    self.organize_song(&song).await;
                }
            }
            Action::DeleteFile(r) => {
                if let Some(song) = self.resolve(&r) {
                    self.delete_from_disk(&song).await;
                }
            }
            Action::Reveal(r) => {
                if let Some(song) = self.resolve(&r) {
                    self.show_in_folder(song.path);
                }
            }
        }
    }

    // --- playback ---

    /// Play `song` picked from the current view. The queue becomes that
    /// view when it contains the song.
    async fn select_song(&mut self, song: Song, tx: &mpsc::Sender<Event>) {
        let shown = self.display_songs();
        if !self.queue.replace_with(shown, &song.path) {
            self.queue.focus_or_append(song.clone());
        }
        self.persist_queue();
        self.play_song(song, tx).await;
    }

    async fn play_song(&mut self, song: Song, tx: &mpsc::Sender<Event>) {
        self.halt_timers();
        self.seek.cancel();
        self.play_after_seek = false;

        self.state.current_song = Some(song.clone());
        self.state.is_song_loaded = true;
        self.state.position = 0.0;
        self.state.cover = None;
        self.state.lyrics = LyricsState::loading(song.path.clone());
        self.state.lyric_index = None;
        self.clock.rearm();
        self.clock.hold(0.0);

        let meta = TrackMetadata::for_song(&song, None);
        if let Err(e) = self.backend.play_audio(&song.path, &meta).await {
            warn!("play_audio {}: {e:#}", song.path);
            self.state.is_playing = false;
            self.state.is_song_loaded = false;
            self.state.lyrics = LyricsState::NotLoaded;
            self.toast(Toast::error(format!("cannot play {}: {e}", song.display_title())));
            return;
        }

        self.history.record(song.clone(), model::now_millis());
        self.persist_history();
        self.persist(Key::LastSong, &song);

        self.state.is_playing = true;
        self.start_clock(0.0, tx);
        self.spawn_lyrics_load(song.path.clone(), tx);
        self.spawn_cover_load(song.path.clone(), tx);
        self.print_now_playing();
    }

    async fn toggle_play(&mut self, tx: &mpsc::Sender<Event>) {
        let Some(song) = self.state.current_song.clone() else {
            self.toast(Toast::error("nothing to play"));
            return;
        };

        if self.state.is_playing {
            if let Err(e) = self.backend.pause_audio().await {
                warn!("pause_audio: {e:#}");
                self.toast(Toast::error(format!("pause failed: {e}")));
                return;
            }
            self.halt_timers();
            self.clock.stop();
            self.state.position = self.clock.interpolate();
            self.state.is_playing = false;
            self.persist_position();
            self.say(format!("paused at {}", format_duration(self.state.position)));
            return;
        }

        if !self.state.is_song_loaded {
            let resume_at = self.state.position;
            let meta = TrackMetadata::for_song(&song, self.state.cover.as_deref());
            if let Err(e) = self.backend.play_audio(&song.path, &meta).await {
                warn!("play_audio {}: {e:#}", song.path);
                self.toast(Toast::error(format!("cannot play {}: {e}", song.display_title())));
                return;
            }
            let mut start = resume_at;
            if resume_at >= 1.0
                && let Err(e) = self.backend.seek_audio(resume_at.floor() as u32, true).await
            {
                warn!("seek to restored position: {e:#}");
                start = 0.0;
            }
            self.state.is_song_loaded = true;
            self.state.lyrics = LyricsState::loading(song.path.clone());
            self.state.lyric_index = None;
            self.spawn_lyrics_load(song.path.clone(), tx);
            if self.state.cover.is_none() {
                self.spawn_cover_load(song.path.clone(), tx);
            }
            self.clock.rearm();
            self.state.position = start;
            self.state.is_playing = true;
            self.start_clock(start, tx);
            self.print_now_playing();
            return;
        }

        if let Err(e) = self.backend.resume_audio().await {
            warn!("resume_audio: {e:#}");
            self.toast(Toast::error(format!("resume failed: {e}")));
            return;
        }
        self.state.is_playing = true;
        self.start_clock(self.state.position, tx);
        self.say(format!("resumed at {}", format_duration(self.state.position)));
    }

    async fn next(&mut self, tx: &mpsc::Sender<Event>) {
        if self.queue.is_empty() && self.queue.play_next_queue().next().is_none() {
            let shown = self.display_songs();
            let Some(first) = shown.first().map(|s| s.path.clone()) else {
                self.toast(Toast::error("nothing to play"));
                return;
            };
            self.queue.replace_with(shown, &first);
            if let Some(song) = self.queue.current().cloned() {
                self.persist_queue();
                self.play_song(song, tx).await;
            }
            return;
        }
        let song = self.queue.advance().cloned();
        self.persist_queue();
        if let Some(song) = song {
            self.play_song(song, tx).await;
        }
    }

    async fn prev(&mut self, tx: &mpsc::Sender<Event>) {
        let Some(song) = self.queue.go_back().cloned() else {
            self.toast(Toast::error("queue is empty"));
            return;
        };
        self.persist_queue();
        self.play_song(song, tx).await;
    }

    async fn on_track_finished(&mut self, tx: &mpsc::Sender<Event>) {
        self.halt_timers();
        let next = self.queue.after_finish().cloned();
        self.persist_queue();
        match next {
            Some(song) => self.play_song(song, tx).await,
            None => {
                self.state.is_playing = false;
                self.say("end of queue");
            }
        }
    }

    /// Move the displayed position now and commit to the backend once the
    /// user stops seeking. Returns false when there is nothing to seek.
    fn seek_to(&mut self, target: f64, tx: &mpsc::Sender<Event>) -> bool {
        let Some(song) = &self.state.current_song else {
            return false;
        };
        let target = if song.duration > 0.0 {
            target.clamp(0.0, song.duration)
        } else {
            target.max(0.0)
        };
        self.halt_timers();
        self.clock.hold(target);
        self.state.position = target;
        self.refresh_lyric();
        self.seek.schedule(target, tx);
        true
    }

    async fn commit_seek(&mut self, target: f64, tx: &mpsc::Sender<Event>) {
        if !self.state.is_song_loaded {
            // Nothing open yet; the position is used when playback starts.
            self.persist_position();
            if std::mem::take(&mut self.play_after_seek) {
                self.toggle_play(tx).await;
            }
            return;
        }

        let playing = self.state.is_playing;
        if let Err(e) = self.backend.set_volume(0.0).await {
            warn!("mute for seek: {e:#}");
        }
        if let Err(e) = self.backend.seek_audio(target.floor() as u32, playing).await {
            warn!("seek_audio: {e:#}");
            self.toast(Toast::error(format!("seek failed: {e}")));
        }
        self.volume_restore_seq += 1;
        self.volume_restore = Some(timers::after(
            self.cfg.playback.volume_restore(),
            tx.clone(),
            Event::Timer(TimerEvent::RestoreVolume {
                seq: self.volume_restore_seq,
            }),
        ));

        self.clock.rearm();
        self.state.position = target;
        if playing {
            self.start_clock(target, tx);
        } else {
            self.clock.hold(target);
            self.persist_position();
            if std::mem::take(&mut self.play_after_seek) {
                self.toggle_play(tx).await;
            }
        }
    }

    async fn apply_volume(&mut self, volume: u8) -> bool {
        let volume = volume.min(100);
        if let Err(e) = self.backend.set_volume(f32::from(volume) / 100.0).await {
            warn!("set_volume: {e:#}");
            self.toast(Toast::error(format!("volume change failed: {e}")));
            return false;
        }
        self.state.volume = volume;
        self.persist(Key::Volume, &volume);
        self.say(format!("volume {volume}"));
        true
    }

    fn start_clock(&mut self, position: f64, tx: &mpsc::Sender<Event>) {
        self.clock.reset(position);
        let pb = &self.cfg.playback;
        self.timers.start(tx, pb.frame_interval(), pb.sync_interval());
    }

    fn halt_timers(&mut self) {
        self.timers.stop();
    }

    fn lyric_options(&self) -> LyricOptions {
        LyricOptions::from(&self.cfg.lyrics)
    }

    /// Print the lyric line when the current one changes.
    fn refresh_lyric(&mut self) {
        let index = self
            .state
            .lyrics
            .current_index(self.state.position, self.cfg.playback.audio_latency_secs);
        if index == self.state.lyric_index {
            return;
        }
        self.state.lyric_index = index;
        if index.is_some()
            && let Some(shown) = self.state.lyrics.display(index, self.lyric_options())
        {
            self.say(format!("  ~ {}", shown.lines.join(" / ")));
        }
    }

    // --- background work ---

    fn spawn_progress_fetch(&self, generation: u64, tx: &mpsc::Sender<Event>) {
        let backend = self.backend.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            match backend.get_playback_progress().await {
                Ok(seconds) => {
                    let _ = tx.send(Event::Task(TaskEvent::Progress { generation, seconds })).await;
                }
                Err(e) => debug!("get_playback_progress: {e:#}"),
            }
        });
    }

    fn spawn_lyrics_load(&self, path: String, tx: &mpsc::Sender<Event>) {
        let backend = self.backend.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let raw = backend.get_song_lyrics(&path).await.unwrap_or_else(|e| {
                debug!("get_song_lyrics {path}: {e:#}");
                String::new()
            });
            let lyrics = LyricsState::from_raw(path.clone(), &raw);
            let _ = tx.send(Event::Task(TaskEvent::LyricsLoaded { path, lyrics })).await;
        });
    }

    fn spawn_cover_load(&self, path: String, tx: &mpsc::Sender<Event>) {
        let backend = self.backend.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let cover = match backend.get_song_cover(&path).await {
                Ok(c) if !c.is_empty() => Some(c),
                Ok(_) => None,
                Err(e) => {
                    debug!("get_song_cover {path}: {e:#}");
                    None
                }
            };
            let _ = tx.send(Event::Task(TaskEvent::CoverLoaded { path, cover })).await;
        });
    }

    fn spawn_palette(&self, cover: String, count: usize, tx: &mpsc::Sender<Event>) {
        let tx = tx.clone();
        tokio::spawn(async move {
            let colors = theme::extract(Some(cover.clone()), count).await;
            let _ = tx.send(Event::Task(TaskEvent::PaletteReady { cover, colors })).await;
        });
    }

    fn show_in_folder(&self, path: String) {
        let backend = self.backend.clone();
        tokio::spawn(async move {
            if let Err(e) = backend.show_in_folder(&path).await {
                warn!("show_in_folder {path}: {e:#}");
            }
        });
    }

    // --- library and files ---

    fn display_songs(&self) -> Vec<Song> {
        view::display_songs(&self.library, &self.history, &self.state.view, &self.state.search_query)
    }

    fn resolve(&mut self, r: &SongRef) -> Option<Song> {
        let found = match r {
            SongRef::Current => self.state.current_song.clone(),
            SongRef::Row(n) => self.display_songs().into_iter().nth(n.saturating_sub(1)),
            SongRef::Path(p) => self
                .library
                .get(p)
                .cloned()
                .or_else(|| self.history.songs().find(|s| &s.path == p).cloned())
                .or_else(|| self.queue.songs().iter().find(|s| &s.path == p).cloned()),
        };
        if found.is_none() {
            self.toast(Toast::error(match r {
                SongRef::Current => "no current song".to_string(),
                SongRef::Row(n) => format!("no row {n} in this list"),
                SongRef::Path(p) => format!("unknown song {p}"),
            }));
        }
        found
    }

    async fn add_folder(&mut self, path: &str) {
        match self.backend.scan_music_folder(path).await {
            Ok(songs) => {
                self.library.watch(path);
                let added = self.library.merge(songs);
                self.persist_library();
                self.toast(Toast::success(format!("added {added} songs from {path}")));
            }
            Err(e) => {
                warn!("scan {path}: {e:#}");
                self.toast(Toast::error(format!("scan failed: {e}")));
            }
        }
    }

    async fn import_folder_structure(&mut self, root: &str) {
        let folders = match self.backend.scan_folder_as_playlists(root).await {
            Ok(f) => f,
            Err(e) => {
                warn!("import {root}: {e:#}");
                self.toast(Toast::error(format!("import failed: {e}")));
                return;
            }
        };
        if folders.is_empty() {
            self.toast(Toast::error(format!("no music folders found under {root}")));
            return;
        }
        let count = folders.len();
        let mut added = 0;
        for folder in folders {
            self.library.watch(&folder.path);
            added += self.library.merge(folder.songs);
        }
        self.persist_library();
        self.toast(Toast::success(format!("imported {count} folders, {added} new songs")));
    }

    async fn refresh_folder(&mut self, path: &str) {
        if !self.library.watched_folders().iter().any(|f| f == path) {
            self.toast(Toast::error(format!("{path} is not watched")));
            return;
        }
        match self.backend.scan_music_folder(path).await {
            Ok(songs) => {
                let n = songs.len();
                self.library.replace_folder(path, songs);
                self.persist_library();
                self.toast(Toast::success(format!("{path}: {n} songs")));
            }
            Err(e) => {
                warn!("rescan {path}: {e:#}");
                self.toast(Toast::error(format!("refresh failed: {e}")));
            }
        }
    }

    /// Move one file on disk and follow it everywhere. Returns whether the
    /// backend accepted the move.
    async fn move_file(&mut self, song: &Song, new_path: &str) -> bool {
        if let Err(e) = self.backend.move_music_file(&song.path, new_path).await {
            warn!("move {} -> {new_path}: {e:#}", song.path);
            self.toast(Toast::error(format!("move failed: {e}")));
            return false;
        }
        self.apply_rename(&song.path, new_path);
        self.persist_library();
        self.persist_queue();
        true
    }

    fn apply_rename(&mut self, old: &str, new: &str) {
        self.library.rename_path(old, new);
        self.queue.rename_path(old, new);
        if let Some(current) = self.state.current_song.as_mut()
            && current.path == old
        {
            current.path = new.to_string();
            current.name = model::file_name_of(new).to_string();
            let song = current.clone();
            self.persist(Key::LastSong, &song);
        }
    }

    async fn move_files_to_folder(&mut self, songs: &[Song], folder: &str) {
        let paths: Vec<String> = songs.iter().map(|s| s.path.clone()).collect();
        let moved = match self.backend.batch_move_music_files(&paths, folder).await {
            Ok(n) => n,
            Err(e) => {
                warn!("batch move to {folder}: {e:#}");
                self.toast(Toast::error(format!("move failed: {e}")));
                return;
            }
        };
        let sep = if folder.contains('\\') && !folder.contains('/') { '\\' } else { '/' };
        let base = folder.trim_end_matches(['/', '\\']);
        for song in songs {
            let new_path = format!("{base}{sep}{}", song.file_name());
            self.apply_rename(&song.path, &new_path);
        }
        self.persist_library();
        self.persist_queue();
        self.toast(Toast::success(format!("moved {moved} files to {folder}")));
    }

    async fn organize_song(&mut self, song: &Song) {
        let Some(target) = organized_path(song, &self.state.settings) else {
            self.toast(Toast::error("auto-organize is off or has no root folder"));
            return;
        };
        if target == song.path {
            self.toast(Toast::success("already organized"));
            return;
        }
        if self.move_file(song, &target).await {
            self.toast(Toast::success(format!("organized to {target}")));
        }
    }

    async fn delete_from_disk(&mut self, song: &Song) {
        if let Err(e) = self.backend.delete_music_file(&song.path).await {
            warn!("delete {}: {e:#}", song.path);
            self.toast(Toast::error(format!("delete failed: {e}")));
            return;
        }
        self.library.forget_path(&song.path);
        self.history.remove(&song.path);
        self.queue.remove_path(&song.path);
        self.persist_library();
        self.persist_history();
        self.persist_queue();
        if self.state.is_current(&song.path)
            && let Some(storage) = &self.storage
        {
            for key in [Key::LastSong, Key::LastPosition] {
                if let Err(e) = storage.remove(key) {
                    warn!("{e:#}");
                }
            }
        }
        self.toast(Toast::success(format!("deleted {}", song.file_name())));
    }

    /// Drop `song` from whatever the current view lists.
    fn remove_from_view(&mut self, song: &Song) {
        if self.state.view.is_library_view() {
            self.library.remove_song(&song.path);
            self.persist_library();
            self.toast(Toast::success(format!("removed {}", song.display_title())));
            return;
        }
        match &self.state.view {
            View::Favorites { .. } => {
                self.library.remove_favorite(&song.path);
                self.persist_library();
            }
            View::Recent => {
                self.history.remove(&song.path);
                self.persist_history();
            }
            View::Playlist(id) => {
                let id = id.clone();
                self.library.remove_from_playlist(&id, &song.path);
                self.persist_library();
            }
            _ => {}
        }
        self.toast(Toast::success(format!("removed {}", song.display_title())));
    }

    // --- console output ---

    fn say(&mut self, line: impl AsRef<str>) {
        let _ = writeln!(self.out, "{}", line.as_ref());
    }

    fn toast(&mut self, toast: Toast) {
        match toast.kind {
            ToastKind::Success => info!("{}", toast.message),
            ToastKind::Error => warn!("{}", toast.message),
        }
        let tag = match toast.kind {
            ToastKind::Success => "ok",
            ToastKind::Error => "error",
        };
        self.say(format!("[{tag}] {}", toast.message));
        self.state.toast = Some(toast);
    }

    fn song_line(&self, song: &Song) -> String {
        let fav = if self.library.is_favorite(&song.path) { " *" } else { "" };
        format!(
            "{} - {} [{}]{fav}",
            song.display_title(),
            song.artist_or_unknown(),
            format_duration(song.duration)
        )
    }

    fn print_now_playing(&mut self) {
        let Some(song) = &self.state.current_song else {
            return;
        };
        let line = format!("> {}", self.song_line(song));
        self.say(line);
    }

    fn palette_text(&self) -> String {
        self.state
            .palette
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn print_status(&mut self) {
        let mut lines = Vec::new();
        match &self.state.current_song {
            Some(song) => {
                let status = match (self.state.is_playing, self.state.is_song_loaded) {
                    _ if self.seek.is_pending() => "seeking",
                    (true, _) => "playing",
                    (false, true) => "paused",
                    (false, false) => "ready",
                };
                lines.push(format!(
                    "{status}: {} {}/{}",
                    self.song_line(song),
                    format_duration(self.clock.interpolate()),
                    format_duration(song.duration)
                ));
            }
            None => lines.push("nothing playing".to_string()),
        }
        lines.push(format!(
            "volume {} | mode {} | queue {} | view {}",
            self.state.volume,
            self.queue.mode(),
            self.queue.len(),
            self.state.view
        ));
        lines.push(format!(
            "library {} songs, {} favorites, {} playlists, {} played",
            self.library.songs().len(),
            self.library.favorites().len(),
            self.library.playlists().len(),
            self.history.len()
        ));
        for f in groups::folders(self.library.watched_folders(), self.library.songs()) {
            lines.push(format!("  folder {} ({} songs) {}", f.name, f.count, f.path));
        }
        if !self.state.palette.is_empty() {
            lines.push(format!("palette {}", self.palette_text()));
        }
        if let Some(t) = self.state.active_toast() {
            lines.push(format!("last: {}", t.message));
        }
        for l in lines {
            self.say(l);
        }
    }

    fn print_view(&mut self) {
        let mut lines = vec![match self.state.search_query.trim() {
            "" => format!("== {} ==", self.state.view),
            q => format!("== {} (search: {q}) ==", self.state.view),
        }];

        let grouped: Option<Vec<(String, usize)>> = match &self.state.view {
            View::Artist(None) | View::All { tab: AllTab::Artist(None) } => Some(
                groups::artists(self.library.songs())
                    .into_iter()
                    .map(|g| (g.name, g.count))
                    .collect(),
            ),
            View::Album(None) | View::All { tab: AllTab::Album(None) } => Some(
                groups::albums(self.library.songs())
                    .into_iter()
                    .map(|g| (format!("{} - {}", g.name, g.artist), g.count))
                    .collect(),
            ),
            View::Genre(None) => Some(
                groups::genres(self.library.songs())
                    .into_iter()
                    .map(|g| (g.name, g.count))
                    .collect(),
            ),
            View::Year(None) => Some(
                groups::years(self.library.songs())
                    .into_iter()
                    .map(|g| (g.name, g.count))
                    .collect(),
            ),
            View::Favorites { tab: FavoritesTab::Artist(None) } => Some(
                groups::favorite_artists(&self.library)
                    .into_iter()
                    .map(|g| (g.name, g.count))
                    .collect(),
            ),
            View::Favorites { tab: FavoritesTab::Album(None) } => Some(
                groups::favorite_albums(&self.library)
                    .into_iter()
                    .map(|g| (g.name, g.count))
                    .collect(),
            ),
            _ => None,
        };

        if let Some(groups) = grouped {
            for (name, count) in groups {
                lines.push(format!("  {name} ({count})"));
            }
        } else if self.state.view == View::Recent {
            let now = model::now_millis();
            let q = self.state.search_query.trim().to_lowercase();
            for (i, item) in self
                .history
                .items()
                .iter()
                .filter(|h| q.is_empty() || h.song.name.to_lowercase().contains(&q))
                .enumerate()
            {
                lines.push(format!(
                    "{:>3}. {} ({})",
                    i + 1,
                    self.song_line(&item.song),
                    format_time_ago(item.played_at, now)
                ));
            }
            for album in groups::recent_albums(&self.history).into_iter().take(5) {
                lines.push(format!("  album {} - {}", album.name, album.artist));
            }
        } else {
            for (i, song) in self.display_songs().iter().enumerate() {
                let mark = if self.state.is_current(&song.path) { ">" } else { " " };
                lines.push(format!("{mark}{:>3}. {}", i + 1, self.song_line(song)));
            }
        }
        for l in lines {
            self.say(l);
        }
    }

    fn print_queue(&mut self) {
        let mut lines: Vec<String> = self
            .queue
            .play_next_queue()
            .map(|s| format!("  next: {}", self.song_line(s)))
            .collect();
        let current = self.queue.current_index();
        for (i, song) in self.queue.songs().iter().enumerate() {
            let mark = if Some(i) == current { ">" } else { " " };
            lines.push(format!("{mark}{:>3}. {}", i + 1, self.song_line(song)));
        }
        if lines.is_empty() {
            lines.push("queue is empty".to_string());
        }
        for l in lines {
            self.say(l);
        }
    }

    fn print_playlists(&mut self) {
        let mut lines: Vec<String> = self
            .library
            .playlists()
            .iter()
            .map(|p| format!("  {} {} ({} songs)", p.id, p.name, p.song_paths.len()))
            .collect();
        if lines.is_empty() {
            lines.push("no playlists".to_string());
        }
        let now = model::now_millis();
        for p in groups::recent_playlists(self.library.playlists(), &self.history) {
            lines.push(format!("  recent: {} ({})", p.name, format_time_ago(p.played_at, now)));
        }
        for l in lines {
            self.say(l);
        }
    }
}
