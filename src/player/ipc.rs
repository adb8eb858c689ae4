use super::{Backend, BackendError, BackendEvent, GeneratedFolder, MediaKey, TrackMetadata};
use crate::app::events::Event;
use crate::config::BackendConfig;
use crate::library::model::Song;
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::UnixStream,
    process::{Child, Command},
    sync::{mpsc, oneshot},
};

type Reply = Result<Value, BackendError>;

/// Reply deadlines. Scans and batch moves walk whole folders, so they get
/// their own, by default unbounded, deadline.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub request: Duration,
    pub long: Option<Duration>,
}

impl From<&BackendConfig> for Timeouts {
    fn from(cfg: &BackendConfig) -> Self {
        Self {
            request: cfg.request_timeout(),
            long: cfg.long_request_timeout(),
        }
    }
}

const LONG_METHODS: &[&str] = &[
    "scan_music_folder",
    "scan_folder_as_playlists",
    "batch_move_music_files",
];
type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;

/// JSON-lines RPC client for the native audio backend.
#[derive(Debug, Clone)]
pub struct IpcBackend {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    child: Mutex<Option<Child>>,
    socket_path: Option<PathBuf>,
    writer: tokio::sync::Mutex<tokio::io::WriteHalf<UnixStream>>,
    pending: Pending,
    request_id: AtomicU64,
    timeouts: Timeouts,
}

impl IpcBackend {
    /// Spawn the configured backend (or attach to `cfg.socket`) and connect.
    pub async fn start(cfg: &BackendConfig, event_tx: mpsc::Sender<Event>) -> anyhow::Result<Self> {
        if let Some(socket) = &cfg.socket {
            return Self::connect(socket, cfg.into(), event_tx).await;
        }

        let socket_path = std::env::temp_dir().join(format!("chorale-backend-{}.sock", std::process::id()));
        let _ = std::fs::remove_file(&socket_path);

        let child = Command::new(&cfg.command)
            .args(&cfg.args)
            .arg(format!("--ipc-socket={}", socket_path.display()))
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawn {}", cfg.command))?;

        // The backend creates the socket shortly after starting.
        let stream = connect_with_retry(&socket_path).await?;
        let this = Self::from_stream(stream, cfg.into(), event_tx, Some(socket_path));
        if let Ok(mut slot) = this.inner.child.lock() {
            *slot = Some(child);
        }
        Ok(this)
    }

    /// Attach to an already running backend.
    pub async fn connect(
        socket_path: &Path,
        timeouts: Timeouts,
        event_tx: mpsc::Sender<Event>,
    ) -> anyhow::Result<Self> {
        let stream = UnixStream::connect(socket_path)
            .await
            .with_context(|| format!("connect to backend ipc {}", socket_path.display()))?;
        Ok(Self::from_stream(stream, timeouts, event_tx, None))
    }

    fn from_stream(
        stream: UnixStream,
        timeouts: Timeouts,
        event_tx: mpsc::Sender<Event>,
        socket_path: Option<PathBuf>,
    ) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));

        // Pump backend replies -> waiting callers, notifications -> app events.
        tokio::spawn(read_loop(reader, pending.clone(), event_tx));

        Self {
            inner: Arc::new(Inner {
                child: Mutex::new(None),
                socket_path,
                writer: tokio::sync::Mutex::new(writer),
                pending,
                request_id: AtomicU64::new(1),
                timeouts,
            }),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> anyhow::Result<T> {
        let id = self.inner.request_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        lock_pending(&self.inner.pending).insert(id, tx);

        let mut line = serde_json::to_vec(&json!({"id": id, "method": method, "params": params}))
            .context("encode backend request")?;
        line.push(b'\n');
        {
            let mut w = self.inner.writer.lock().await;
            let sent = async {
                w.write_all(&line).await?;
                w.flush().await
            }
            .await;
            if let Err(e) = sent {
                lock_pending(&self.inner.pending).remove(&id);
                return Err(e).with_context(|| format!("write backend ipc ({method})"));
            }
        }

        let deadline = if LONG_METHODS.contains(&method) {
            self.inner.timeouts.long
        } else {
            Some(self.inner.timeouts.request)
        };
        let answered = match deadline {
            Some(d) => tokio::time::timeout(d, rx).await,
            None => Ok(rx.await),
        };
        let reply = match answered {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => anyhow::bail!("backend connection closed during {method}"),
            Err(_) => {
                lock_pending(&self.inner.pending).remove(&id);
                anyhow::bail!("backend timed out on {method}");
            }
        };
        let value = reply.with_context(|| format!("backend {method}"))?;
        serde_json::from_value(value).with_context(|| format!("decode {method} reply"))
    }

    async fn call_unit(&self, method: &str, params: Value) -> anyhow::Result<()> {
        let _: Value = self.call(method, params).await?;
        Ok(())
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.child.lock()
            && let Some(child) = slot.as_mut()
        {
            let _ = child.start_kill();
        }
        if let Some(p) = &self.socket_path {
            let _ = std::fs::remove_file(p);
        }
    }
}

impl Backend for IpcBackend {
    async fn play_audio(&self, path: &str, meta: &TrackMetadata) -> anyhow::Result<()> {
        self.call_unit(
            "play_audio",
            json!({
                "path": path,
                "title": meta.title,
                "artist": meta.artist,
                "album": meta.album,
                "cover": meta.cover,
                "duration": meta.duration,
            }),
        )
        .await
    }

    async fn pause_audio(&self) -> anyhow::Result<()> {
        self.call_unit("pause_audio", json!({})).await
    }

    async fn resume_audio(&self) -> anyhow::Result<()> {
        self.call_unit("resume_audio", json!({})).await
    }

    async fn seek_audio(&self, seconds: u32, is_playing: bool) -> anyhow::Result<()> {
        self.call_unit("seek_audio", json!({"time": seconds, "isPlaying": is_playing}))
            .await
    }

    async fn set_volume(&self, level: f32) -> anyhow::Result<()> {
        self.call_unit("set_volume", json!({"volume": level.clamp(0.0, 1.0)}))
            .await
    }

    async fn get_playback_progress(&self) -> anyhow::Result<f64> {
        self.call("get_playback_progress", json!({})).await
    }

    async fn get_song_cover(&self, path: &str) -> anyhow::Result<String> {
        let cover: Option<String> = self.call("get_song_cover", json!({"path": path})).await?;
        Ok(cover.unwrap_or_default())
    }

    async fn get_song_lyrics(&self, path: &str) -> anyhow::Result<String> {
        let raw: Option<String> = self.call("get_song_lyrics", json!({"path": path})).await?;
        Ok(raw.unwrap_or_default())
    }

    async fn scan_music_folder(&self, path: &str) -> anyhow::Result<Vec<Song>> {
        self.call("scan_music_folder", json!({"folderPath": path})).await
    }

    async fn scan_folder_as_playlists(&self, root: &str) -> anyhow::Result<Vec<GeneratedFolder>> {
        self.call("scan_folder_as_playlists", json!({"rootPath": root}))
            .await
    }

    async fn batch_move_music_files(
        &self,
        paths: &[String],
        target_folder: &str,
    ) -> anyhow::Result<u32> {
        self.call(
            "batch_move_music_files",
            json!({"paths": paths, "targetFolder": target_folder}),
        )
        .await
    }

    async fn move_music_file(&self, old_path: &str, new_path: &str) -> anyhow::Result<()> {
        self.call_unit(
            "move_music_file",
            json!({"oldPath": old_path, "newPath": new_path}),
        )
        .await
    }

    async fn delete_music_file(&self, path: &str) -> anyhow::Result<()> {
        self.call_unit("delete_music_file", json!({"path": path})).await
    }

    async fn show_in_folder(&self, path: &str) -> anyhow::Result<()> {
        self.call_unit("show_in_folder", json!({"path": path})).await
    }
}

fn lock_pending(
    pending: &Pending,
) -> std::sync::MutexGuard<'_, HashMap<u64, oneshot::Sender<Reply>>> {
    // A poisoned map still holds valid senders.
    pending.lock().unwrap_or_else(|e| e.into_inner())
}

async fn connect_with_retry(path: &PathBuf) -> anyhow::Result<UnixStream> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        match UnixStream::connect(path).await {
            Ok(s) => return Ok(s),
            Err(e) => {
                if tokio::time::Instant::now() > deadline {
                    return Err(e)
                        .with_context(|| format!("connect to backend ipc {}", path.display()));
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
    }
}

async fn read_loop(
    reader: tokio::io::ReadHalf<UnixStream>,
    pending: Pending,
    event_tx: mpsc::Sender<Event>,
) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let Ok(v) = serde_json::from_str::<Value>(&line) else {
            tracing::debug!("ignoring malformed backend line");
            continue;
        };

        if let Some(id) = v.get("id").and_then(Value::as_u64) {
            let reply = reply_from(&v);
            if let Some(waiter) = lock_pending(&pending).remove(&id) {
                let _ = waiter.send(reply);
            }
            continue;
        }

        // Never wait on the app here: replies behind this line would stall.
        if let Some(ev) = map_backend_event(&v)
            && let Err(mpsc::error::TrySendError::Full(dropped)) = event_tx.try_send(Event::Backend(ev))
        {
            tracing::warn!("app busy, dropping backend event {dropped:?}");
        }
    }

    // Dropping the senders wakes every waiting caller with an error.
    lock_pending(&pending).clear();
    tracing::warn!("backend ipc closed");
    let _ = event_tx.send(Event::Backend(BackendEvent::Disconnected)).await;
}

fn reply_from(v: &Value) -> Reply {
    match v.get("error") {
        Some(err) if !err.is_null() => Err(serde_json::from_value(err.clone()).unwrap_or_else(|_| {
            BackendError {
                code: "UNKNOWN_ERROR".to_string(),
                message: err.as_str().map(str::to_string).unwrap_or_else(|| err.to_string()),
            }
        })),
        _ => Ok(v.get("result").cloned().unwrap_or(Value::Null)),
    }
}

fn map_backend_event(v: &Value) -> Option<BackendEvent> {
    let key = match v.get("event")?.as_str()? {
        "player:play" => MediaKey::Play,
        "player:pause" => MediaKey::Pause,
        "player:next" => MediaKey::Next,
        "player:prev" => MediaKey::Previous,
        _ => return None,
    };
    Some(BackendEvent::MediaKey(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::UnixListener;

    #[test]
    fn maps_media_key_events() {
        let v = json!({"event": "player:next"});
        assert_eq!(map_backend_event(&v), Some(BackendEvent::MediaKey(MediaKey::Next)));
        assert_eq!(map_backend_event(&json!({"event": "volume"})), None);
        assert_eq!(map_backend_event(&json!({"id": 3})), None);
    }

    #[test]
    fn error_replies_keep_code() {
        let v = json!({"id": 1, "error": {"code": "TARGET_NOT_FOUND", "message": "missing"}});
        let err = reply_from(&v).unwrap_err();
        assert_eq!(err.code, "TARGET_NOT_FOUND");

        let v = json!({"id": 1, "error": "boom"});
        assert_eq!(reply_from(&v).unwrap_err().message, "boom");

        let v = json!({"id": 1, "result": 1.5});
        assert_eq!(reply_from(&v).unwrap(), json!(1.5));
    }

    fn timeouts(request_ms: u64, long_ms: Option<u64>) -> Timeouts {
        Timeouts {
            request: Duration::from_millis(request_ms),
            long: long_ms.map(Duration::from_millis),
        }
    }

    /// Minimal backend: answers progress queries, fails deletes, pushes a
    /// media key after the first request.
    async fn serve_once(listener: UnixListener) {
        let (stream, _) = listener.accept().await.unwrap();
        let (r, mut w) = tokio::io::split(stream);
        let mut lines = BufReader::new(r).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let req: Value = serde_json::from_str(&line).unwrap();
            let id = req["id"].clone();
            let reply = match req["method"].as_str().unwrap() {
                "get_playback_progress" => json!({"id": id, "result": 42.5}),
                "delete_music_file" => {
                    json!({"id": id, "error": {"code": "IO_ERROR", "message": "denied"}})
                }
                _ => json!({"id": id, "result": null}),
            };
            let mut out = serde_json::to_vec(&reply).unwrap();
            out.push(b'\n');
            w.write_all(&out).await.unwrap();
            w.write_all(b"{\"event\":\"player:pause\"}\n").await.unwrap();
        }
    }

    #[tokio::test]
    async fn round_trips_requests_over_socket() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("backend.sock");
        let listener = UnixListener::bind(&sock).unwrap();
        tokio::spawn(serve_once(listener));

        let (tx, mut rx) = mpsc::channel(8);
        let backend = IpcBackend::connect(&sock, timeouts(2000, None), tx)
            .await
            .unwrap();

        assert_eq!(backend.get_playback_progress().await.unwrap(), 42.5);
        assert_eq!(backend.get_song_lyrics("a.mp3").await.unwrap(), "");

        let err = backend.delete_music_file("a.mp3").await.unwrap_err();
        let be = err.downcast_ref::<BackendError>().unwrap();
        assert_eq!(be.code, "IO_ERROR");

        match rx.recv().await {
            Some(Event::Backend(BackendEvent::MediaKey(MediaKey::Pause))) => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    /// Answers every request after `delay_ms`.
    async fn serve_slowly(listener: UnixListener, delay_ms: u64) {
        let (stream, _) = listener.accept().await.unwrap();
        let (r, mut w) = tokio::io::split(stream);
        let mut lines = BufReader::new(r).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let req: Value = serde_json::from_str(&line).unwrap();
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            let result = match req["method"].as_str().unwrap() {
                "scan_music_folder" => json!([{"name": "a.mp3", "path": "/m/a.mp3"}]),
                "batch_move_music_files" => json!(2),
                _ => json!(1.0),
            };
            let mut out = serde_json::to_vec(&json!({"id": req["id"], "result": result})).unwrap();
            out.push(b'\n');
            w.write_all(&out).await.unwrap();
        }
    }

    #[tokio::test]
    async fn scans_and_batch_moves_outlast_the_request_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("backend.sock");
        let listener = UnixListener::bind(&sock).unwrap();
        tokio::spawn(serve_slowly(listener, 300));

        let (tx, _rx) = mpsc::channel(8);
        let backend = IpcBackend::connect(&sock, timeouts(100, None), tx)
            .await
            .unwrap();

        let err = backend.get_playback_progress().await.unwrap_err();
        assert!(err.to_string().contains("timed out"), "{err:#}");

        let songs = backend.scan_music_folder("/m").await.unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].path, "/m/a.mp3");
        let moved = backend
            .batch_move_music_files(&["/m/a.mp3".to_string(), "/m/b.mp3".to_string()], "/n")
            .await
            .unwrap();
        assert_eq!(moved, 2);
    }

    #[tokio::test]
    async fn long_timeout_still_applies_when_set() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("backend.sock");
        let listener = UnixListener::bind(&sock).unwrap();
        tokio::spawn(serve_slowly(listener, 300));

        let (tx, _rx) = mpsc::channel(8);
        let backend = IpcBackend::connect(&sock, timeouts(2000, Some(50)), tx)
            .await
            .unwrap();
        let err = backend.scan_music_folder("/m").await.unwrap_err();
        assert!(err.to_string().contains("scan_music_folder"), "{err:#}");
    }

    #[tokio::test]
    async fn full_event_queue_does_not_stall_replies() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("backend.sock");
        let listener = UnixListener::bind(&sock).unwrap();
        tokio::spawn(serve_once(listener));

        let (tx, mut rx) = mpsc::channel(1);
        tx.try_send(Event::Backend(BackendEvent::MediaKey(MediaKey::Play)))
            .unwrap();
        let backend = IpcBackend::connect(&sock, timeouts(1000, None), tx)
            .await
            .unwrap();

        // Each reply is followed by a pause event the full queue cannot take.
        for _ in 0..3 {
            assert_eq!(backend.get_playback_progress().await.unwrap(), 42.5);
        }
        match rx.recv().await {
            Some(Event::Backend(BackendEvent::MediaKey(MediaKey::Play))) => {}
            other => panic!("unexpected {other:?}"),
        }
    }
}
