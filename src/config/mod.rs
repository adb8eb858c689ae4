use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod settings;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub backend: BackendConfig,
    pub playback: PlaybackConfig,
    pub lyrics: LyricsConfig,
    pub theme: ThemeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Program that serves the audio/file RPCs over a Unix socket.
    pub command: String,
    pub args: Vec<String>,
    /// Attach to an already running backend instead of spawning one.
    pub socket: Option<PathBuf>,
    pub request_timeout_ms: u64,
    /// Deadline for folder scans and batch moves. 0 waits for the backend
    /// however long it takes.
    pub long_request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Output buffering compensation applied when picking the lyric line.
    pub audio_latency_secs: f64,
    pub frame_interval_ms: u64,
    pub sync_interval_ms: u64,
    pub snap_threshold_secs: f64,
    pub seek_debounce_ms: u64,
    pub volume_restore_ms: u64,
    pub step_seek_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LyricsConfig {
    pub show_translation: bool,
    pub show_transliteration: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeConfig {
    pub palette_size: usize,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let proj = ProjectDirs::from("dev", "chorale", "chorale");
        let data_dir = proj
            .as_ref()
            .map(|p| p.data_dir().to_path_buf())
            .unwrap_or_else(|| std::env::temp_dir().join("chorale"));
        Self { data_dir }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            command: "chorale-backend".to_string(),
            args: Vec::new(),
            socket: None,
            request_timeout_ms: 10_000,
            long_request_timeout_ms: 0,
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.max(1))
    }

    pub fn long_request_timeout(&self) -> Option<Duration> {
        (self.long_request_timeout_ms > 0).then(|| Duration::from_millis(self.long_request_timeout_ms))
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            audio_latency_secs: crate::lyrics::DEFAULT_AUDIO_LATENCY,
            frame_interval_ms: 16,
            sync_interval_ms: 1000,
            snap_threshold_secs: 0.05,
            seek_debounce_ms: 100,
            volume_restore_ms: 150,
            step_seek_secs: 5.0,
        }
    }
}

impl PlaybackConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms.max(1))
    }

    pub fn seek_debounce(&self) -> Duration {
        Duration::from_millis(self.seek_debounce_ms)
    }

    pub fn volume_restore(&self) -> Duration {
        Duration::from_millis(self.volume_restore_ms)
    }
}

impl Default for LyricsConfig {
    fn default() -> Self {
        Self {
            show_translation: true,
            show_transliteration: true,
        }
    }
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self { palette_size: 4 }
    }
}

fn write_private(path: &Path, raw: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create dir {}", parent.display()))?;
    }
    fs::write(path, raw).with_context(|| format!("write {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }
    Ok(())
}

pub fn save(cfg: &Config, override_path: Option<&Path>) -> anyhow::Result<()> {
    let path = match override_path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };
    let raw = toml::to_string_pretty(cfg).context("serialize config")?;
    write_private(&path, &raw)
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    let proj = ProjectDirs::from("dev", "chorale", "chorale").context("ProjectDirs unavailable")?;
    Ok(proj.config_dir().join("config.toml"))
}

pub fn load(override_path: Option<&Path>) -> anyhow::Result<Config> {
    let path = match override_path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };

    if !path.exists() {
        let cfg = Config::default();
        let raw = toml::to_string_pretty(&cfg).context("serialize default config")?;
        write_private(&path, &raw)?;
        return Ok(cfg);
    }

    let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let cfg = toml::from_str::<Config>(&raw).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub/config.toml");
        let cfg = load(Some(&path)).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.backend.command, "chorale-backend");
        assert_eq!(cfg.playback.seek_debounce_ms, 100);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[playback]\naudio_latency_secs = 0.3\n\n[backend]\nsocket = \"/tmp/b.sock\"\n",
        )
        .unwrap();
        let cfg = load(Some(&path)).unwrap();
        assert_eq!(cfg.playback.audio_latency_secs, 0.3);
        assert_eq!(cfg.playback.sync_interval_ms, 1000);
        assert_eq!(cfg.backend.socket.as_deref(), Some(Path::new("/tmp/b.sock")));
        assert_eq!(cfg.backend.request_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.backend.long_request_timeout(), None);
        assert!(cfg.lyrics.show_translation);
        assert_eq!(cfg.theme.palette_size, 4);
    }

    #[test]
    fn save_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut cfg = Config::default();
        cfg.lyrics.show_transliteration = false;
        cfg.backend.args = vec!["--quiet".into()];
        save(&cfg, Some(&path)).unwrap();
        let back = load(Some(&path)).unwrap();
        assert!(!back.lyrics.show_transliteration);
        assert_eq!(back.backend.args, vec!["--quiet"]);
    }

    #[test]
    fn garbage_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "playback = 3\n").unwrap();
        assert!(load(Some(&path)).is_err());
    }
}
