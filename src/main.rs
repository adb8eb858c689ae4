mod app;
mod config;
mod input;
mod library;
mod lyrics;
mod player;
mod queue;
mod storage;
mod theme;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const DB_FILE: &str = "state.sqlite3";

#[derive(Debug, Parser)]
#[command(name = "chorale", version, about = "Console front end for a local music player")]
struct Cli {
    /// Override config file path.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the interactive player (default).
    Run,
    /// Parse an LRC file and print its timed lines (headless).
    Lyrics {
        file: PathBuf,
        /// Print only the line shown at this position (seconds).
        #[arg(long)]
        at: Option<f64>,
        /// Audio latency compensation in seconds.
        #[arg(long)]
        latency: Option<f64>,
    },
    /// Print the accent palette of a cover image (headless).
    Palette {
        image: PathBuf,
        #[arg(long, default_value_t = 4)]
        count: usize,
    },
    /// Print recently played songs from the saved state (headless).
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Set the audio latency compensation used for lyric timing.
    Latency { seconds: f64 },
    /// Print the config file location.
    ConfigPath,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref()).context("load config")?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let (tx, rx) = tokio::sync::mpsc::channel(256);
            let backend = player::ipc::IpcBackend::start(&cfg.backend, tx.clone())
                .await
                .context("start audio backend")?;
            let storage = match storage::Storage::open(&cfg.paths.data_dir.join(DB_FILE)) {
                Ok(s) => Some(s),
                Err(e) => {
                    tracing::warn!("running without saved state: {e:#}");
                    None
                }
            };
            input::spawn_input_task(tx.clone());
            let mut app = app::App::new(cfg, backend, storage);
            app.run(tx, rx).await?;
        }
        Command::Lyrics { file, at, latency } => {
            let raw = std::fs::read_to_string(&file).with_context(|| format!("read {}", file.display()))?;
            let state = lyrics::LyricsState::from_raw(file.display().to_string(), &raw);
            let opts = lyrics::LyricOptions::from(&cfg.lyrics);
            match at {
                Some(at) => {
                    let latency = latency.unwrap_or(cfg.playback.audio_latency_secs);
                    let index = state.current_index(at, latency);
                    if let Some(shown) = state.display(index, opts) {
                        println!("{}", shown.lines.join("\n"));
                    }
                }
                None => print_lyrics(&state, opts),
            }
        }
        Command::Palette { image, count } => {
            for color in theme::extract(Some(image.display().to_string()), count).await {
                println!("{color}");
            }
        }
        Command::History { limit } => {
            let storage = storage::Storage::open(&cfg.paths.data_dir.join(DB_FILE)).context("open saved state")?;
            let items: Vec<library::model::HistoryItem> = storage.load(storage::Key::History).unwrap_or_default();
            let now = library::model::now_millis();
            for (i, item) in items.iter().take(limit).enumerate() {
                println!(
                    "{:02}. {} - {}  ({})",
                    i + 1,
                    item.song.display_title(),
                    item.song.artist_or_unknown(),
                    library::display::format_time_ago(item.played_at, now)
                );
            }
        }
        Command::Latency { seconds } => {
            anyhow::ensure!(seconds.is_finite() && seconds >= 0.0, "latency must be a non-negative number");
            let mut cfg = cfg;
            cfg.playback.audio_latency_secs = seconds;
            config::save(&cfg, cli.config.as_deref()).context("save config")?;
            println!("Audio latency set to {seconds}s.");
        }
        Command::ConfigPath => {
            let path = match cli.config {
                Some(p) => p,
                None => config::default_config_path().context("default config path")?,
            };
            println!("{}", path.display());
        }
    }

    Ok(())
}

fn print_lyrics(state: &lyrics::LyricsState, opts: lyrics::LyricOptions) {
    let lines = state.lines();
    if lines.is_empty() {
        if let Some(shown) = state.display(None, opts) {
            println!("{}", shown.text);
        }
        return;
    }
    for line in lines {
        println!("[{}] {}", library::display::format_duration(line.time), line.text);
        if opts.show_transliteration
            && let Some(t) = &line.transliteration
        {
            println!("        {t}");
        }
        if opts.show_translation
            && let Some(t) = &line.translation
        {
            println!("        {t}");
        }
    }
}
