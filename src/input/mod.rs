//! Console input: one command per stdin line.

use crate::app::actions::{Action, SongRef};
use crate::app::events::{Event, InputEvent};
use crate::library::view::{AllTab, FavoritesTab, View};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

pub const HELP: &str = "\
commands:
  play REF | toggle | next | prev | seek T | +S / -S | + / - | at T
  vol N | mute | mode | pn REF (play next) | queue [clear | mv A B | rm N]
  ls | view all|artist|album|genre|year|folder|playlist|recent|favorites [NAME]
  search TEXT | fav [REF] | favs clear | remove REF | history clear
  scan DIR | import DIR | refresh DIR | unwatch DIR | library clear
  pl ls | pl new NAME | pl rm ID | pl add ID REF | pl del ID REF
  mv REF PATH | mvto REF,REF.. DIR | organize REF | delete REF | reveal REF
  status | help | quit
REF is a row number of the current list, `.` for the current song, or a path.
T is seconds or M:SS.";

pub fn spawn_input_task(tx: mpsc::Sender<Event>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(Event::Input(InputEvent::Line(line))).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    let _ = tx.send(Event::Input(InputEvent::Closed)).await;
                    break;
                }
                Err(e) => {
                    tracing::warn!("stdin: {e}");
                    let _ = tx.send(Event::Input(InputEvent::Closed)).await;
                    break;
                }
            }
        }
    });
}

pub fn map_input_to_action(ev: InputEvent) -> Result<Option<Action>, String> {
    match ev {
        InputEvent::Closed => Ok(Some(Action::Quit)),
        InputEvent::Line(line) => map_line_to_action(&line),
    }
}

/// Parse one console line. Blank lines map to nothing.
pub fn map_line_to_action(line: &str) -> Result<Option<Action>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (cmd, rest) = match line.split_once(char::is_whitespace) {
        Some((c, r)) => (c, r.trim()),
        None => (line, ""),
    };

    let action = match cmd {
        "q" | "quit" | "exit" => Action::Quit,
        "?" | "h" | "help" => Action::Help,
        "s" | "status" => Action::Status,
        "ls" | "list" => Action::List,

        "p" | "play" if rest.is_empty() => Action::TogglePlay,
        "p" | "play" => Action::Play(song_ref(rest)?),
        "t" | "toggle" | "pause" => Action::TogglePlay,
        "n" | "next" => Action::Next,
        "b" | "prev" => Action::Prev,
        "seek" => Action::SeekTo(time(rest)?),
        "at" => Action::PlayAt(time(rest)?),
        "step" => Action::StepSeek(signed(rest)?),
        "+" | "ff" => Action::Step(1),
        "-" | "rw" => Action::Step(-1),
        c if c.starts_with('+') || c.starts_with('-') => Action::StepSeek(signed(c)?),
        "vol" | "volume" => Action::SetVolume(volume(rest)?),
        "mute" => Action::ToggleMute,
        "mode" => Action::CycleMode,

        "pn" | "playnext" => Action::PlayNext(song_ref(required(rest, "song")?)?),
        "queue" if rest == "clear" => Action::ClearQueue,
        "queue" if rest.starts_with("mv ") => {
            let (from, to) = two(rest[3..].trim(), "queue mv FROM TO")?;
            Action::MoveInQueue {
                from: position(from)?,
                to: position(to)?,
            }
        }
        "queue" if rest.starts_with("rm ") => Action::RemoveFromQueue(position(rest[3..].trim())?),
        "queue" => Action::ShowQueue,

        "view" => Action::SetView(view(rest)?),
        "search" | "/" => Action::Search(rest.to_string()),

        "fav" if rest.is_empty() => Action::ToggleFavorite(SongRef::Current),
        "fav" => Action::ToggleFavorite(song_ref(rest)?),
        "favs" if rest == "clear" => Action::ClearFavorites,
        "remove" => Action::RemoveFromView(song_ref(required(rest, "song")?)?),
        "history" if rest == "clear" => Action::ClearHistory,

        "scan" | "add" => Action::AddFolder(required(rest, "folder")?.to_string()),
        "import" => Action::ImportFolder(required(rest, "folder")?.to_string()),
        "refresh" => Action::RefreshFolder(required(rest, "folder")?.to_string()),
        "unwatch" => Action::Unwatch(required(rest, "folder")?.to_string()),
        "library" if rest == "clear" => Action::ClearLibrary,

        "pl" => playlist(rest)?,

        "mv" => {
            let (r, path) = two(rest, "mv REF PATH")?;
            Action::MoveFile {
                song: song_ref(r)?,
                new_path: path.to_string(),
            }
        }
        "mvto" => {
            let (refs, folder) = two(rest, "mvto REF,REF.. DIR")?;
            let songs = refs
                .split(',')
                .filter(|r| !r.is_empty())
                .map(song_ref)
                .collect::<Result<Vec<_>, _>>()?;
            Action::MoveToFolder {
                songs,
                folder: folder.to_string(),
            }
        }
        "organize" => Action::Organize(song_ref_or_current(rest)?),
        "delete" => Action::DeleteFile(song_ref(required(rest, "song")?)?),
        "reveal" => Action::Reveal(song_ref_or_current(rest)?),

        other => return Err(format!("unknown command `{other}` (try `help`)")),
    };
    Ok(Some(action))
}

fn required<'a>(rest: &'a str, what: &str) -> Result<&'a str, String> {
    if rest.is_empty() {
        Err(format!("missing {what}"))
    } else {
        Ok(rest)
    }
}

fn two<'a>(rest: &'a str, usage: &str) -> Result<(&'a str, &'a str), String> {
    match rest.split_once(char::is_whitespace) {
        Some((a, b)) if !b.trim().is_empty() => Ok((a, b.trim())),
        _ => Err(format!("usage: {usage}")),
    }
}

fn song_ref(s: &str) -> Result<SongRef, String> {
    match s {
        "." | "current" => Ok(SongRef::Current),
        _ if s.chars().all(|c| c.is_ascii_digit()) => match s.parse::<usize>() {
            Ok(n) if n >= 1 => Ok(SongRef::Row(n)),
            _ => Err(format!("bad row `{s}`")),
        },
        _ => Ok(SongRef::Path(s.to_string())),
    }
}

fn position(s: &str) -> Result<usize, String> {
    s.parse::<usize>()
        .ok()
        .filter(|n| *n >= 1)
        .ok_or_else(|| format!("bad queue position `{s}`"))
}

fn song_ref_or_current(s: &str) -> Result<SongRef, String> {
    if s.is_empty() { Ok(SongRef::Current) } else { song_ref(s) }
}

/// Seconds, or `M:SS(.fff)`.
fn time(s: &str) -> Result<f64, String> {
    let bad = || format!("bad time `{s}`");
    let secs = match s.split_once(':') {
        Some((m, sec)) => {
            let m: u32 = m.parse().map_err(|_| bad())?;
            let sec: f64 = sec.parse().map_err(|_| bad())?;
            f64::from(m) * 60.0 + sec
        }
        None => s.parse::<f64>().map_err(|_| bad())?,
    };
    if secs.is_finite() && secs >= 0.0 { Ok(secs) } else { Err(bad()) }
}

fn signed(s: &str) -> Result<f64, String> {
    s.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("bad step `{s}`"))
}

fn volume(s: &str) -> Result<u8, String> {
    s.parse::<u16>()
        .map(|v| v.min(100) as u8)
        .map_err(|_| format!("bad volume `{s}` (0-100)"))
}

fn name(rest: &str) -> Option<String> {
    (!rest.is_empty()).then(|| rest.to_string())
}

fn view(rest: &str) -> Result<View, String> {
    let (kind, arg) = match rest.split_once(char::is_whitespace) {
        Some((k, a)) => (k, a.trim()),
        None => (rest, ""),
    };
    Ok(match kind {
        "" | "all" => View::All { tab: AllTab::Songs },
        "all-artist" => View::All { tab: AllTab::Artist(name(arg)) },
        "all-album" => View::All { tab: AllTab::Album(name(arg)) },
        "folder" => View::Folder(required(arg, "folder")?.to_string()),
        "artist" => View::Artist(name(arg)),
        "album" => View::Album(name(arg)),
        "genre" => View::Genre(name(arg)),
        "year" => View::Year(name(arg)),
        "playlist" => View::Playlist(required(arg, "playlist id")?.to_string()),
        "recent" => View::Recent,
        "favorites" | "fav" => View::Favorites { tab: FavoritesTab::Songs },
        "fav-artist" => View::Favorites { tab: FavoritesTab::Artist(name(arg)) },
        "fav-album" => View::Favorites { tab: FavoritesTab::Album(name(arg)) },
        other => return Err(format!("unknown view `{other}`")),
    })
}

fn playlist(rest: &str) -> Result<Action, String> {
    let (sub, arg) = match rest.split_once(char::is_whitespace) {
        Some((s, a)) => (s, a.trim()),
        None => (rest, ""),
    };
    Ok(match sub {
        "" | "ls" => Action::ListPlaylists,
        "new" => Action::CreatePlaylist(required(arg, "playlist name")?.to_string()),
        "rm" => Action::DeletePlaylist(required(arg, "playlist id")?.to_string()),
        "add" => {
            let (id, r) = two(arg, "pl add ID REF")?;
            Action::AddToPlaylist {
                id: id.to_string(),
                song: song_ref(r)?,
            }
        }
        "del" => {
            let (id, r) = two(arg, "pl del ID REF")?;
            Action::RemoveFromPlaylist {
                id: id.to_string(),
                song: song_ref(r)?,
            }
        }
        other => return Err(format!("unknown playlist command `{other}`")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn act(line: &str) -> Action {
        map_line_to_action(line).unwrap().unwrap()
    }

    #[test]
    fn blank_is_nothing() {
        assert_eq!(map_line_to_action("   "), Ok(None));
    }

    #[test]
    fn playback_commands() {
        assert_eq!(act("play"), Action::TogglePlay);
        assert_eq!(act("play 3"), Action::Play(SongRef::Row(3)));
        assert_eq!(act("p /m/My Song.mp3"), Action::Play(SongRef::Path("/m/My Song.mp3".into())));
        assert_eq!(act("seek 1:30"), Action::SeekTo(90.0));
        assert_eq!(act("seek 12.5"), Action::SeekTo(12.5));
        assert_eq!(act("+5"), Action::StepSeek(5.0));
        assert_eq!(act("-10"), Action::StepSeek(-10.0));
        assert_eq!(act("+"), Action::Step(1));
        assert_eq!(act("rw"), Action::Step(-1));
        assert_eq!(act("at 0:07"), Action::PlayAt(7.0));
        assert_eq!(act("vol 250"), Action::SetVolume(100));
        assert!(map_line_to_action("seek -3").is_err());
        assert!(map_line_to_action("vol loud").is_err());
    }

    #[test]
    fn views() {
        assert_eq!(act("view"), Action::SetView(View::default()));
        assert_eq!(act("view artist Daft Punk"), Action::SetView(View::Artist(Some("Daft Punk".into()))));
        assert_eq!(act("view year"), Action::SetView(View::Year(None)));
        assert_eq!(
            act("view fav-album Discovery"),
            Action::SetView(View::Favorites {
                tab: FavoritesTab::Album(Some("Discovery".into()))
            })
        );
        assert!(map_line_to_action("view folder").is_err());
        assert!(map_line_to_action("view nowhere").is_err());
    }

    #[test]
    fn playlists_and_files() {
        assert_eq!(act("pl"), Action::ListPlaylists);
        assert_eq!(act("pl new Road Trip"), Action::CreatePlaylist("Road Trip".into()));
        assert_eq!(
            act("pl add 17 2"),
            Action::AddToPlaylist {
                id: "17".into(),
                song: SongRef::Row(2)
            }
        );
        assert_eq!(
            act("mvto 1,3 /sorted/new dir"),
            Action::MoveToFolder {
                songs: vec![SongRef::Row(1), SongRef::Row(3)],
                folder: "/sorted/new dir".into()
            }
        );
        assert_eq!(act("organize"), Action::Organize(SongRef::Current));
        assert_eq!(act("queue mv 3 1"), Action::MoveInQueue { from: 3, to: 1 });
        assert_eq!(act("queue rm 2"), Action::RemoveFromQueue(2));
        assert!(map_line_to_action("queue rm 0").is_err());
        assert!(map_line_to_action("mv 1").is_err());
        assert!(map_line_to_action("delete").is_err());
        assert!(map_line_to_action("play 0").is_err());
    }

    #[test]
    fn eof_quits() {
        assert_eq!(map_input_to_action(InputEvent::Closed), Ok(Some(Action::Quit)));
        assert!(map_line_to_action("frobnicate").is_err());
    }
}
