use std::{
    io::{self, IsTerminal, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Result;
use clap::Parser;
use tablo::{
    clock::SystemClock,
    config::{parse_query, BoardConfig, ViewMode},
    http::ReqwestClient,
    render::{self, RenderOptions},
    session::{Board, BoardDeps, BoardFrame},
    store::{KeyValueStore, MemoryStore, SqliteStore},
};
use tokio::io::{AsyncBufReadExt, BufReader};

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Live arrival board for one stop.
///
/// Settings come from `--query` (the board's URL query string) and are
/// overridden by the individual flags. On stdin: `t` cycles the theme,
/// `v` toggles board/ticker, `city <name>` and `stop <id>` switch stops.
#[derive(Parser, Debug)]
#[command(name = "tablo", version)]
struct Args {
    /// Query string, e.g. "?city=Нальчик&stopId=123&refresh=30".
    #[arg(long, env = "TABLO_QUERY")]
    query: Option<String>,

    #[arg(long, env = "TABLO_CITY")]
    city: Option<String>,

    #[arg(long = "stop-id", env = "TABLO_STOP_ID")]
    stop_id: Option<String>,

    /// Refresh period in seconds, clamped to [5, 300].
    #[arg(long, env = "TABLO_REFRESH")]
    refresh: Option<String>,

    /// light, dark or auto.
    #[arg(long, env = "TABLO_THEME")]
    theme: Option<String>,

    /// board or ticker.
    #[arg(long, env = "TABLO_VIEW")]
    view: Option<String>,

    /// Arrivals API base URL. Empty runs the built-in demo data.
    #[arg(long, env = "TABLO_API")]
    api: Option<String>,

    /// on or off.
    #[arg(long, env = "TABLO_CLOCK")]
    clock: Option<String>,

    /// on or off.
    #[arg(long, env = "TABLO_QR")]
    qr: Option<String>,

    /// SQLite file holding the last-known-good snapshots.
    #[arg(long, env = "TABLO_CACHE", default_value = "tablo-cache.sqlite")]
    cache: PathBuf,

    /// Keep the cache in memory only.
    #[arg(long)]
    no_cache: bool,

    #[arg(long, default_value = "info")]
    log_level: log::LevelFilter,
}

impl Args {
    fn board_config(&self) -> BoardConfig {
        let mut params = self
            .query
            .as_deref()
            .map(parse_query)
            .unwrap_or_default();
        let overrides = [
            ("city", &self.city),
            ("stopId", &self.stop_id),
            ("refresh", &self.refresh),
            ("theme", &self.theme),
            ("view", &self.view),
            ("api", &self.api),
            ("clock", &self.clock),
            ("qr", &self.qr),
        ];
        for (name, value) in overrides {
            if let Some(value) = value {
                params.insert(name.to_string(), value.clone());
            }
        }
        BoardConfig::from_params(&params)
    }
}

enum Command {
    CycleTheme,
    ToggleView,
    SwitchCity(String),
    SwitchStop(String),
}

fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    match word {
        "t" => Some(Command::CycleTheme),
        "v" => Some(Command::ToggleView),
        "city" if !rest.is_empty() => Some(Command::SwitchCity(rest.to_string())),
        "stop" if !rest.is_empty() => Some(Command::SwitchStop(rest.to_string())),
        _ => None,
    }
}

enum Input {
    Command(Command),
    Ignored,
    Closed,
}

/// Stdin only carries optional commands: a read error closes it, the board
/// keeps running.
fn classify_input(line: io::Result<Option<String>>) -> Input {
    match line {
        Ok(Some(line)) => parse_command(&line).map_or(Input::Ignored, Input::Command),
        Ok(None) => Input::Closed,
        Err(err) => {
            log::warn!("Reading commands from stdin failed, ignoring stdin: {}", err);
            Input::Closed
        }
    }
}

/// Opens the SQLite cache, or keeps snapshots in memory when it can't be opened.
async fn open_store(path: &Path) -> Arc<dyn KeyValueStore> {
    match SqliteStore::open(path).await {
        Ok(store) => Arc::new(store),
        Err(err) => {
            log::warn!(
                "Opening cache {} failed, keeping snapshots in memory: {}",
                path.display(),
                err
            );
            Arc::new(MemoryStore::new())
        }
    }
}

/// `COLORFGBG` is "fg;bg" (sometimes "fg;default;bg"); backgrounds 0-6 and 8 are dark.
fn terminal_prefers_dark(colorfgbg: Option<&str>) -> bool {
    colorfgbg
        .and_then(|value| value.rsplit(';').next())
        .and_then(|bg| bg.parse::<u8>().ok())
        .is_some_and(|bg| bg <= 6 || bg == 8)
}

/// Returns `true` when the board restarted its session.
fn apply_command(board: &mut Board, command: Command) -> bool {
    let mut config = board.config().clone();
    match command {
        Command::CycleTheme => {
            log::info!("Theme: {}", board.cycle_theme());
            return false;
        }
        Command::ToggleView => {
            config.view = match config.view {
                ViewMode::Board => ViewMode::Ticker,
                ViewMode::Ticker => ViewMode::Board,
            };
        }
        Command::SwitchCity(city) => config.identity.city = city,
        Command::SwitchStop(stop_id) => config.identity.stop_id = stop_id,
    }
    board.reconfigure(config)
}

fn draw(frame: &BoardFrame, config: &BoardConfig, options: RenderOptions) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    write!(stdout, "{}{}", CLEAR_SCREEN, render::render(frame, config, options))?;
    stdout.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    simple_logger::SimpleLogger::new()
        .with_level(args.log_level)
        .env()
        .init()?;

    let config = args.board_config();
    let store: Arc<dyn KeyValueStore> = if args.no_cache {
        Arc::new(MemoryStore::new())
    } else {
        open_store(&args.cache).await
    };
    let deps = BoardDeps {
        http: Arc::new(ReqwestClient::new()?),
        store,
        clock: Arc::new(SystemClock),
    };

    let options = RenderOptions {
        ansi: std::io::stdout().is_terminal(),
        system_dark: terminal_prefers_dark(std::env::var("COLORFGBG").ok().as_deref()),
    };
    let mut board = Board::start(config, deps);
    let mut frames = board.frames();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            changed = frames.changed() => {
                if changed.is_err() {
                    break;
                }
                let frame = frames.borrow_and_update().clone();
                draw(&frame, board.config(), options)?;
            }
            line = stdin.next_line(), if stdin_open => {
                match classify_input(line) {
                    Input::Command(command) => {
                        if apply_command(&mut board, command) {
                            frames = board.frames();
                        }
                        draw(&board.current(), board.config(), options)?;
                    }
                    Input::Ignored => {}
                    Input::Closed => stdin_open = false,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted, shutting down.");
                break;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_query() {
        let args = Args::try_parse_from([
            "tablo",
            "--query",
            "?city=Майкоп&stopId=5&view=ticker",
            "--stop-id",
            "9",
            "--refresh",
            "1",
            "--no-cache",
        ])
        .unwrap();
        let config = args.board_config();
        assert_eq!(config.identity.city, "Майкоп");
        assert_eq!(config.identity.stop_id, "9");
        assert_eq!(config.view, ViewMode::Ticker);
        assert_eq!(config.refresh, std::time::Duration::from_secs(5));
        assert!(args.no_cache);
    }

    #[test]
    fn parses_stdin_commands() {
        assert!(matches!(parse_command(" t "), Some(Command::CycleTheme)));
        assert!(matches!(parse_command("v"), Some(Command::ToggleView)));
        assert!(matches!(parse_command("stop 123"), Some(Command::SwitchStop(id)) if id == "123"));
        assert!(matches!(parse_command("city Нальчик"), Some(Command::SwitchCity(c)) if c == "Нальчик"));
        assert!(parse_command("stop").is_none());
        assert!(parse_command("").is_none());
    }

    #[tokio::test]
    async fn unreadable_stdin_closes_input_only() {
        let mut lines = BufReader::new(&b"t\nhello\n\xff\xfe\n"[..]).lines();
        assert!(matches!(
            classify_input(lines.next_line().await),
            Input::Command(Command::CycleTheme)
        ));
        assert!(matches!(classify_input(lines.next_line().await), Input::Ignored));
        assert!(matches!(classify_input(lines.next_line().await), Input::Closed));
        assert!(matches!(classify_input(Ok(None)), Input::Closed));
    }

    #[tokio::test]
    async fn unopenable_cache_falls_back_to_memory() {
        let store = open_store(Path::new("/nonexistent/tablo/cache.sqlite")).await;
        store.set("tablo:Нальчик:1", "{}".to_string()).await.unwrap();
        assert_eq!(
            store.get("tablo:Нальчик:1").await.unwrap().as_deref(),
            Some("{}")
        );
    }

    #[test]
    fn reads_terminal_background() {
        assert!(terminal_prefers_dark(Some("15;0")));
        assert!(terminal_prefers_dark(Some("15;default;8")));
        assert!(!terminal_prefers_dark(Some("0;15")));
        assert!(!terminal_prefers_dark(Some("garbage")));
        assert!(!terminal_prefers_dark(None));
    }
}
