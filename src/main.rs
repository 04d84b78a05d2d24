//! termplex - demo host for the session engine
//!
//! Plays the part of the editor that embeds the engine: it owns a
//! `SessionRegistry`, feeds it bytes and paints the resulting screen.
//!
//! # Quick Start
//!
//! ```text
//! termplex                 # Headless demo, prints the final screen
//! termplex -i              # Interactive echo session in this terminal
//! termplex -i -s zsh       # Same, with a shell hint attached to the session
//! termplex --write-config  # Write ~/.termplex/config.toml with defaults
//! ```

use std::env;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use crossterm::event::{self, Event as TermEvent, KeyCode, KeyEventKind};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use termplex::ui::{DebugRenderer, KeyMapper, Renderer};
use termplex::{ChannelSink, Config, Event, SessionOptions, SessionRegistry};

/// Id of the single session the demo drives
const SESSION_ID: &str = "main";

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Command line options
#[derive(Default)]
struct Args {
    interactive: bool,
    shell: Option<String>,
    write_config: bool,
}

fn print_help() {
    eprintln!("termplex {} - terminal session engine demo host", VERSION);
    eprintln!();
    eprintln!("Usage: termplex [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  (default)             Headless demo, prints the final screen");
    eprintln!("  -i, --interactive     Echo keystrokes into a session and paint it");
    eprintln!("  -s, --shell <CMD>     Shell hint attached to the session");
    eprintln!("      --write-config    Write the current configuration and exit");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Interactive keys: type to echo, Enter for a new line,");
    eprintln!("                  Backspace to move left, Esc to quit.");
    eprintln!();
    eprintln!("Configuration: ~/.termplex/config.toml");
}

fn parse_args() -> Result<Args, String> {
    let args: Vec<String> = env::args().collect();
    let mut parsed = Args::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                eprintln!("termplex {}", VERSION);
                std::process::exit(0);
            }
            "-i" | "--interactive" => parsed.interactive = true,
            "--write-config" => parsed.write_config = true,
            "-s" | "--shell" => {
                i += 1;
                let shell = args.get(i).ok_or("Missing shell argument")?;
                parsed.shell = Some(shell.clone());
            }
            other => return Err(format!("Unknown option: {}", other)),
        }
        i += 1;
    }

    Ok(parsed)
}

/// Log to `~/.termplex/termplex.log`; stdout belongs to the screen
fn init_logging(config: &Config) {
    let log_path = Config::config_dir()
        .map(|dir| dir.join("termplex.log"))
        .unwrap_or_else(|| std::path::PathBuf::from("termplex.log"));

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

/// Per-kind event counters
#[derive(Default)]
struct EventStats {
    data: usize,
    data_bytes: usize,
    resize: usize,
    cursor: usize,
    last_cursor: (u16, u16),
    exited: bool,
}

impl EventStats {
    fn record(&mut self, event: &Event) {
        match event {
            Event::Data { bytes } => {
                self.data += 1;
                self.data_bytes += bytes.len();
            }
            Event::Resize { .. } => self.resize += 1,
            Event::CursorMoved { x, y } => {
                self.cursor += 1;
                self.last_cursor = (*x, *y);
            }
            Event::Exit => self.exited = true,
        }
    }

    fn summary(&self) -> String {
        format!(
            "data: {} ({} bytes)  resize: {}  cursor: {} last ({}, {})",
            self.data,
            self.data_bytes,
            self.resize,
            self.cursor,
            self.last_cursor.0,
            self.last_cursor.1
        )
    }
}

fn main() -> anyhow::Result<()> {
    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    let mut config = Config::load();
    if let Some(shell) = args.shell.clone() {
        config.shell = Some(shell);
    }

    if args.write_config {
        let path = config.save().map_err(anyhow::Error::msg)?;
        eprintln!("Configuration written to {}", path.display());
        return Ok(());
    }

    init_logging(&config);
    info!("termplex {} starting...", VERSION);

    if args.interactive {
        run_interactive(&config)
    } else {
        run_demo(&config)
    }
}

/// Headless demo: feed scripted output and print the resulting screen
fn run_demo(config: &Config) -> anyhow::Result<()> {
    let (sink, events) = ChannelSink::new();
    let registry = SessionRegistry::with_config(config, Arc::new(sink));

    println!("=== termplex Demo Mode ===\n");

    let mut options = SessionOptions::new(40, 8);
    options.shell = config.shell.clone();
    registry.create(SESSION_ID, options)?;

    let demo_output = concat!(
        "Welcome to termplex!\r\n",
        "\r\n",
        "Only \\n, \\r and backspace are control\r\n",
        "characters; a very long line like this one wraps at the right edge.\r\n",
        "abc\x08\x08XY\r\n",
        "$ ",
    );
    registry.write(SESSION_ID, demo_output.as_bytes())?;
    registry.handle_input(SESSION_ID, b"echo hi")?;

    println!("{}", DebugRenderer::render(&registry.snapshot(SESSION_ID)?));

    registry.resize(SESSION_ID, 20, 6)?;
    println!("After resize to 20x6:\n");
    println!("{}", DebugRenderer::render(&registry.snapshot(SESSION_ID)?));

    registry.destroy(SESSION_ID)?;

    let mut stats = EventStats::default();
    while !stats.exited {
        let (_, event) = events
            .recv_timeout(Duration::from_secs(5))
            .context("event dispatcher did not finish")?;
        stats.record(&event);
    }
    println!("Events: {}", stats.summary());

    Ok(())
}

/// Interactive demo: keystrokes are echoed into a session and painted
fn run_interactive(config: &Config) -> anyhow::Result<()> {
    let (sink, events) = ChannelSink::new();
    let registry = SessionRegistry::with_config(config, Arc::new(sink));

    // One line is kept for the status bar
    let (cols, rows) = crossterm::terminal::size().context("cannot query terminal size")?;
    let mut options = registry.default_options();
    options.cols = cols.max(1);
    options.rows = rows.saturating_sub(1).max(1);
    registry.create(SESSION_ID, options)?;
    registry.write(
        SESSION_ID,
        b"termplex interactive demo\r\nType to echo, Esc to quit.\r\n\r\n",
    )?;

    let mut renderer = Renderer::new();
    renderer.init()?;
    let result = interactive_loop(&registry, &events, &mut renderer);
    renderer.cleanup()?;

    registry.destroy(SESSION_ID)?;
    if let Err(e) = &result {
        warn!(error = %e, "interactive session ended with an error");
    }
    result
}

fn interactive_loop(
    registry: &SessionRegistry,
    events: &Receiver<(String, Event)>,
    renderer: &mut Renderer,
) -> anyhow::Result<()> {
    let mut stats = EventStats::default();
    let mut dirty = true;

    loop {
        for (_, event) in events.try_iter() {
            stats.record(&event);
            dirty = true;
        }

        if dirty {
            let snapshot = registry.snapshot(SESSION_ID)?;
            renderer.render(&snapshot, &stats.summary())?;
            dirty = false;
        }

        if !event::poll(Duration::from_millis(50))? {
            continue;
        }

        match event::read()? {
            TermEvent::Key(key) if key.kind == KeyEventKind::Press => {
                if key.code == KeyCode::Esc {
                    break;
                }
                if let Some(bytes) = KeyMapper::map(&key) {
                    registry.handle_input(SESSION_ID, &bytes)?;
                }
            }
            TermEvent::Resize(cols, rows) => {
                registry.resize(SESSION_ID, cols.max(1), rows.saturating_sub(1).max(1))?;
            }
            _ => {}
        }
    }

    info!("interactive session closed");
    Ok(())
}
