mod types;
mod platform;
mod cli;
mod config;
mod screen;
mod vt;
mod pane;
mod tree;
mod input;
mod commands;
mod rendering;
mod app;

use std::fs::OpenOptions;
use std::io::{self, Stdout};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use log::info;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use crate::cli::Cli;
use crate::config::Config;
use crate::pane::ShellSpawner;
use crate::platform::STDIN_FD;
use crate::types::{AppState, VERSION};

/// Log to the file named by `STTM_LOG`, if any. The screen belongs to the
/// panes, so nothing is ever logged to stderr.
fn setup_logging() -> Result<()> {
    let Some(path) = std::env::var_os("STTM_LOG") else { return Ok(()) };
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.to_string_lossy()))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .format_timestamp_secs()
        .init();
    Ok(())
}

fn start(terminal: &mut Terminal<CrosstermBackend<Stdout>>, config: &Config) -> Result<()> {
    let size = terminal.size().context("failed to query terminal size")?;
    let spawner = ShellSpawner::new(config.shell.clone(), config.term.clone());
    let mut app = AppState::new(config, Box::new(spawner), (size.width, size.height));
    app.layout.fds.insert(STDIN_FD)?;
    let AppState { layout, spawner, .. } = &mut app;
    layout.bootstrap(spawner.as_ref()).with_context(|| format!("failed to start {}", config.shell))?;
    app::run(terminal, &mut app).context("terminal I/O failed")?;
    Ok(())
}

fn run(config: &Config) -> Result<()> {
    platform::ignore_sigchld();
    enable_raw_mode().context("failed to enter raw mode")?;
    let mut stdout = io::stdout();
    let result = execute!(stdout, EnterAlternateScreen)
        .context("failed to enter the alternate screen")
        .and_then(|()| Terminal::new(CrosstermBackend::new(stdout)).context("failed to set up the terminal"))
        .and_then(|mut terminal| {
            let result = start(&mut terminal, config);
            let _ = terminal.show_cursor();
            result
        });

    // Always restore, even on error. SGR state survives leaving the
    // alternate screen, so reset it first.
    let _ = disable_raw_mode();
    let mut out = io::stdout();
    let _ = execute!(out, crossterm::style::Print("\x1b[0m"), LeaveAlternateScreen, crossterm::cursor::Show);
    result
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() { ExitCode::FAILURE } else { ExitCode::SUCCESS };
        }
    };
    if let Err(e) = setup_logging() {
        eprintln!("sttm: {e:#}");
        return ExitCode::FAILURE;
    }
    let config = Config::from_cli(&cli);
    info!("sttm {VERSION} starting: shell={} TERM={} scrollback={}", config.shell, config.term, config.scrollback);

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("sttm: {e:#}");
            ExitCode::FAILURE
        }
    }
}
