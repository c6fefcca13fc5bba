//! keyfall - A terminal falling-note piano roll.
//!
//! Plays a Standard MIDI File through a SoundFont while its notes fall onto a
//! keyboard in the terminal, kept in sync with the audio output.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- song.mid --soundfont piano.sf2
//! cargo run -- song.mid --export song.wav   # Render to WAV without the UI
//! ```

use keyfall::app::{App, SEEK_STEP_SECONDS};
use keyfall::config::Settings;
use keyfall::midi::{build_timeline, import_from_midi, TempoMap};
use keyfall::{export_to_wav, ui};

use anyhow::{bail, Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io::{self, Stdout, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// SoundFont used when none is given on the command line.
const DEFAULT_SOUNDFONT: &str = "assets/TimGM6mb.sf2";

/// Command-line options for the application.
struct CliOptions {
    /// MIDI file to play.
    score: PathBuf,
    /// Path to a custom SoundFont file.
    soundfont: PathBuf,
    /// Optional JSON settings file.
    config: Option<PathBuf>,
    /// Render to this WAV file instead of starting the UI.
    export: Option<PathBuf>,
}

impl CliOptions {
    /// Parses command-line arguments.
    ///
    /// Supports:
    /// - `<score.mid>`: The MIDI file to play
    /// - `--soundfont <path>` or `-sf <path>`: Specify a custom SoundFont file
    /// - `--config <path>` or `-c <path>`: Load settings from a JSON file
    /// - `--export <path>` or `-e <path>`: Render to WAV and exit
    /// - `--help` or `-h`: Print help and exit
    fn parse() -> Result<Self> {
        let args: Vec<String> = std::env::args().collect();
        let mut score: Option<PathBuf> = None;
        let mut soundfont: Option<PathBuf> = None;
        let mut config: Option<PathBuf> = None;
        let mut export: Option<PathBuf> = None;
        let mut i = 1;

        while i < args.len() {
            match args[i].as_str() {
                flag @ ("--soundfont" | "-sf" | "--config" | "-c" | "--export" | "-e") => {
                    i += 1;
                    let Some(value) = args.get(i) else {
                        bail!("{} requires a path argument", flag);
                    };
                    let value = Some(PathBuf::from(value));
                    match flag {
                        "--soundfont" | "-sf" => soundfont = value,
                        "--config" | "-c" => config = value,
                        _ => export = value,
                    }
                }
                "--help" | "-h" => {
                    let program = args.first().map(String::as_str).unwrap_or("keyfall");
                    eprintln!("keyfall - Terminal falling-note piano roll");
                    eprintln!();
                    eprintln!("Usage: {} <score.mid> [OPTIONS]", program);
                    eprintln!();
                    eprintln!("Options:");
                    eprintln!(
                        "  -sf, --soundfont PATH  SoundFont file (.sf2) [default: {}]",
                        DEFAULT_SOUNDFONT
                    );
                    eprintln!("  -c, --config PATH      Settings file (JSON)");
                    eprintln!("  -e, --export PATH      Render the score to a WAV file and exit");
                    eprintln!("  -h, --help             Print this help message");
                    eprintln!();
                    eprintln!("Set RUST_LOG=keyfall=debug for diagnostics on stderr.");
                    std::process::exit(0);
                }
                other if other.starts_with('-') => {
                    bail!("Unknown option: {} (use --help for usage information)", other);
                }
                other => {
                    if other.ends_with(".sf2") {
                        soundfont = Some(PathBuf::from(other));
                    } else if score.is_none() {
                        score = Some(PathBuf::from(other));
                    } else {
                        bail!("Unexpected argument: {}", other);
                    }
                }
            }
            i += 1;
        }

        let Some(score) = score else {
            bail!("No score given (use --help for usage information)");
        };

        Ok(Self {
            score,
            soundfont: soundfont.unwrap_or_else(|| PathBuf::from(DEFAULT_SOUNDFONT)),
            config,
            export,
        })
    }
}

/// Main entry point.
fn main() -> Result<()> {
    // Parse CLI options first (before any terminal setup)
    let cli = CliOptions::parse()?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let settings = match &cli.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };

    if let Some(output) = &cli.export {
        return export_score(&cli.score, &cli.soundfont, output);
    }

    let mut app =
        App::new(cli.soundfont.clone(), settings).context("Failed to initialize application")?;
    if !app.load_score(&cli.score) {
        let reason = app
            .status_message
            .take()
            .map(|(msg, _)| msg)
            .unwrap_or_default();
        bail!("{}", reason);
    }

    let mut terminal = setup_terminal().context("Failed to setup terminal")?;

    let result = run_app(&mut terminal, &mut app);

    restore_terminal(&mut terminal).context("Failed to restore terminal")?;

    result
}

/// Renders a score to WAV without opening the UI.
fn export_score(score_path: &Path, soundfont: &Path, output: &Path) -> Result<()> {
    let score = import_from_midi(score_path)
        .with_context(|| format!("Failed to read {}", score_path.display()))?;
    let (tempo, mut warnings) = TempoMap::build(score.ticks_per_beat, &score.tempo_changes);
    let (timeline, timeline_warnings) = build_timeline(&score, &tempo)?;
    warnings.extend(timeline_warnings);
    if !warnings.is_empty() {
        eprintln!("{} event(s) dropped while building the timeline", warnings.len());
    }

    let mut last_percent = None;
    export_to_wav(
        &timeline,
        &score.programs,
        soundfont,
        output,
        Some(|progress: f32| {
            let percent = (progress * 100.0) as u32;
            if last_percent != Some(percent) {
                last_percent = Some(percent);
                eprint!("\rExporting... {:3}%", percent);
                let _ = io::stderr().flush();
            }
        }),
    )?;
    eprintln!();
    eprintln!("Exported to {}", output.display());
    Ok(())
}

/// Sets up the terminal for TUI rendering.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("Failed to create terminal")?;
    Ok(terminal)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;
    Ok(())
}

/// Main application loop.
fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    loop {
        app.update();
        app.clear_expired_status();

        terminal.draw(|frame| ui::render(frame, app))?;

        // Handle events with a short timeout to keep frames coming
        if event::poll(Duration::from_millis(16))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && handle_key(app, key.code) {
                    return Ok(());
                }
            }
        }
    }
}

/// Handles a key press. Returns true to quit.
fn handle_key(app: &mut App, code: KeyCode) -> bool {
    match code {
        KeyCode::Char('q') | KeyCode::Esc => return true,
        KeyCode::Char(' ') => app.toggle_playback(),
        KeyCode::Left => app.seek_relative(-SEEK_STEP_SECONDS),
        KeyCode::Right => app.seek_relative(SEEK_STEP_SECONDS),
        KeyCode::Home => app.restart_playback(),
        KeyCode::Char('s') => app.stop_playback(),
        _ => {}
    }
    false
}
