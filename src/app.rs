//! Application state and event handling.
//!
//! This module defines the main application state that coordinates
//! between the loaded score, the audio engine, and the TUI interface.

use crate::audio::{AudioClock, AudioEngine, SynthHandle};
use crate::config::Settings;
use crate::error::{PlaybackError, SessionError};
use crate::midi::import_from_midi;
use crate::playback::{SchedulerState, Session};
use crate::projector::RenderFrame;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Seek step for the arrow keys, in seconds.
pub const SEEK_STEP_SECONDS: f64 = 5.0;

/// Pitch span shown before any score is loaded (C3 to C6).
const DEFAULT_PITCH_RANGE: (u8, u8) = (48, 84);

/// A session driving the live audio engine.
pub type LiveSession = Session<SynthHandle, AudioClock>;

/// Main application state.
pub struct App {
    /// The audio engine for playback.
    pub audio: AudioEngine,
    /// Path to the loaded SoundFont.
    pub soundfont_path: PathBuf,
    pub settings: Settings,
    /// At most one score is loaded at a time.
    session: Option<LiveSession>,
    /// Path of the loaded score.
    pub score_path: Option<PathBuf>,
    /// Lowest and highest pitch to draw.
    pub pitch_range: (u8, u8),
    /// The most recently projected frame.
    pub frame: RenderFrame,
    /// Status message to display.
    pub status_message: Option<(String, Instant)>,
}

impl App {
    /// Creates a new application with the specified SoundFont.
    ///
    /// # Errors
    ///
    /// Returns error if the audio engine cannot be initialized
    pub fn new(soundfont_path: PathBuf, settings: Settings) -> Result<Self> {
        let audio = AudioEngine::new(&soundfont_path).with_context(|| {
            format!(
                "Failed to start audio with SoundFont {}",
                soundfont_path.display()
            )
        })?;

        Ok(Self {
            audio,
            soundfont_path,
            settings: settings.validated(),
            session: None,
            score_path: None,
            pitch_range: DEFAULT_PITCH_RANGE,
            frame: RenderFrame::default(),
            status_message: None,
        })
    }

    pub fn session(&self) -> Option<&LiveSession> {
        self.session.as_ref()
    }

    /// Loads a MIDI file into a new session, replacing the current one.
    ///
    /// On failure the current session is kept and the error is shown.
    ///
    /// # Returns
    ///
    /// true if load was successful
    pub fn load_score(&mut self, path: &Path) -> bool {
        let result = import_from_midi(path)
            .map_err(SessionError::from)
            .and_then(|score| {
                Session::load(
                    &score,
                    self.audio.handle(),
                    self.audio.clock(),
                    &self.settings,
                )
            });

        match result {
            Ok((session, warnings)) => {
                if let Some(mut previous) = self.session.take() {
                    if let Err(e) = previous.stop() {
                        tracing::warn!("Failed to stop previous session: {}", e);
                    }
                }

                self.pitch_range = session
                    .timeline()
                    .pitch_range()
                    .unwrap_or(DEFAULT_PITCH_RANGE);
                self.frame = RenderFrame::default();
                self.session = Some(session);
                self.score_path = Some(path.to_path_buf());

                if warnings.is_empty() {
                    self.set_status(format!("Loaded: {}", path.display()));
                } else {
                    self.set_status(format!(
                        "Loaded: {} ({} event(s) dropped, see log)",
                        path.display(),
                        warnings.len()
                    ));
                }
                true
            }
            Err(e) => {
                tracing::error!("Load failed: {}", e);
                self.set_status(format!("Load failed: {}", e));
                false
            }
        }
    }

    /// Sets a status message to display temporarily.
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some((message.into(), Instant::now()));
    }

    /// Clears expired status messages.
    pub fn clear_expired_status(&mut self) {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed() > Duration::from_secs(3) {
                self.status_message = None;
            }
        }
    }

    /// Toggles play/pause state.
    pub fn toggle_playback(&mut self) {
        let Some(session) = self.session.as_mut() else {
            self.set_status("No score loaded");
            return;
        };
        let was_playing = session.is_playing();
        match session.toggle() {
            Ok(()) => self.set_status(if was_playing { "Paused" } else { "Playing" }),
            Err(e) => self.handle_playback_error(e),
        }
    }

    /// Stops playback and resets to the beginning.
    pub fn stop_playback(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.stop() {
            Ok(()) => self.set_status("Stopped"),
            Err(e) => self.handle_playback_error(e),
        }
    }

    /// Restarts playback from the beginning of the score.
    pub fn restart_playback(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let result = session.seek_to(0.0).and_then(|_| session.play());
        match result {
            Ok(()) => self.set_status("Restarting from beginning"),
            Err(e) => self.handle_playback_error(e),
        }
    }

    /// Seeks relative to the current position.
    pub fn seek_relative(&mut self, delta_seconds: f64) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.seek_by(delta_seconds) {
            Ok(position) => self.set_status(format!("Seek: {}", format_time(position))),
            Err(e) => self.handle_playback_error(e),
        }
    }

    /// Advances playback and refreshes the frame to draw.
    /// Should be called once per display frame.
    pub fn update(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.tick() {
            Ok(frame) => self.frame = frame,
            Err(e) => self.handle_playback_error(e),
        }
    }

    /// Current position, or 0 if nothing is loaded.
    pub fn elapsed_seconds(&self) -> f64 {
        self.frame.elapsed_seconds
    }

    pub fn playback_state(&self) -> SchedulerState {
        self.session
            .as_ref()
            .map(|session| session.state())
            .unwrap_or_default()
    }

    /// Drops the session once its clock is gone; it cannot be resumed in sync.
    fn handle_playback_error(&mut self, error: PlaybackError) {
        tracing::error!("Playback error: {}", error);
        if matches!(error, PlaybackError::ClockUnavailable(_)) {
            self.session = None;
            self.frame = RenderFrame::default();
        }
        self.set_status(format!("Playback stopped: {}", error));
    }
}

/// Formats seconds as `m:ss.t`.
pub fn format_time(seconds: f64) -> String {
    let tenths = (seconds.max(0.0) * 10.0).floor() as u64;
    format!("{}:{:02}.{}", tenths / 600, tenths / 10 % 60, tenths % 10)
}
