//! Error and warning types shared across the crate.
//!
//! Fatal conditions (an unusable score, a missing audio clock) are typed
//! errors that abort session construction. Recoverable anomalies found while
//! building a timeline are collected as [`BuildWarning`]s and returned next to
//! the successful result.

use thiserror::Error;

/// Errors that make a score unusable for playback.
#[derive(Debug, Error)]
pub enum LoadError {
    /// File could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The bytes are not a valid MIDI file.
    #[error("MIDI parse error: {0}")]
    Parse(String),
    /// Valid MIDI, but a format or timing mode that cannot be played.
    #[error("Unsupported format: {0}")]
    Unsupported(String),
    /// Parsing succeeded but no track contained a single usable note.
    #[error("Score contains no playable notes")]
    Empty,
}

/// Errors raised by the audio clock and engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlaybackError {
    /// No hardware-paced clock is available, so playback cannot run in sync.
    #[error("Audio clock unavailable: {0}")]
    ClockUnavailable(String),
    /// The SoundFont could not be loaded into the synthesizer.
    #[error("SoundFont error: {0}")]
    SoundFont(String),
}

/// Errors raised while constructing a playback session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

/// Errors raised while reading the settings file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid settings file: {0}")]
    Json(#[from] serde_json::Error),
}

/// A recoverable anomaly dropped or repaired while building the timeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildWarning {
    /// A tempo change that cannot be represented as a rate.
    #[error("tempo change at tick {tick} has invalid rate {microseconds_per_beat} us/beat")]
    InvalidTempo { tick: u64, microseconds_per_beat: u32 },
    /// A note with an out-of-range or inconsistent field.
    #[error("track {track}: dropped note at tick {tick}: {reason}")]
    MalformedNote {
        track: usize,
        tick: u64,
        reason: &'static str,
    },
    /// A note-on that never received a matching note-off.
    #[error("track {track}: dropped note {pitch} at tick {tick} with no note-off")]
    UnclosedNote { track: usize, tick: u64, pitch: u8 },
    /// A control change with an out-of-range field.
    #[error("track {track}: dropped control change at tick {tick}: {reason}")]
    MalformedControl {
        track: usize,
        tick: u64,
        reason: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_wraps_verbatim() {
        let err: SessionError = PlaybackError::ClockUnavailable("no device".into()).into();
        assert_eq!(err.to_string(), "Audio clock unavailable: no device");

        let err: SessionError = LoadError::Empty.into();
        assert_eq!(err.to_string(), "Score contains no playable notes");
    }

    #[test]
    fn test_warning_display() {
        let warning = BuildWarning::UnclosedNote {
            track: 2,
            tick: 960,
            pitch: 64,
        };
        assert_eq!(
            warning.to_string(),
            "track 2: dropped note 64 at tick 960 with no note-off"
        );
    }
}
