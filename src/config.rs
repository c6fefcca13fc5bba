//! Playback and display settings.
//!
//! Settings are read from an optional JSON file. Missing fields take their
//! defaults, and out-of-range values are pulled back into range with a
//! warning rather than rejected.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Shortest lookahead window the display supports, in seconds.
pub const MIN_LOOKAHEAD_SECONDS: f64 = 3.0;

/// Longest lookahead window the display supports, in seconds.
pub const MAX_LOOKAHEAD_SECONDS: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// How far ahead of the strike line notes are shown.
    pub lookahead_seconds: f64,

    /// How long a released note takes to fade out.
    pub fade_duration_seconds: f64,

    /// Brightness multiplier for notes that are currently sounding.
    pub highlight_brightness_factor: f64,

    /// How long playback keeps running past the last note before pausing.
    pub end_padding_seconds: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            lookahead_seconds: 4.0,
            fade_duration_seconds: 0.1,
            highlight_brightness_factor: 1.3,
            end_padding_seconds: 1.0,
        }
    }
}

impl Settings {
    /// Loads settings from a JSON file and validates them.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is not valid JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path.as_ref())?;
        let settings: Settings = serde_json::from_str(&json)?;
        tracing::info!("Loaded settings from {:?}", path.as_ref());
        Ok(settings.validated())
    }

    /// Returns a copy with every value inside its supported range.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();

        if !self.lookahead_seconds.is_finite() {
            tracing::warn!("Invalid lookahead, using default");
            self.lookahead_seconds = defaults.lookahead_seconds;
        } else if !(MIN_LOOKAHEAD_SECONDS..=MAX_LOOKAHEAD_SECONDS).contains(&self.lookahead_seconds)
        {
            let clamped = self
                .lookahead_seconds
                .clamp(MIN_LOOKAHEAD_SECONDS, MAX_LOOKAHEAD_SECONDS);
            tracing::warn!(
                "Lookahead {}s outside {}-{}s, using {}s",
                self.lookahead_seconds,
                MIN_LOOKAHEAD_SECONDS,
                MAX_LOOKAHEAD_SECONDS,
                clamped
            );
            self.lookahead_seconds = clamped;
        }

        if !(self.fade_duration_seconds.is_finite() && self.fade_duration_seconds > 0.0) {
            tracing::warn!(
                "Fade duration must be positive, using {}s",
                defaults.fade_duration_seconds
            );
            self.fade_duration_seconds = defaults.fade_duration_seconds;
        }

        let brightness = self.highlight_brightness_factor;
        if !(brightness.is_finite() && brightness >= 1.0) {
            tracing::warn!(
                "Highlight brightness must be at least 1.0, using {}",
                defaults.highlight_brightness_factor
            );
            self.highlight_brightness_factor = defaults.highlight_brightness_factor;
        }

        if !(self.end_padding_seconds.is_finite() && self.end_padding_seconds >= 0.0) {
            self.end_padding_seconds = defaults.end_padding_seconds;
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.lookahead_seconds, 4.0);
        assert_eq!(settings.fade_duration_seconds, 0.1);
        assert_eq!(settings.highlight_brightness_factor, 1.3);
        assert_eq!(settings.clone().validated(), settings);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: Settings = serde_json::from_str(r#"{ "lookahead_seconds": 3.5 }"#).unwrap();
        assert_eq!(settings.lookahead_seconds, 3.5);
        assert_eq!(settings.fade_duration_seconds, 0.1);
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        let settings = Settings {
            lookahead_seconds: 10.0,
            fade_duration_seconds: 0.0,
            highlight_brightness_factor: 0.5,
            end_padding_seconds: -1.0,
        }
        .validated();
        assert_eq!(settings.lookahead_seconds, MAX_LOOKAHEAD_SECONDS);
        assert_eq!(settings.fade_duration_seconds, 0.1);
        assert_eq!(settings.highlight_brightness_factor, 1.3);
        assert_eq!(settings.end_padding_seconds, 1.0);

        let settings = Settings {
            lookahead_seconds: 1.0,
            ..Settings::default()
        }
        .validated();
        assert_eq!(settings.lookahead_seconds, MIN_LOOKAHEAD_SECONDS);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Settings::load("/nonexistent/keyfall.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
