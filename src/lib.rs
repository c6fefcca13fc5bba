//! keyfall - A terminal falling-note piano roll.
//!
//! This library provides the timing core (tempo map, timeline, scheduler,
//! playback clock, render projection) along with the audio engine and the
//! terminal front end built on it.

pub mod app;
pub mod audio;
pub mod config;
pub mod error;
pub mod midi;
pub mod playback;
pub mod projector;
pub mod ui;

// Re-export commonly used types
pub use app::App;
pub use audio::{export_to_wav, AudioEngine};
pub use config::Settings;
pub use error::{BuildWarning, ConfigError, LoadError, PlaybackError, SessionError};
pub use midi::{build_timeline, import_from_midi, RawScore, TempoMap, Timeline};
pub use playback::{Scheduler, Session, SynthSink};
pub use projector::{NoteRect, RenderFrame, RenderProjector};
