//! Audio engine for MIDI synthesis and playback.
//!
//! This module provides real-time MIDI synthesis using rustysynth
//! and audio output via rodio. It supports:
//! - Loading SoundFont files for instrument sounds
//! - A hardware-paced playback clock counted from the output stream
//! - Offline WAV export through the same scheduler

pub mod engine;
pub mod export;

pub use engine::{AudioClock, AudioEngine, SynthHandle, SAMPLE_RATE};
pub use export::export_to_wav;
