//! Audio engine for real-time MIDI synthesis.
//!
//! Renders through a rustysynth synthesizer into a rodio output stream. The
//! stream doubles as the playback clock: every stereo frame the device pulls
//! is counted, so piece time advances exactly as fast as audio is played.

use crate::error::PlaybackError;
use crate::playback::{HardwareClock, SynthSink};
use rodio::{OutputStream, OutputStreamHandle, Source};
use rustysynth::{SoundFont, Synthesizer, SynthesizerSettings};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Sample rate for audio synthesis (44.1 kHz standard).
pub const SAMPLE_RATE: u32 = 44100;

/// Audio buffer size for low-latency playback.
/// Smaller = lower latency but higher CPU usage.
const BUFFER_SIZE: usize = 256;

/// Shared state between the audio engine and the audio source.
/// Uses atomics for lock-free access from the audio thread.
struct SharedState {
    /// Stereo frames handed to the output device so far.
    frames: AtomicU64,
    /// Cleared once the output stream drops the source.
    alive: AtomicBool,
}

/// Audio source that generates samples from the synthesizer.
/// Implements rodio's Source trait for playback.
struct SynthSource {
    synth: Arc<Mutex<Synthesizer>>,
    state: Arc<SharedState>,
    left_buf: Vec<f32>,
    right_buf: Vec<f32>,
    buf_pos: usize,
    /// Current channel (0 = left, 1 = right).
    channel: usize,
}

impl SynthSource {
    fn new(synth: Arc<Mutex<Synthesizer>>, state: Arc<SharedState>) -> Self {
        Self {
            synth,
            state,
            left_buf: vec![0.0; BUFFER_SIZE],
            right_buf: vec![0.0; BUFFER_SIZE],
            buf_pos: BUFFER_SIZE, // Start at end to trigger first render
            channel: 0,
        }
    }
}

impl Iterator for SynthSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.buf_pos >= BUFFER_SIZE {
            if let Ok(mut synth) = self.synth.lock() {
                synth.render(&mut self.left_buf, &mut self.right_buf);
            } else {
                self.left_buf.fill(0.0);
                self.right_buf.fill(0.0);
            }
            self.buf_pos = 0;
        }

        // Interleave stereo samples: L, R, L, R, ...
        let sample = if self.channel == 0 {
            self.left_buf[self.buf_pos]
        } else {
            self.right_buf[self.buf_pos]
        };

        self.channel = 1 - self.channel;
        if self.channel == 0 {
            self.buf_pos += 1;
            self.state.frames.fetch_add(1, Ordering::Release);
        }

        Some(sample)
    }
}

impl Drop for SynthSource {
    fn drop(&mut self) {
        self.state.alive.store(false, Ordering::Release);
    }
}

impl Source for SynthSource {
    fn current_frame_len(&self) -> Option<usize> {
        None // Continuous stream
    }

    fn channels(&self) -> u16 {
        2 // Stereo
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        None // Infinite stream
    }
}

/// Loads a SoundFont and builds a synthesizer for it.
///
/// # Errors
///
/// Returns [`PlaybackError::SoundFont`] if the file cannot be opened or parsed
pub fn load_synthesizer<P: AsRef<Path>>(soundfont_path: P) -> Result<Synthesizer, PlaybackError> {
    let path = soundfont_path.as_ref();
    let mut file = BufReader::new(File::open(path).map_err(|e| {
        PlaybackError::SoundFont(format!("Failed to open {}: {}", path.display(), e))
    })?);
    let soundfont = Arc::new(
        SoundFont::new(&mut file)
            .map_err(|e| PlaybackError::SoundFont(format!("Failed to load: {:?}", e)))?,
    );

    let settings = SynthesizerSettings::new(SAMPLE_RATE as i32);
    Synthesizer::new(&soundfont, &settings)
        .map_err(|e| PlaybackError::SoundFont(format!("Failed to create synthesizer: {:?}", e)))
}

impl SynthSink for Synthesizer {
    fn trigger(&mut self, pitch: u8, channel: u8, velocity: u8) {
        self.note_on(channel as i32, pitch as i32, velocity as i32);
    }

    fn release(&mut self, pitch: u8, channel: u8) {
        self.note_off(channel as i32, pitch as i32);
    }

    fn release_all(&mut self) {
        self.note_off_all(true);
    }

    fn set_program(&mut self, channel: u8, program: u8) {
        // Program change is MIDI command 0xC0 (192)
        self.process_midi_message(channel as i32, 0xC0, program as i32, 0);
    }
}

/// The main audio engine.
///
/// Owns the output stream; dropping the engine stops audio and invalidates
/// every [`AudioClock`] taken from it.
pub struct AudioEngine {
    synth: Arc<Mutex<Synthesizer>>,
    state: Arc<SharedState>,
    /// Audio output stream (must be kept alive).
    _stream: OutputStream,
    _stream_handle: OutputStreamHandle,
}

impl AudioEngine {
    /// Creates a new audio engine with the specified SoundFont.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The SoundFont file cannot be read or is invalid
    /// - Audio output cannot be initialized, in which case there is no clock
    ///   to play against
    pub fn new<P: AsRef<Path>>(soundfont_path: P) -> Result<Self, PlaybackError> {
        let synth = Arc::new(Mutex::new(load_synthesizer(soundfont_path)?));

        let state = Arc::new(SharedState {
            frames: AtomicU64::new(0),
            alive: AtomicBool::new(true),
        });

        let (stream, stream_handle) = OutputStream::try_default().map_err(|e| {
            PlaybackError::ClockUnavailable(format!("Failed to open audio output: {}", e))
        })?;

        let source = SynthSource::new(Arc::clone(&synth), Arc::clone(&state));
        stream_handle.play_raw(source).map_err(|e| {
            PlaybackError::ClockUnavailable(format!("Failed to start audio playback: {}", e))
        })?;

        tracing::info!("Audio output started at {} Hz", SAMPLE_RATE);

        Ok(Self {
            synth,
            state,
            _stream: stream,
            _stream_handle: stream_handle,
        })
    }

    /// A handle for driving the synthesizer.
    pub fn handle(&self) -> SynthHandle {
        SynthHandle {
            synth: Arc::clone(&self.synth),
        }
    }

    /// A clock paced by the output device.
    pub fn clock(&self) -> AudioClock {
        AudioClock {
            state: Arc::clone(&self.state),
        }
    }
}

/// Shared access to the engine's synthesizer.
#[derive(Clone)]
pub struct SynthHandle {
    synth: Arc<Mutex<Synthesizer>>,
}

impl SynthSink for SynthHandle {
    fn trigger(&mut self, pitch: u8, channel: u8, velocity: u8) {
        if let Ok(mut synth) = self.synth.lock() {
            synth.trigger(pitch, channel, velocity);
        }
    }

    fn release(&mut self, pitch: u8, channel: u8) {
        if let Ok(mut synth) = self.synth.lock() {
            synth.release(pitch, channel);
        }
    }

    fn release_all(&mut self) {
        if let Ok(mut synth) = self.synth.lock() {
            synth.release_all();
        }
    }

    fn set_program(&mut self, channel: u8, program: u8) {
        if let Ok(mut synth) = self.synth.lock() {
            synth.set_program(channel, program);
        }
    }
}

/// Counts frames consumed by the output device.
#[derive(Clone)]
pub struct AudioClock {
    state: Arc<SharedState>,
}

impl HardwareClock for AudioClock {
    fn now(&self) -> Result<f64, PlaybackError> {
        if !self.state.alive.load(Ordering::Acquire) {
            return Err(PlaybackError::ClockUnavailable(
                "audio output stream stopped".into(),
            ));
        }
        Ok(self.state.frames.load(Ordering::Acquire) as f64 / SAMPLE_RATE as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared() -> Arc<SharedState> {
        Arc::new(SharedState {
            frames: AtomicU64::new(0),
            alive: AtomicBool::new(true),
        })
    }

    #[test]
    fn test_clock_counts_frames() {
        let state = shared();
        let clock = AudioClock {
            state: Arc::clone(&state),
        };
        assert_eq!(clock.now().unwrap(), 0.0);

        state.frames.store(SAMPLE_RATE as u64 / 2, Ordering::Release);
        assert_eq!(clock.now().unwrap(), 0.5);
    }

    #[test]
    fn test_clock_fails_after_stream_ends() {
        let state = shared();
        let clock = AudioClock {
            state: Arc::clone(&state),
        };
        state.alive.store(false, Ordering::Release);
        assert!(matches!(
            clock.now(),
            Err(PlaybackError::ClockUnavailable(_))
        ));
    }

    #[test]
    fn test_missing_soundfont() {
        assert!(matches!(
            load_synthesizer("does/not/exist.sf2"),
            Err(PlaybackError::SoundFont(_))
        ));
    }
}
