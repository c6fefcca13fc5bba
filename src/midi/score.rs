//! Parsed score representation.
//!
//! These types are the boundary between the score parser and the timing
//! pipeline. They stay tick-based and only lightly validated: range checks
//! and dropping of bad entries happen in the timeline builder, so any parser
//! can produce them.

use serde::{Deserialize, Serialize};

/// A single note as read from the score, in ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNote {
    /// Tick at which the key is struck.
    pub on_tick: u64,

    /// Tick at which the key is released. `None` if the file never closed it.
    pub off_tick: Option<u64>,

    /// MIDI note number (0-127). 60 = Middle C (C4).
    pub pitch: u8,

    /// Strike velocity normalized to 0.0-1.0.
    pub velocity: f32,

    /// MIDI channel (0-15).
    pub channel: u8,
}

impl RawNote {
    /// Creates a closed note.
    pub fn new(pitch: u8, velocity: f32, channel: u8, on_tick: u64, off_tick: u64) -> Self {
        Self {
            on_tick,
            off_tick: Some(off_tick),
            pitch,
            velocity,
            channel,
        }
    }
}

/// A control change event as read from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawControl {
    pub tick: u64,
    pub controller: u8,
    pub value: u8,
    pub channel: u8,
}

/// A tempo change, expressed the way MIDI stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTempoChange {
    pub tick: u64,
    pub microseconds_per_beat: u32,
}

impl RawTempoChange {
    /// Creates a tempo change from beats per minute.
    #[cfg(test)]
    pub fn from_bpm(tick: u64, bpm: f64) -> Self {
        Self {
            tick,
            microseconds_per_beat: (60_000_000.0 / bpm).round() as u32,
        }
    }
}

/// The instrument a channel should start with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramAssignment {
    pub channel: u8,
    /// MIDI program number (0-127).
    pub program: u8,
}

/// One track of the score: its notes and control changes in parse order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTrack {
    /// Human-readable name for the track.
    pub name: String,
    pub notes: Vec<RawNote>,
    pub controls: Vec<RawControl>,
}

impl RawTrack {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A complete parsed score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawScore {
    /// Display name, usually the file stem.
    pub name: String,

    /// Tick resolution from the file header.
    pub ticks_per_beat: u16,

    pub tracks: Vec<RawTrack>,

    /// Tempo changes from every track, in parse order.
    pub tempo_changes: Vec<RawTempoChange>,

    /// Initial instrument per channel, if the file selects one.
    #[serde(default)]
    pub programs: Vec<ProgramAssignment>,
}

impl RawScore {
    /// Creates an empty score with the given tick resolution.
    pub fn new(name: impl Into<String>, ticks_per_beat: u16) -> Self {
        Self {
            name: name.into(),
            ticks_per_beat,
            tracks: Vec::new(),
            tempo_changes: Vec::new(),
            programs: Vec::new(),
        }
    }

    /// Returns the total number of raw notes across all tracks.
    pub fn note_count(&self) -> usize {
        self.tracks.iter().map(|t| t.notes.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tempo_from_bpm() {
        assert_eq!(RawTempoChange::from_bpm(0, 120.0).microseconds_per_beat, 500_000);
        assert_eq!(RawTempoChange::from_bpm(0, 60.0).microseconds_per_beat, 1_000_000);
    }

    #[test]
    fn test_note_count() {
        let mut score = RawScore::new("Test", 480);
        let mut a = RawTrack::new("A");
        a.notes.push(RawNote::new(60, 0.8, 0, 0, 480));
        a.notes.push(RawNote::new(64, 0.8, 0, 0, 480));
        let mut b = RawTrack::new("B");
        b.notes.push(RawNote::new(36, 0.5, 1, 0, 960));
        score.tracks.push(a);
        score.tracks.push(b);
        assert_eq!(score.note_count(), 3);
    }
}
