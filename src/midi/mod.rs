//! Score data and the build-time timing pipeline.
//!
//! Data flows one way here: a parsed [`RawScore`] is turned into a
//! [`TempoMap`], which the timeline builder uses to produce an immutable,
//! time-sorted [`Timeline`] with sustain-resolved note durations. The
//! [`Timeline`] doubles as its own seek index.

mod midi_import;
mod score;
mod seek;
mod tempo;
mod timeline;

pub use midi_import::{import_from_midi, parse_midi};
pub use score::{ProgramAssignment, RawControl, RawNote, RawScore, RawTempoChange, RawTrack};
pub use tempo::{TempoMap, TempoSegment};
pub use timeline::{build_timeline, EventKind, Timeline, TimelineEvent};

/// Standard MIDI note names for display purposes.
/// Maps MIDI note number (0-127) to note name within an octave.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Number of MIDI channels.
pub const CHANNEL_COUNT: usize = 16;

/// The sustain pedal controller number.
pub const SUSTAIN_CONTROLLER: u8 = 64;

/// Controller values above this engage sustain; values below release it.
/// A value exactly at the threshold leaves the pedal where it was.
pub const SUSTAIN_THRESHOLD: u8 = 64;

/// Tempo assumed when a score carries no tempo events (120 BPM).
pub const DEFAULT_MICROSECONDS_PER_BEAT: u32 = 500_000;

/// Converts a MIDI note number to a human-readable note name with octave.
///
/// # Examples
///
/// ```
/// use keyfall::midi::note_to_name;
///
/// let name = note_to_name(60); // Middle C
/// assert_eq!(name, "C4");
/// ```
pub fn note_to_name(note: u8) -> String {
    let octave = (note / 12) as i8 - 1; // MIDI octave convention
    let note_index = (note % 12) as usize;
    format!("{}{}", NOTE_NAMES[note_index], octave)
}

/// Returns true for the black keys of a piano keyboard.
#[inline]
pub fn is_black_key(note: u8) -> bool {
    matches!(note % 12, 1 | 3 | 6 | 8 | 10)
}

/// Maps a sustain controller value to the pedal state it selects.
///
/// Returns `None` for the threshold value itself, which does not cross it.
#[inline]
pub fn sustain_transition(value: u8) -> Option<bool> {
    match value.cmp(&SUSTAIN_THRESHOLD) {
        std::cmp::Ordering::Greater => Some(true),
        std::cmp::Ordering::Less => Some(false),
        std::cmp::Ordering::Equal => None,
    }
}
