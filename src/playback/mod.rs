//! Runtime playback: the clock, the scheduler, and the session tying them
//! together.
//!
//! Everything here runs on one thread, driven by a periodic tick from the
//! caller. No call blocks.

pub mod clock;
pub mod scheduler;
pub mod session;

pub use clock::{HardwareClock, ManualClock, PlaybackClock};
pub use scheduler::{
    ActiveNote, FadingNote, NoteKey, PlaybackSnapshot, Scheduler, SchedulerState, SynthSink,
};
pub use session::Session;
