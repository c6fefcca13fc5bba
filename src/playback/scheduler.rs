//! Drives the synthesizer from the timeline.
//!
//! The scheduler keeps a cursor into the timeline and, each time it is told
//! the current piece time, drains every event that has come due. It owns the
//! set of sounding notes and the short-lived set of fading notes; everything
//! else only ever sees copies of them.

use crate::midi::{sustain_transition, EventKind, Timeline, CHANNEL_COUNT, SUSTAIN_CONTROLLER};
use std::collections::BTreeMap;

/// Downstream synthesizer interface. Calls are fire-and-forget.
pub trait SynthSink {
    /// Starts a note.
    fn trigger(&mut self, pitch: u8, channel: u8, velocity: u8);

    /// Releases a note, letting the instrument's own release play out.
    fn release(&mut self, pitch: u8, channel: u8);

    /// Silences every sounding note at once.
    fn release_all(&mut self);

    /// Selects the instrument for a channel.
    fn set_program(&mut self, _channel: u8, _program: u8) {}
}

/// Identifies a sounding key: one entry per (channel, pitch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NoteKey {
    pub channel: u8,
    pub pitch: u8,
}

/// A note that is currently sounding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveNote {
    pub pitch: u8,
    pub channel: u8,
    pub on_time_seconds: f64,
    /// Sustain-adjusted end of the note.
    pub off_time_seconds: f64,
    pub velocity: u8,
}

impl ActiveNote {
    pub fn key(&self) -> NoteKey {
        NoteKey {
            channel: self.channel,
            pitch: self.pitch,
        }
    }
}

/// A released note, kept only for its visual fade-out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadingNote {
    pub pitch: u8,
    pub channel: u8,
    pub fade_start_seconds: f64,
    /// Onset and end of the note that is fading, so the projector can place it.
    pub on_time_seconds: f64,
    pub off_time_seconds: f64,
}

impl FadingNote {
    pub fn key(&self) -> NoteKey {
        NoteKey {
            channel: self.channel,
            pitch: self.pitch,
        }
    }
}

/// Copies of the scheduler's note sets, handed to the projector each frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackSnapshot {
    /// Sorted by (channel, pitch).
    pub active: Vec<ActiveNote>,
    /// In release order.
    pub fading: Vec<FadingNote>,
}

/// Represents the current scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    /// No playback in progress; cursor at the start.
    #[default]
    Idle,
    Playing,
    Paused,
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    timeline: Timeline,
    /// Index of the next event to apply.
    cursor: usize,
    state: SchedulerState,
    active: BTreeMap<NoteKey, ActiveNote>,
    fading: Vec<FadingNote>,
    sustain: [bool; CHANNEL_COUNT],
    fade_duration_seconds: f64,
}

impl Scheduler {
    /// Creates an idle scheduler positioned at the start of `timeline`.
    pub fn new(timeline: Timeline, fade_duration_seconds: f64) -> Self {
        Self {
            timeline,
            cursor: 0,
            state: SchedulerState::Idle,
            active: BTreeMap::new(),
            fading: Vec::new(),
            sustain: [false; CHANNEL_COUNT],
            fade_duration_seconds,
        }
    }

    /// Applies every event due at or before `elapsed_seconds`, in order.
    ///
    /// Does nothing unless playing. Chords (events sharing a timestamp) are
    /// always applied within the same call.
    pub fn advance_to<S: SynthSink>(&mut self, elapsed_seconds: f64, synth: &mut S) {
        if self.state != SchedulerState::Playing {
            return;
        }

        let timeline = self.timeline.clone();
        while let Some(event) = timeline.events().get(self.cursor) {
            if event.time_seconds > elapsed_seconds {
                break;
            }
            self.cursor += 1;

            match event.kind {
                EventKind::NoteOn {
                    pitch,
                    velocity,
                    resolved_off_seconds,
                    ..
                } => {
                    let note = ActiveNote {
                        pitch,
                        channel: event.channel,
                        on_time_seconds: event.time_seconds,
                        off_time_seconds: resolved_off_seconds,
                        velocity,
                    };
                    // A re-struck key releases the note it replaces
                    self.finish(note.key(), elapsed_seconds, synth);
                    synth.trigger(pitch, event.channel, velocity);
                    self.active.insert(note.key(), note);
                }
                EventKind::NoteOff { pitch } => {
                    let key = NoteKey {
                        channel: event.channel,
                        pitch,
                    };
                    let expired = self
                        .active
                        .get(&key)
                        .is_some_and(|note| note.off_time_seconds <= event.time_seconds);
                    if expired {
                        self.finish(key, elapsed_seconds, synth);
                    }
                }
                EventKind::ControlChange { controller, value } => {
                    if controller == SUSTAIN_CONTROLLER {
                        if let Some(engaged) = sustain_transition(value) {
                            self.sustain[event.channel as usize] = engaged;
                        }
                    }
                }
            }
        }

        // Notes whose end has passed without a matching release event
        let overdue: Vec<NoteKey> = self
            .active
            .values()
            .filter(|note| note.off_time_seconds <= elapsed_seconds)
            .map(ActiveNote::key)
            .collect();
        for key in overdue {
            self.finish(key, elapsed_seconds, synth);
        }

        let fade = self.fade_duration_seconds;
        self.fading
            .retain(|note| elapsed_seconds - note.fade_start_seconds < fade);
    }

    /// Releases a sounding note and starts its fade.
    fn finish<S: SynthSink>(&mut self, key: NoteKey, elapsed_seconds: f64, synth: &mut S) {
        if let Some(note) = self.active.remove(&key) {
            synth.release(note.pitch, note.channel);
            self.fading.push(FadingNote {
                pitch: note.pitch,
                channel: note.channel,
                fade_start_seconds: elapsed_seconds,
                on_time_seconds: note.on_time_seconds,
                off_time_seconds: note.off_time_seconds,
            });
        }
    }

    /// Jumps to `target_seconds`.
    ///
    /// Every sounding note is cut immediately (no fade, this is a
    /// discontinuity), pedal state is reset, and the cursor is placed on the
    /// first event at or after the target. The run state is unchanged.
    pub fn seek_to<S: SynthSink>(&mut self, target_seconds: f64, synth: &mut S) {
        synth.release_all();
        self.active.clear();
        self.fading.clear();
        self.sustain = [false; CHANNEL_COUNT];
        self.cursor = self.timeline.index_of(target_seconds);
        tracing::debug!(
            "Scheduler seek to {:.3}s (cursor {})",
            target_seconds,
            self.cursor
        );
    }

    /// Starts or resumes applying events.
    ///
    /// Resuming from a pause strikes the held notes again, since their
    /// voices were cut when pausing.
    pub fn play<S: SynthSink>(&mut self, synth: &mut S) {
        if self.state == SchedulerState::Paused {
            for note in self.active.values() {
                synth.trigger(note.pitch, note.channel, note.velocity);
            }
        }
        self.state = SchedulerState::Playing;
    }

    /// Stops applying events and silences the synthesizer.
    ///
    /// The active set is kept so a paused display still shows what was
    /// sounding; [`Scheduler::play`] brings those voices back.
    pub fn pause<S: SynthSink>(&mut self, synth: &mut S) {
        if self.state == SchedulerState::Playing {
            synth.release_all();
            self.state = SchedulerState::Paused;
        }
    }

    /// Cancels playback: silences everything and returns to the start.
    pub fn stop<S: SynthSink>(&mut self, synth: &mut S) {
        self.seek_to(0.0, synth);
        self.state = SchedulerState::Idle;
    }

    /// Returns copies of the active and fading note sets.
    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            active: self.active.values().copied().collect(),
            fading: self.fading.clone(),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Whether the sustain pedal is down on `channel`.
    pub fn sustain(&self, channel: u8) -> bool {
        self.sustain
            .get(channel as usize)
            .copied()
            .unwrap_or(false)
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }
}

/// A synth that records calls, for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingSynth {
    pub calls: Vec<SynthCall>,
}

#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SynthCall {
    Trigger(u8, u8, u8),
    Release(u8, u8),
    ReleaseAll,
}

#[cfg(test)]
impl SynthSink for RecordingSynth {
    fn trigger(&mut self, pitch: u8, channel: u8, velocity: u8) {
        self.calls.push(SynthCall::Trigger(pitch, channel, velocity));
    }

    fn release(&mut self, pitch: u8, channel: u8) {
        self.calls.push(SynthCall::Release(pitch, channel));
    }

    fn release_all(&mut self) {
        self.calls.push(SynthCall::ReleaseAll);
    }
}
