//! The absolute-time event timeline.
//!
//! [`build_timeline`] flattens every track of a [`RawScore`] into one
//! time-sorted sequence of [`TimelineEvent`]s and resolves how long each note
//! really sounds once the sustain pedal is taken into account. The result is
//! immutable and cheap to clone, so the scheduler and the render projector
//! can each hold a copy.

use super::{
    sustain_transition, RawControl, RawNote, RawScore, TempoMap, CHANNEL_COUNT, SUSTAIN_CONTROLLER,
};
use crate::error::{BuildWarning, LoadError};
use std::cmp::Ordering;
use std::sync::Arc;

/// What happens at a timeline instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventKind {
    /// A key is struck. The duration already includes any sustain extension.
    NoteOn {
        pitch: u8,
        /// 1-127.
        velocity: u8,
        resolved_duration_seconds: f64,
        /// Time of the matching `NoteOff`, bit-for-bit.
        resolved_off_seconds: f64,
    },
    /// The effective (sustain-adjusted) end of a note.
    NoteOff { pitch: u8 },
    /// A controller change. Only the sustain pedal reaches the timeline.
    ControlChange { controller: u8, value: u8 },
}

impl EventKind {
    /// Ordering among events sharing a timestamp: releases first, then
    /// controller changes, then strikes.
    fn rank(&self) -> u8 {
        match self {
            EventKind::NoteOff { .. } => 0,
            EventKind::ControlChange { .. } => 1,
            EventKind::NoteOn { .. } => 2,
        }
    }
}

/// A single event at an absolute time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineEvent {
    pub time_seconds: f64,
    /// MIDI channel (0-15).
    pub channel: u8,
    pub kind: EventKind,
}

impl TimelineEvent {
    /// Returns the pitch for note events.
    pub fn pitch(&self) -> Option<u8> {
        match self.kind {
            EventKind::NoteOn { pitch, .. } | EventKind::NoteOff { pitch } => Some(pitch),
            EventKind::ControlChange { .. } => None,
        }
    }

    pub fn is_note_on(&self) -> bool {
        matches!(self.kind, EventKind::NoteOn { .. })
    }
}

/// An immutable, time-sorted event sequence for one score.
#[derive(Debug, Clone)]
pub struct Timeline {
    events: Arc<[TimelineEvent]>,
    total_duration_seconds: f64,
    note_count: usize,
}

impl Timeline {
    /// All events, sorted by `time_seconds` ascending.
    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Time of the last effective note release.
    pub fn total_duration_seconds(&self) -> f64 {
        self.total_duration_seconds
    }

    /// Number of notes (NoteOn events) in the timeline.
    pub fn note_count(&self) -> usize {
        self.note_count
    }

    /// Lowest and highest pitch struck anywhere in the timeline.
    pub fn pitch_range(&self) -> Option<(u8, u8)> {
        self.events
            .iter()
            .filter(|event| event.is_note_on())
            .filter_map(TimelineEvent::pitch)
            .fold(None, |range, pitch| match range {
                None => Some((pitch, pitch)),
                Some((low, high)) => Some((low.min(pitch), high.max(pitch))),
            })
    }
}

/// A note that passed validation, with its effective end once known.
struct ResolvedNote {
    on_seconds: f64,
    raw_off_seconds: f64,
    effective_off_seconds: Option<f64>,
    pitch: u8,
    velocity: u8,
}

#[derive(Debug, Clone, Copy)]
enum DraftKind {
    NoteOn(usize),
    NoteOff(usize),
    Control { value: u8 },
}

impl DraftKind {
    fn rank(&self) -> u8 {
        match self {
            DraftKind::NoteOff(_) => 0,
            DraftKind::Control { .. } => 1,
            DraftKind::NoteOn(_) => 2,
        }
    }
}

/// Event awaiting sustain resolution. `seq` is the parse order.
#[derive(Debug, Clone, Copy)]
struct Draft {
    time_seconds: f64,
    channel: u8,
    seq: usize,
    kind: DraftKind,
}

/// Builds the timeline for a score.
///
/// Notes and sustain events are placed in absolute time through the tempo map,
/// merged, and then walked once to resolve sustain: a release that happens
/// while its channel's pedal is down is deferred until the pedal lifts (or the
/// same key is struck again, or the score ends).
///
/// Malformed notes and controls are dropped and reported as warnings.
///
/// # Errors
///
/// Returns [`LoadError::Empty`] if no track contains a usable note.
pub fn build_timeline(
    score: &RawScore,
    tempo: &TempoMap,
) -> Result<(Timeline, Vec<BuildWarning>), LoadError> {
    let mut warnings = Vec::new();
    let mut notes: Vec<ResolvedNote> = Vec::with_capacity(score.note_count());
    let mut drafts: Vec<Draft> = Vec::with_capacity(score.note_count() * 2);
    let mut usable_tracks = 0usize;

    for (track_idx, track) in score.tracks.iter().enumerate() {
        let before = notes.len();

        for raw in &track.notes {
            let (off_tick, velocity) = match validate_note(raw, track_idx) {
                Ok(valid) => valid,
                Err(warning) => {
                    tracing::warn!("{}", warning);
                    warnings.push(warning);
                    continue;
                }
            };

            let id = notes.len();
            let on_seconds = tempo.to_seconds(raw.on_tick);
            let off_seconds = tempo.to_seconds(off_tick);
            notes.push(ResolvedNote {
                on_seconds,
                raw_off_seconds: off_seconds,
                effective_off_seconds: None,
                pitch: raw.pitch,
                velocity,
            });
            drafts.push(Draft {
                time_seconds: on_seconds,
                channel: raw.channel,
                seq: drafts.len(),
                kind: DraftKind::NoteOn(id),
            });
            drafts.push(Draft {
                time_seconds: off_seconds,
                channel: raw.channel,
                seq: drafts.len(),
                kind: DraftKind::NoteOff(id),
            });
        }

        for control in &track.controls {
            if let Err(warning) = validate_control(control, track_idx) {
                tracing::warn!("{}", warning);
                warnings.push(warning);
                continue;
            }
            if control.controller != SUSTAIN_CONTROLLER {
                continue;
            }
            drafts.push(Draft {
                time_seconds: tempo.to_seconds(control.tick),
                channel: control.channel,
                seq: drafts.len(),
                kind: DraftKind::Control {
                    value: control.value,
                },
            });
        }

        if notes.len() > before {
            usable_tracks += 1;
        }
    }

    if usable_tracks == 0 {
        return Err(LoadError::Empty);
    }

    drafts.sort_by(|a, b| {
        a.time_seconds
            .total_cmp(&b.time_seconds)
            .then(a.kind.rank().cmp(&b.kind.rank()))
            .then(a.seq.cmp(&b.seq))
    });

    let total_duration_seconds = resolve_sustain(&drafts, &mut notes);

    let mut events: Vec<TimelineEvent> = drafts
        .iter()
        .map(|draft| {
            let kind = match draft.kind {
                DraftKind::NoteOn(id) => {
                    let note = &notes[id];
                    let off = note.effective_off_seconds.unwrap_or(note.raw_off_seconds);
                    EventKind::NoteOn {
                        pitch: note.pitch,
                        velocity: note.velocity,
                        resolved_duration_seconds: (off - note.on_seconds).max(0.0),
                        resolved_off_seconds: off,
                    }
                }
                DraftKind::NoteOff(id) => EventKind::NoteOff {
                    pitch: notes[id].pitch,
                },
                DraftKind::Control { value } => EventKind::ControlChange {
                    controller: SUSTAIN_CONTROLLER,
                    value,
                },
            };
            let time_seconds = match draft.kind {
                DraftKind::NoteOff(id) => notes[id]
                    .effective_off_seconds
                    .unwrap_or(notes[id].raw_off_seconds),
                _ => draft.time_seconds,
            };
            TimelineEvent {
                time_seconds,
                channel: draft.channel,
                kind,
            }
        })
        .collect();

    // Releases moved to their effective time; restore order. Stable, so the
    // previous order (which carried the parse-order tie-break) is kept.
    events.sort_by(compare_events);

    tracing::info!(
        "Built timeline: {} notes, {} events, {:.2}s",
        notes.len(),
        events.len(),
        total_duration_seconds
    );

    Ok((
        Timeline {
            events: events.into(),
            total_duration_seconds,
            note_count: notes.len(),
        },
        warnings,
    ))
}

/// Timeline order: time, then the same-instant rank.
fn compare_events(a: &TimelineEvent, b: &TimelineEvent) -> Ordering {
    a.time_seconds
        .total_cmp(&b.time_seconds)
        .then(a.kind.rank().cmp(&b.kind.rank()))
}

/// Walks the merged drafts once, assigning each note its effective end.
///
/// Returns the total duration: the latest effective release, floored at 0.
fn resolve_sustain(drafts: &[Draft], notes: &mut [ResolvedNote]) -> f64 {
    let mut sustain = [false; CHANNEL_COUNT];
    let mut pending: [Vec<usize>; CHANNEL_COUNT] = std::array::from_fn(|_| Vec::new());

    for draft in drafts {
        let ch = draft.channel as usize;
        match draft.kind {
            DraftKind::NoteOn(id) => {
                // Striking a key that is only ringing through the pedal ends the old note
                let pitch = notes[id].pitch;
                if let Some(pos) = pending[ch].iter().position(|&p| notes[p].pitch == pitch) {
                    let restruck = pending[ch].remove(pos);
                    notes[restruck].effective_off_seconds = Some(draft.time_seconds);
                }
            }
            DraftKind::NoteOff(id) => {
                if sustain[ch] {
                    pending[ch].push(id);
                } else {
                    notes[id].effective_off_seconds = Some(draft.time_seconds);
                }
            }
            DraftKind::Control { value } => {
                let Some(engaged) = sustain_transition(value) else {
                    continue;
                };
                if sustain[ch] && !engaged {
                    for id in pending[ch].drain(..) {
                        notes[id].effective_off_seconds = Some(draft.time_seconds);
                    }
                }
                sustain[ch] = engaged;
            }
        }
    }

    let finalized_end = notes
        .iter()
        .filter_map(|n| n.effective_off_seconds)
        .fold(0.0f64, f64::max);
    let pending_end = pending
        .iter()
        .flatten()
        .map(|&id| notes[id].raw_off_seconds)
        .fold(0.0f64, f64::max);
    let total = finalized_end.max(pending_end).max(0.0);

    // Still held by the pedal at the end of the score
    for id in pending.iter().flatten() {
        notes[*id].effective_off_seconds = Some(total);
    }

    total
}

/// Checks a raw note, returning its closing tick and MIDI velocity.
fn validate_note(raw: &RawNote, track: usize) -> Result<(u64, u8), BuildWarning> {
    let malformed = |reason| BuildWarning::MalformedNote {
        track,
        tick: raw.on_tick,
        reason,
    };

    let Some(off_tick) = raw.off_tick else {
        return Err(BuildWarning::UnclosedNote {
            track,
            tick: raw.on_tick,
            pitch: raw.pitch,
        });
    };
    if raw.pitch > 127 {
        return Err(malformed("pitch out of range"));
    }
    if raw.channel as usize >= CHANNEL_COUNT {
        return Err(malformed("channel out of range"));
    }
    if !raw.velocity.is_finite() || !(0.0..=1.0).contains(&raw.velocity) {
        return Err(malformed("velocity out of range"));
    }
    if off_tick < raw.on_tick {
        return Err(malformed("note ends before it starts"));
    }

    let velocity = ((raw.velocity * 127.0).round() as u8).clamp(1, 127);
    Ok((off_tick, velocity))
}

fn validate_control(control: &RawControl, track: usize) -> Result<(), BuildWarning> {
    let malformed = |reason| BuildWarning::MalformedControl {
        track,
        tick: control.tick,
        reason,
    };
    if control.controller > 127 {
        return Err(malformed("controller out of range"));
    }
    if control.value > 127 {
        return Err(malformed("value out of range"));
    }
    if control.channel as usize >= CHANNEL_COUNT {
        return Err(malformed("channel out of range"));
    }
    Ok(())
}
