//! Per-frame projection of the score onto the falling-note display.
//!
//! [`RenderProjector::project`] is a pure function of its inputs: the current
//! piece time, the lookahead window and the scheduler's note snapshots. It
//! keeps no state between frames, so it can run at any (even irregular) frame
//! rate without accumulating error.

use crate::midi::{EventKind, Timeline};
use crate::playback::{ActiveNote, FadingNote, NoteKey};
use std::collections::BTreeSet;

/// One falling rectangle, positioned in seconds relative to the strike line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteRect {
    pub channel: u8,
    pub pitch: u8,
    /// Time until the note reaches the strike line. Negative once struck.
    pub top_offset_seconds: f64,
    /// Sustain-adjusted length of the note.
    pub height_seconds: f64,
    /// 1.0 except while fading out.
    pub opacity: f64,
    /// True while the note is sounding.
    pub highlighted: bool,
    /// Color multiplier: the highlight factor while sounding, else 1.0.
    pub brightness: f64,
}

impl NoteRect {
    /// Maps the rectangle to a vertical span on a surface where notes fall
    /// downward onto `strike_line`.
    ///
    /// Returns `(top, bottom)` in surface units; the bottom edge is the note
    /// onset.
    pub fn screen_span(&self, units_per_second: f64, strike_line: f64) -> (f64, f64) {
        let bottom = strike_line - self.top_offset_seconds * units_per_second;
        let top = bottom - self.height_seconds * units_per_second;
        (top, bottom)
    }
}

/// Everything the rendering surface needs for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderFrame {
    pub elapsed_seconds: f64,
    pub lookahead_seconds: f64,
    /// Sorted by onset, then channel and pitch.
    pub notes: Vec<NoteRect>,
    /// Keys currently sounding.
    pub keyboard: BTreeSet<NoteKey>,
}

#[derive(Debug, Clone)]
pub struct RenderProjector {
    timeline: Timeline,
    fade_duration_seconds: f64,
    highlight_brightness_factor: f64,
}

impl RenderProjector {
    pub fn new(
        timeline: Timeline,
        fade_duration_seconds: f64,
        highlight_brightness_factor: f64,
    ) -> Self {
        Self {
            timeline,
            fade_duration_seconds,
            highlight_brightness_factor,
        }
    }

    /// Projects the notes visible at `elapsed_seconds`.
    ///
    /// Struck notes come from the snapshots: sounding ones are highlighted at
    /// full opacity, released ones decay linearly to transparent over the fade
    /// window and disappear once it has passed. Upcoming notes are every
    /// onset in `[elapsed, elapsed + lookahead]` not yet admitted by the
    /// scheduler.
    pub fn project(
        &self,
        elapsed_seconds: f64,
        lookahead_seconds: f64,
        active: &[ActiveNote],
        fading: &[FadingNote],
    ) -> RenderFrame {
        let mut notes = Vec::with_capacity(active.len() + fading.len());

        for note in active {
            notes.push(NoteRect {
                channel: note.channel,
                pitch: note.pitch,
                top_offset_seconds: note.on_time_seconds - elapsed_seconds,
                height_seconds: note.off_time_seconds - note.on_time_seconds,
                opacity: 1.0,
                highlighted: true,
                brightness: self.highlight_brightness_factor,
            });
        }

        for note in fading {
            let Some(opacity) = self.fade_opacity(note, elapsed_seconds) else {
                continue;
            };
            notes.push(NoteRect {
                channel: note.channel,
                pitch: note.pitch,
                top_offset_seconds: note.on_time_seconds - elapsed_seconds,
                height_seconds: note.off_time_seconds - note.on_time_seconds,
                opacity,
                highlighted: false,
                brightness: 1.0,
            });
        }

        let start = self.timeline.index_of(elapsed_seconds);
        let end = self
            .timeline
            .upper_bound(elapsed_seconds + lookahead_seconds)
            .max(start);
        for event in &self.timeline.events()[start..end] {
            let EventKind::NoteOn {
                pitch,
                resolved_duration_seconds,
                ..
            } = event.kind
            else {
                continue;
            };
            let admitted = active
                .iter()
                .map(|n| (n.channel, n.pitch, n.on_time_seconds))
                .chain(fading.iter().map(|n| (n.channel, n.pitch, n.on_time_seconds)))
                .any(|(channel, p, on)| {
                    channel == event.channel && p == pitch && on == event.time_seconds
                });
            if admitted {
                continue;
            }
            notes.push(NoteRect {
                channel: event.channel,
                pitch,
                top_offset_seconds: event.time_seconds - elapsed_seconds,
                height_seconds: resolved_duration_seconds,
                opacity: 1.0,
                highlighted: false,
                brightness: 1.0,
            });
        }

        notes.sort_by(|a, b| {
            a.top_offset_seconds
                .total_cmp(&b.top_offset_seconds)
                .then(a.channel.cmp(&b.channel))
                .then(a.pitch.cmp(&b.pitch))
        });

        RenderFrame {
            elapsed_seconds,
            lookahead_seconds,
            notes,
            keyboard: active.iter().map(ActiveNote::key).collect(),
        }
    }

    /// Opacity of a fading note, or `None` once its fade has completed.
    fn fade_opacity(&self, note: &FadingNote, elapsed_seconds: f64) -> Option<f64> {
        let progress = (elapsed_seconds - note.fade_start_seconds) / self.fade_duration_seconds;
        if progress >= 1.0 {
            None
        } else {
            Some((1.0 - progress).clamp(0.0, 1.0))
        }
    }
}
