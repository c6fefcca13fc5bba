//! Standard MIDI File (SMF) import.
//!
//! Reads .mid and .midi files into a [`RawScore`]. Supports SMF Format 0
//! (single track) and Format 1 (multi-track) files with metrical timing.
//!
//! # Limitations
//!
//! - Note on/off, control changes and the first program change per channel
//!   are imported; pitch bend, aftertouch and SysEx are ignored
//! - Tempo changes are collected from every track
//! - SMPTE timecode timing and Format 2 files are rejected

use super::{ProgramAssignment, RawControl, RawNote, RawScore, RawTempoChange, RawTrack};
use crate::error::LoadError;
use midly::{Format, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Notes struck but not yet released, keyed by (channel, pitch).
/// Value is the index into the track's note list.
type OpenNotes = HashMap<(u8, u8), usize>;

/// Imports a MIDI file from disk.
///
/// # Arguments
///
/// * `path` - Path to the .mid or .midi file
///
/// # Errors
///
/// Returns error if the file cannot be read or parsed, or uses an
/// unsupported format
pub fn import_from_midi<P: AsRef<Path>>(path: P) -> Result<RawScore, LoadError> {
    let path = path.as_ref();
    let data = fs::read(path)?;

    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Imported MIDI");

    let score = parse_midi(&data, name)?;
    tracing::info!(
        "Imported {:?}: {} track(s), {} note(s), {} tempo change(s)",
        path,
        score.tracks.len(),
        score.note_count(),
        score.tempo_changes.len()
    );
    Ok(score)
}

/// Parses MIDI file bytes into a score.
pub fn parse_midi(data: &[u8], name: &str) -> Result<RawScore, LoadError> {
    let smf = Smf::parse(data).map_err(|e| LoadError::Parse(e.to_string()))?;

    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(tpb) => tpb.as_int(),
        Timing::Timecode(_, _) => {
            return Err(LoadError::Unsupported(
                "SMPTE timecode timing not supported".to_string(),
            ))
        }
    };
    if ticks_per_beat == 0 {
        return Err(LoadError::Parse("header declares 0 ticks per beat".into()));
    }

    if smf.header.format == Format::Sequential {
        return Err(LoadError::Unsupported(
            "Format 2 (sequential) MIDI files not supported".to_string(),
        ));
    }

    let mut score = RawScore::new(name, ticks_per_beat);
    for (track_idx, events) in smf.tracks.iter().enumerate() {
        let track = parse_track(events, track_idx, &mut score);
        // Format 1 conductor tracks carry only tempo/meta events
        if !track.notes.is_empty() || !track.controls.is_empty() {
            score.tracks.push(track);
        }
    }

    Ok(score)
}

/// Parses a single MIDI track. Tempo changes and program assignments are
/// global and go straight into `score`.
fn parse_track(events: &[midly::TrackEvent], track_idx: usize, score: &mut RawScore) -> RawTrack {
    let mut track = RawTrack::new(format!("Track {}", track_idx + 1));
    let mut open: OpenNotes = HashMap::new();
    let mut current_tick: u64 = 0;

    for event in events {
        current_tick += event.delta.as_int() as u64;

        match event.kind {
            TrackEventKind::Meta(meta) => match meta {
                MetaMessage::TrackName(name_bytes) => {
                    if let Ok(name) = std::str::from_utf8(name_bytes) {
                        let name = name.trim();
                        if !name.is_empty() {
                            track.name = name.to_string();
                        }
                    }
                }
                MetaMessage::Tempo(tempo) => {
                    score.tempo_changes.push(RawTempoChange {
                        tick: current_tick,
                        microseconds_per_beat: tempo.as_int(),
                    });
                }
                _ => {}
            },
            TrackEventKind::Midi { channel, message } => {
                let ch = channel.as_int();
                match message {
                    MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                        let pitch = key.as_int();
                        // Re-striking a held key closes the earlier note
                        close_note(&mut track, &mut open, ch, pitch, current_tick);
                        open.insert((ch, pitch), track.notes.len());
                        track.notes.push(RawNote {
                            on_tick: current_tick,
                            off_tick: None,
                            pitch,
                            velocity: vel.as_int() as f32 / 127.0,
                            channel: ch,
                        });
                    }
                    // Note on with velocity 0 = note off
                    MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                        close_note(&mut track, &mut open, ch, key.as_int(), current_tick);
                    }
                    MidiMessage::Controller { controller, value } => {
                        track.controls.push(RawControl {
                            tick: current_tick,
                            controller: controller.as_int(),
                            value: value.as_int(),
                            channel: ch,
                        });
                    }
                    MidiMessage::ProgramChange { program } => {
                        if !score.programs.iter().any(|p| p.channel == ch) {
                            score.programs.push(ProgramAssignment {
                                channel: ch,
                                program: program.as_int(),
                            });
                        }
                    }
                    _ => {} // Ignore other MIDI messages
                }
            }
            _ => {} // Ignore SysEx and escapes
        }
    }

    // Anything still open stays unclosed; the timeline builder reports it
    if !open.is_empty() {
        tracing::debug!(
            "Track {} ended with {} unclosed note(s)",
            track_idx + 1,
            open.len()
        );
    }

    track
}

/// Closes the open note for (channel, pitch), if any.
/// Zero-length notes are stretched to one tick.
fn close_note(track: &mut RawTrack, open: &mut OpenNotes, channel: u8, pitch: u8, tick: u64) {
    if let Some(idx) = open.remove(&(channel, pitch)) {
        let note = &mut track.notes[idx];
        note.off_tick = Some(tick.max(note.on_tick + 1));
    }
}
