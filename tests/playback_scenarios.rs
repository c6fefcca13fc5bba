//! End-to-end playback behaviour through the public API.

use keyfall::config::Settings;
use keyfall::midi::{
    build_timeline, EventKind, RawControl, RawNote, RawScore, RawTempoChange, RawTrack, TempoMap,
};
use keyfall::playback::{ManualClock, Scheduler, SchedulerState, Session, SynthSink};
use keyfall::projector::RenderProjector;
use keyfall::Timeline;

/// Records every call it receives.
#[derive(Debug, Default)]
struct Recorder {
    triggers: Vec<(u8, u8, u8)>,
    releases: Vec<(u8, u8)>,
    release_alls: usize,
}

impl SynthSink for Recorder {
    fn trigger(&mut self, pitch: u8, channel: u8, velocity: u8) {
        self.triggers.push((pitch, channel, velocity));
    }

    fn release(&mut self, pitch: u8, channel: u8) {
        self.releases.push((pitch, channel));
    }

    fn release_all(&mut self) {
        self.release_alls += 1;
    }
}

/// Scores use 480 ticks per beat at the default 120 BPM: 960 ticks per second.
fn score(notes: Vec<RawNote>, controls: Vec<RawControl>) -> RawScore {
    let mut score = RawScore::new("Scenario", 480);
    let mut track = RawTrack::new("Piano");
    track.notes = notes;
    track.controls = controls;
    score.tracks.push(track);
    score
}

fn timeline(score: &RawScore) -> Timeline {
    let (tempo, _) = TempoMap::build(score.ticks_per_beat, &score.tempo_changes);
    build_timeline(score, &tempo).unwrap().0
}

/// One note on pitch 60 from 0s to 1s.
fn single_note() -> Timeline {
    timeline(&score(vec![RawNote::new(60, 0.5, 0, 0, 960)], vec![]))
}

#[test]
fn struck_note_is_highlighted_at_strike_line() {
    let timeline = single_note();
    let mut synth = Recorder::default();
    let mut scheduler = Scheduler::new(timeline.clone(), 0.1);
    scheduler.play(&mut synth);
    scheduler.advance_to(0.5, &mut synth);

    let snapshot = scheduler.snapshot();
    let frame = RenderProjector::new(timeline, 0.1, 1.3).project(
        0.5,
        4.0,
        &snapshot.active,
        &snapshot.fading,
    );

    assert_eq!(frame.notes.len(), 1);
    let rect = frame.notes[0];
    assert_eq!(rect.pitch, 60);
    assert_eq!(rect.top_offset_seconds, -0.5);
    assert!(rect.highlighted);
    assert_eq!(rect.opacity, 1.0);
    assert_eq!(synth.triggers, vec![(60, 0, 64)]);
}

#[test]
fn seek_past_end_leaves_nothing_sounding() {
    let mut synth = Recorder::default();
    let mut scheduler = Scheduler::new(single_note(), 0.1);
    scheduler.play(&mut synth);
    scheduler.seek_to(2.0, &mut synth);
    scheduler.advance_to(2.0, &mut synth);

    let snapshot = scheduler.snapshot();
    assert!(snapshot.active.is_empty());
    assert!(snapshot.fading.is_empty());
    assert!(synth.triggers.is_empty());
}

#[test]
fn seek_is_idempotent() {
    let timeline = timeline(&score(
        vec![
            RawNote::new(60, 0.5, 0, 0, 960),
            RawNote::new(62, 0.5, 0, 960, 1920),
            RawNote::new(64, 0.5, 0, 1920, 2880),
        ],
        vec![],
    ));
    let mut synth = Recorder::default();
    let mut scheduler = Scheduler::new(timeline, 0.1);
    scheduler.play(&mut synth);
    scheduler.advance_to(0.5, &mut synth);

    scheduler.seek_to(1.5, &mut synth);
    let once = (scheduler.cursor(), scheduler.snapshot(), scheduler.state());
    let triggers = synth.triggers.len();

    scheduler.seek_to(1.5, &mut synth);
    let twice = (scheduler.cursor(), scheduler.snapshot(), scheduler.state());

    assert_eq!(once, twice);
    assert_eq!(synth.triggers.len(), triggers);
}

#[test]
fn seek_readmits_only_after_advance() {
    let timeline = timeline(&score(
        vec![
            RawNote::new(60, 0.5, 0, 0, 960),
            RawNote::new(62, 0.5, 0, 960, 1920),
        ],
        vec![],
    ));
    let mut synth = Recorder::default();
    let mut scheduler = Scheduler::new(timeline, 0.1);
    scheduler.play(&mut synth);
    scheduler.advance_to(0.5, &mut synth);
    assert_eq!(scheduler.snapshot().active.len(), 1);

    scheduler.seek_to(1.0, &mut synth);
    assert!(scheduler.snapshot().active.is_empty());

    scheduler.advance_to(1.0, &mut synth);
    let active = scheduler.snapshot().active;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].pitch, 62);
}

#[test]
fn fade_ends_exactly_at_duration() {
    let mut synth = Recorder::default();
    let mut scheduler = Scheduler::new(single_note(), 0.25);
    scheduler.play(&mut synth);
    scheduler.advance_to(1.0, &mut synth);
    assert_eq!(scheduler.snapshot().fading.len(), 1);
    assert_eq!(synth.releases, vec![(60, 0)]);

    scheduler.advance_to(1.125, &mut synth);
    assert_eq!(scheduler.snapshot().fading.len(), 1);

    scheduler.advance_to(1.25, &mut synth);
    assert!(scheduler.snapshot().fading.is_empty());
}

#[test]
fn timeline_is_monotonic() {
    let timeline = timeline(&score(
        vec![
            RawNote::new(72, 0.9, 1, 1500, 1700),
            RawNote::new(60, 0.5, 0, 0, 2000),
            RawNote::new(64, 0.5, 0, 100, 300),
            RawNote::new(67, 0.5, 2, 100, 100),
        ],
        vec![
            RawControl {
                tick: 50,
                controller: 64,
                value: 127,
                channel: 0,
            },
            RawControl {
                tick: 1000,
                controller: 64,
                value: 0,
                channel: 0,
            },
        ],
    ));
    assert!(timeline
        .events()
        .windows(2)
        .all(|pair| pair[0].time_seconds <= pair[1].time_seconds));
}

#[test]
fn quarter_note_at_120_bpm_is_half_a_second() {
    let change = RawTempoChange {
        tick: 0,
        microseconds_per_beat: 500_000,
    };
    let (tempo, _) = TempoMap::build(480, &[change]);
    assert_eq!(tempo.to_seconds(480), 0.5);
}

#[test]
fn sustain_extends_release_to_pedal_up() {
    // Note 0-0.2s, pedal down 0-1.0s
    let timeline = timeline(&score(
        vec![RawNote::new(60, 0.5, 0, 0, 192)],
        vec![
            RawControl {
                tick: 0,
                controller: 64,
                value: 127,
                channel: 0,
            },
            RawControl {
                tick: 960,
                controller: 64,
                value: 0,
                channel: 0,
            },
        ],
    ));

    let mut note_on = None;
    let mut note_off = None;
    for event in timeline.events() {
        match event.kind {
            EventKind::NoteOn {
                resolved_duration_seconds,
                ..
            } => note_on = Some(resolved_duration_seconds),
            EventKind::NoteOff { .. } => note_off = Some(event.time_seconds),
            EventKind::ControlChange { .. } => {}
        }
    }
    assert_eq!(note_on, Some(1.0));
    assert_eq!(note_off, Some(1.0));
    assert_eq!(timeline.total_duration_seconds(), 1.0);
}

#[test]
fn session_follows_the_hardware_clock() {
    let score = score(
        vec![
            RawNote::new(60, 0.5, 0, 0, 960),
            RawNote::new(67, 0.5, 0, 1920, 2880),
        ],
        vec![],
    );
    let hw = ManualClock::new();
    let (mut session, warnings) =
        Session::load(&score, Recorder::default(), hw.clone(), &Settings::default()).unwrap();
    assert!(warnings.is_empty());

    session.play().unwrap();
    hw.advance(0.5);
    let frame = session.tick().unwrap();
    assert_eq!(frame.elapsed_seconds, 0.5);
    assert_eq!(frame.keyboard.len(), 1);
    // The second note is inside the lookahead window
    assert_eq!(frame.notes.len(), 2);
    assert_eq!(frame.notes[1].top_offset_seconds, 1.5);

    // Seeking while playing keeps playing from the new position
    session.seek_to(2.0).unwrap();
    hw.advance(0.25);
    let frame = session.tick().unwrap();
    assert_eq!(frame.elapsed_seconds, 2.25);
    assert_eq!(session.state(), SchedulerState::Playing);
    assert_eq!(session.synth().triggers.last(), Some(&(67, 0, 64)));

    session.stop().unwrap();
    assert_eq!(session.state(), SchedulerState::Idle);
    assert_eq!(session.elapsed_seconds().unwrap(), 0.0);
}
