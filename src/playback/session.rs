//! A playback session for one loaded score.
//!
//! The session owns the immutable timeline and every runtime component built
//! on it. There is no global playback state: whoever holds the session drives
//! it by calling [`Session::tick`] once per frame.

use super::{HardwareClock, PlaybackClock, PlaybackSnapshot, Scheduler, SchedulerState, SynthSink};
use crate::config::Settings;
use crate::error::{BuildWarning, PlaybackError, SessionError};
use crate::midi::{build_timeline, RawScore, TempoMap, Timeline};
use crate::projector::{RenderFrame, RenderProjector};

pub struct Session<S, C> {
    name: String,
    tempo: TempoMap,
    timeline: Timeline,
    scheduler: Scheduler,
    projector: RenderProjector,
    clock: PlaybackClock<C>,
    synth: S,
    settings: Settings,
}

impl<S: SynthSink, C: HardwareClock> Session<S, C> {
    /// Builds a session for `score`.
    ///
    /// Returns the session together with every warning raised while building
    /// the timeline. The session starts idle at 0.
    ///
    /// # Errors
    ///
    /// Returns error if the score has no usable notes or the hardware clock
    /// cannot be read
    pub fn load(
        score: &RawScore,
        mut synth: S,
        hardware: C,
        settings: &Settings,
    ) -> Result<(Self, Vec<BuildWarning>), SessionError> {
        let (tempo, mut warnings) = TempoMap::build(score.ticks_per_beat, &score.tempo_changes);
        let (timeline, timeline_warnings) = build_timeline(score, &tempo)?;
        warnings.extend(timeline_warnings);

        let clock = PlaybackClock::new(hardware)?;

        for assignment in &score.programs {
            synth.set_program(assignment.channel, assignment.program);
        }

        let settings = settings.clone().validated();
        let scheduler = Scheduler::new(timeline.clone(), settings.fade_duration_seconds);
        let projector = RenderProjector::new(
            timeline.clone(),
            settings.fade_duration_seconds,
            settings.highlight_brightness_factor,
        );

        tracing::info!(
            "Loaded session {:?}: {:.2}s, {} warning(s)",
            score.name,
            timeline.total_duration_seconds(),
            warnings.len()
        );

        Ok((
            Self {
                name: score.name.clone(),
                tempo,
                timeline,
                scheduler,
                projector,
                clock,
                synth,
                settings,
            },
            warnings,
        ))
    }

    /// Starts or resumes playback. Playing past the end restarts from 0.
    pub fn play(&mut self) -> Result<(), PlaybackError> {
        if self.scheduler.state() == SchedulerState::Playing {
            return Ok(());
        }
        let mut from = self.clock.elapsed_seconds()?;
        if from >= self.end_seconds() {
            from = self.seek_to(0.0)?;
        }
        self.clock.start(from)?;
        self.scheduler.play(&mut self.synth);
        tracing::debug!("Playing from {:.3}s", from);
        Ok(())
    }

    /// Pauses playback, silencing sounding notes.
    pub fn pause(&mut self) -> Result<(), PlaybackError> {
        self.scheduler.pause(&mut self.synth);
        self.clock.pause()
    }

    /// Toggles between playing and paused.
    pub fn toggle(&mut self) -> Result<(), PlaybackError> {
        if self.is_playing() {
            self.pause()
        } else {
            self.play()
        }
    }

    /// Jumps to `target_seconds`, clamped to `[0, total duration]`.
    ///
    /// Sounding notes are cut, and the run state is kept. Returns the
    /// position actually used.
    pub fn seek_to(&mut self, target_seconds: f64) -> Result<f64, PlaybackError> {
        let total = self.timeline.total_duration_seconds();
        let target = if target_seconds.is_nan() {
            0.0
        } else {
            target_seconds.clamp(0.0, total)
        };
        self.scheduler.seek_to(target, &mut self.synth);
        self.clock.seek(target)?;
        tracing::info!("Seek to {:.3}s", target);
        Ok(target)
    }

    /// Jumps relative to the current position.
    pub fn seek_by(&mut self, delta_seconds: f64) -> Result<f64, PlaybackError> {
        let now = self.clock.elapsed_seconds()?;
        self.seek_to(now + delta_seconds)
    }

    /// Cancels playback and returns to the start.
    pub fn stop(&mut self) -> Result<(), PlaybackError> {
        self.scheduler.stop(&mut self.synth);
        self.clock.pause()?;
        self.clock.seek(0.0)
    }

    /// Advances the scheduler to the clock's current time and projects the
    /// frame to draw.
    ///
    /// Playback pauses on its own once the end (plus padding) is reached.
    ///
    /// # Errors
    ///
    /// If the clock has become unavailable, playback is stopped and the
    /// error is returned; the session does not continue out of sync.
    pub fn tick(&mut self) -> Result<RenderFrame, PlaybackError> {
        let elapsed = match self.clock.elapsed_seconds() {
            Ok(elapsed) => elapsed,
            Err(e) => {
                tracing::error!("Stopping playback: {}", e);
                self.scheduler.stop(&mut self.synth);
                // The clock is already known to be gone; this only halts it
                let _ = self.clock.pause();
                return Err(e);
            }
        };

        self.scheduler.advance_to(elapsed, &mut self.synth);

        if self.is_playing() && elapsed >= self.end_seconds() {
            tracing::info!("Reached end of {:?}", self.name);
            self.pause()?;
        }

        let snapshot = self.scheduler.snapshot();
        Ok(self.projector.project(
            elapsed,
            self.settings.lookahead_seconds,
            &snapshot.active,
            &snapshot.fading,
        ))
    }

    /// Where playback auto-pauses.
    fn end_seconds(&self) -> f64 {
        self.timeline.total_duration_seconds() + self.settings.end_padding_seconds
    }

    pub fn elapsed_seconds(&self) -> Result<f64, PlaybackError> {
        self.clock.elapsed_seconds()
    }

    pub fn is_playing(&self) -> bool {
        self.scheduler.state() == SchedulerState::Playing
    }

    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.scheduler.snapshot()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn tempo_map(&self) -> &TempoMap {
        &self.tempo
    }

    pub fn total_duration_seconds(&self) -> f64 {
        self.timeline.total_duration_seconds()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn synth(&self) -> &S {
        &self.synth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadError;
    use crate::midi::{ProgramAssignment, RawNote, RawTrack};
    use crate::playback::scheduler::{RecordingSynth, SynthCall};
    use crate::playback::ManualClock;

    fn score() -> RawScore {
        let mut score = RawScore::new("Test", 480);
        let mut track = RawTrack::new("Piano");
        // 0-1s and 2-3s at 120 BPM
        track.notes.push(RawNote::new(60, 0.5, 0, 0, 960));
        track.notes.push(RawNote::new(64, 0.5, 0, 1920, 2880));
        score.tracks.push(track);
        score
    }

    fn session(hw: &ManualClock) -> Session<RecordingSynth, ManualClock> {
        Session::load(&score(), RecordingSynth::default(), hw.clone(), &Settings::default())
            .unwrap()
            .0
    }

    #[test]
    fn test_play_tick_pause() {
        let hw = ManualClock::new();
        let mut session = session(&hw);
        assert_eq!(session.state(), SchedulerState::Idle);

        session.play().unwrap();
        hw.advance(0.5);
        let frame = session.tick().unwrap();
        assert_eq!(frame.elapsed_seconds, 0.5);
        assert_eq!(frame.keyboard.len(), 1);

        session.pause().unwrap();
        hw.advance(10.0);
        assert_eq!(session.elapsed_seconds().unwrap(), 0.5);
        assert_eq!(session.synth().calls.last(), Some(&SynthCall::ReleaseAll));
    }

    #[test]
    fn test_resume_after_pause_sounds_held_note() {
        let hw = ManualClock::new();
        let mut session = session(&hw);
        session.play().unwrap();
        hw.advance(0.5);
        session.tick().unwrap();

        session.pause().unwrap();
        session.play().unwrap();
        hw.advance(0.25);
        let frame = session.tick().unwrap();

        assert_eq!(
            session.synth().calls,
            vec![
                SynthCall::Trigger(60, 0, 64),
                SynthCall::ReleaseAll,
                SynthCall::Trigger(60, 0, 64),
            ]
        );
        assert_eq!(frame.elapsed_seconds, 0.75);
        assert_eq!(frame.keyboard.len(), 1);
        assert!(frame.notes[0].highlighted);
    }

    #[test]
    fn test_seek_is_clamped() {
        let hw = ManualClock::new();
        let mut session = session(&hw);
        assert_eq!(session.seek_to(99.0).unwrap(), 3.0);
        assert_eq!(session.seek_to(-4.0).unwrap(), 0.0);
        assert_eq!(session.seek_by(1.25).unwrap(), 1.25);
        assert_eq!(session.elapsed_seconds().unwrap(), 1.25);
    }

    #[test]
    fn test_auto_pause_at_end_and_replay() {
        let hw = ManualClock::new();
        let mut session = session(&hw);
        session.play().unwrap();
        hw.advance(5.0);
        session.tick().unwrap();
        assert_eq!(session.state(), SchedulerState::Paused);

        session.play().unwrap();
        assert!(session.is_playing());
        assert_eq!(session.elapsed_seconds().unwrap(), 0.0);
    }

    #[test]
    fn test_clock_loss_stops_playback() {
        let hw = ManualClock::new();
        let mut session = session(&hw);
        session.play().unwrap();
        hw.advance(0.5);
        session.tick().unwrap();

        hw.disconnect();
        assert!(matches!(
            session.tick(),
            Err(PlaybackError::ClockUnavailable(_))
        ));
        assert_eq!(session.state(), SchedulerState::Idle);
        assert!(session.snapshot().active.is_empty());
    }

    #[test]
    fn test_load_failures() {
        let hw = ManualClock::new();
        let empty = RawScore::new("Empty", 480);
        assert!(matches!(
            Session::load(&empty, RecordingSynth::default(), hw.clone(), &Settings::default()),
            Err(SessionError::Load(LoadError::Empty))
        ));

        hw.disconnect();
        assert!(matches!(
            Session::load(&score(), RecordingSynth::default(), hw, &Settings::default()),
            Err(SessionError::Playback(PlaybackError::ClockUnavailable(_)))
        ));
    }

    #[test]
    fn test_programs_applied_on_load() {
        #[derive(Default)]
        struct ProgramSynth(Vec<(u8, u8)>);
        impl SynthSink for ProgramSynth {
            fn trigger(&mut self, _: u8, _: u8, _: u8) {}
            fn release(&mut self, _: u8, _: u8) {}
            fn release_all(&mut self) {}
            fn set_program(&mut self, channel: u8, program: u8) {
                self.0.push((channel, program));
            }
        }

        let mut score = score();
        score.programs.push(ProgramAssignment {
            channel: 0,
            program: 40,
        });
        let (session, _) =
            Session::load(&score, ProgramSynth::default(), ManualClock::new(), &Settings::default())
                .unwrap();
        assert_eq!(session.synth().0, vec![(0, 40)]);
    }
}
