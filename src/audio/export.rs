//! Audio export functionality.
//!
//! Renders a timeline to a WAV file offline. The same [`Scheduler`] used for
//! live playback drives the synthesizer; the number of samples rendered so
//! far stands in for the hardware clock.

use crate::audio::engine::{load_synthesizer, SAMPLE_RATE};
use crate::midi::{ProgramAssignment, Timeline};
use crate::playback::{Scheduler, SynthSink};
use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::Path;

/// Buffer size for rendering chunks.
/// Larger buffers are more efficient but use more memory.
const RENDER_BUFFER_SIZE: usize = 4096;

/// Time left after the last note for release tails.
const TAIL_SECONDS: f64 = 2.0;

/// Exports a timeline to a WAV file.
///
/// Events are applied at their exact sample; rendering is split at each event
/// so none is quantized to the buffer size.
///
/// # Arguments
///
/// * `timeline` - The timeline to render
/// * `programs` - Instrument for each channel
/// * `soundfont_path` - Path to the SoundFont file
/// * `output_path` - Path for the output WAV file
/// * `progress_callback` - Optional callback for progress updates (0.0 to 1.0)
///
/// # Errors
///
/// Returns error if:
/// - SoundFont cannot be loaded
/// - Output file cannot be created or written
pub fn export_to_wav<P1, P2, F>(
    timeline: &Timeline,
    programs: &[ProgramAssignment],
    soundfont_path: P1,
    output_path: P2,
    mut progress_callback: Option<F>,
) -> Result<()>
where
    P1: AsRef<Path>,
    P2: AsRef<Path>,
    F: FnMut(f32),
{
    let mut synth = load_synthesizer(soundfont_path.as_ref()).with_context(|| {
        format!(
            "Failed to load SoundFont for export: {}",
            soundfont_path.as_ref().display()
        )
    })?;

    for assignment in programs {
        synth.set_program(assignment.channel, assignment.program);
    }

    let duration_seconds = timeline.total_duration_seconds() + TAIL_SECONDS;
    let total_samples = (duration_seconds * SAMPLE_RATE as f64) as usize;

    let spec = WavSpec {
        channels: 2,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(output_path.as_ref(), spec).with_context(|| {
        format!(
            "Failed to create output WAV file: {}",
            output_path.as_ref().display()
        )
    })?;

    // Fading only affects the display, so any positive duration will do
    let mut scheduler = Scheduler::new(timeline.clone(), f64::MIN_POSITIVE);
    scheduler.play(&mut synth);

    let mut left_buf = vec![0.0f32; RENDER_BUFFER_SIZE];
    let mut right_buf = vec![0.0f32; RENDER_BUFFER_SIZE];
    let mut current_sample = 0usize;

    while current_sample < total_samples {
        scheduler.advance_to(current_sample as f64 / SAMPLE_RATE as f64, &mut synth);

        let mut samples_to_render = (total_samples - current_sample).min(RENDER_BUFFER_SIZE);
        if let Some(next) = timeline.events().get(scheduler.cursor()) {
            let until_next = sample_at(next.time_seconds).saturating_sub(current_sample);
            samples_to_render = samples_to_render.min(until_next.max(1));
        }

        synth.render(
            &mut left_buf[..samples_to_render],
            &mut right_buf[..samples_to_render],
        );

        // Interleaved stereo, 16-bit
        for i in 0..samples_to_render {
            let left_sample = (left_buf[i] * 32767.0).clamp(-32768.0, 32767.0) as i16;
            let right_sample = (right_buf[i] * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer.write_sample(left_sample)?;
            writer.write_sample(right_sample)?;
        }

        current_sample += samples_to_render;

        if let Some(ref mut callback) = progress_callback {
            callback(current_sample as f32 / total_samples as f32);
        }
    }

    writer.finalize().context("Failed to finalize WAV file")?;

    tracing::info!(
        "Exported {:.2}s of audio to {}",
        duration_seconds,
        output_path.as_ref().display()
    );

    Ok(())
}

/// First sample at or after `seconds`.
fn sample_at(seconds: f64) -> usize {
    (seconds * SAMPLE_RATE as f64).ceil().max(0.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::{build_timeline, RawNote, RawScore, RawTrack, TempoMap};
    use std::path::PathBuf;

    #[test]
    fn test_sample_at_rounds_up() {
        assert_eq!(sample_at(0.0), 0);
        assert_eq!(sample_at(1.0), SAMPLE_RATE as usize);
        assert_eq!(sample_at(0.5 / SAMPLE_RATE as f64), 1);
    }

    #[test]
    fn test_missing_soundfont_is_reported() {
        let mut score = RawScore::new("Test", 480);
        let mut track = RawTrack::new("Piano");
        track.notes.push(RawNote::new(60, 0.8, 0, 0, 480));
        score.tracks.push(track);
        let (tempo, _) = TempoMap::build(480, &[]);
        let (timeline, _) = build_timeline(&score, &tempo).unwrap();

        let result = export_to_wav(
            &timeline,
            &[],
            "does/not/exist.sf2",
            std::env::temp_dir().join("keyfall_missing_sf.wav"),
            None::<fn(f32)>,
        );
        assert!(result.is_err());
    }

    #[test]
    #[ignore] // Requires SoundFont file
    fn test_export_simple_score() {
        let mut score = RawScore::new("Test", 480);
        let mut track = RawTrack::new("Piano");
        track.notes.push(RawNote::new(60, 0.8, 0, 0, 480));
        track.notes.push(RawNote::new(64, 0.8, 0, 480, 960));
        track.notes.push(RawNote::new(67, 0.8, 0, 960, 1440));
        score.tracks.push(track);
        let (tempo, _) = TempoMap::build(480, &[]);
        let (timeline, _) = build_timeline(&score, &tempo).unwrap();

        let sf_path = PathBuf::from("assets/TimGM6mb.sf2");
        let output_path = PathBuf::from("test_output/test_export.wav");

        std::fs::create_dir_all("test_output").unwrap();

        let mut last = 0.0;
        export_to_wav(&timeline, &[], sf_path, output_path, Some(|p: f32| last = p)).unwrap();
        assert_eq!(last, 1.0);
    }
}
