//! Tick to seconds conversion across tempo changes.
//!
//! The map is a list of [`TempoSegment`]s, each starting at a tick with a known
//! absolute start time. Start times are accumulated segment by segment while
//! building, so a lookup is a binary search plus one linear step.

use super::{RawTempoChange, DEFAULT_MICROSECONDS_PER_BEAT};
use crate::error::BuildWarning;

/// A span of the score played at a constant tempo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoSegment {
    pub start_tick: u64,
    pub start_seconds: f64,
    pub microseconds_per_beat: u32,
}

/// Ordered, non-overlapping tempo segments covering the score from tick 0.
#[derive(Debug, Clone, PartialEq)]
pub struct TempoMap {
    ticks_per_beat: u16,
    /// Sorted by `start_tick`, strictly increasing; the first starts at 0.
    segments: Vec<TempoSegment>,
}

impl TempoMap {
    /// Builds a tempo map from the score's tempo changes.
    ///
    /// Changes with a zero rate are dropped and reported; the previous
    /// segment's tempo (or the 120 BPM default) stays in effect. When several
    /// changes land on the same tick the last one in parse order wins.
    ///
    /// # Arguments
    ///
    /// * `ticks_per_beat` - Tick resolution from the file header
    /// * `changes` - Tempo changes in parse order, from any track
    pub fn build(ticks_per_beat: u16, changes: &[RawTempoChange]) -> (Self, Vec<BuildWarning>) {
        let mut warnings = Vec::new();
        let mut valid: Vec<RawTempoChange> = changes
            .iter()
            .filter(|change| {
                if change.microseconds_per_beat == 0 {
                    tracing::warn!(
                        "Dropping tempo change at tick {} with zero rate",
                        change.tick
                    );
                    warnings.push(BuildWarning::InvalidTempo {
                        tick: change.tick,
                        microseconds_per_beat: change.microseconds_per_beat,
                    });
                    false
                } else {
                    true
                }
            })
            .copied()
            .collect();

        // Stable, so same-tick changes keep parse order and the last one wins below
        valid.sort_by_key(|change| change.tick);

        let ticks_per_beat = ticks_per_beat.max(1);
        let mut segments = vec![TempoSegment {
            start_tick: 0,
            start_seconds: 0.0,
            microseconds_per_beat: DEFAULT_MICROSECONDS_PER_BEAT,
        }];

        for change in valid {
            let Some(last) = segments.last_mut() else {
                break;
            };
            if change.tick == last.start_tick {
                last.microseconds_per_beat = change.microseconds_per_beat;
                continue;
            }
            let start_seconds = last.start_seconds
                + seconds_for_ticks(
                    change.tick - last.start_tick,
                    last.microseconds_per_beat,
                    ticks_per_beat,
                );
            // Redundant changes would only add segments with identical rates
            if change.microseconds_per_beat == last.microseconds_per_beat {
                continue;
            }
            segments.push(TempoSegment {
                start_tick: change.tick,
                start_seconds,
                microseconds_per_beat: change.microseconds_per_beat,
            });
        }

        tracing::debug!("Built tempo map with {} segment(s)", segments.len());
        (
            Self {
                ticks_per_beat,
                segments,
            },
            warnings,
        )
    }

    /// Converts an absolute tick position to seconds from the start.
    pub fn to_seconds(&self, tick: u64) -> f64 {
        let segment = self.segment_at(tick);
        segment.start_seconds
            + seconds_for_ticks(
                tick - segment.start_tick,
                segment.microseconds_per_beat,
                self.ticks_per_beat,
            )
    }

    /// Returns the segment containing `tick`.
    pub fn segment_at(&self, tick: u64) -> &TempoSegment {
        // First segment starts at 0, so the partition point is always >= 1
        let idx = self
            .segments
            .partition_point(|segment| segment.start_tick <= tick);
        &self.segments[idx.saturating_sub(1)]
    }

    /// Returns the tempo in beats per minute at `tick`.
    pub fn bpm_at(&self, tick: u64) -> f64 {
        60_000_000.0 / self.segment_at(tick).microseconds_per_beat as f64
    }

    /// Returns the tempo in beats per minute at a position in seconds.
    pub fn bpm_at_seconds(&self, seconds: f64) -> f64 {
        let idx = self
            .segments
            .partition_point(|segment| segment.start_seconds <= seconds);
        let segment = &self.segments[idx.saturating_sub(1)];
        60_000_000.0 / segment.microseconds_per_beat as f64
    }

    pub fn segments(&self) -> &[TempoSegment] {
        &self.segments
    }

    pub fn ticks_per_beat(&self) -> u16 {
        self.ticks_per_beat
    }
}

/// Duration of `ticks` at a constant rate.
fn seconds_for_ticks(ticks: u64, microseconds_per_beat: u32, ticks_per_beat: u16) -> f64 {
    (ticks as f64 * microseconds_per_beat as f64) / (1_000_000.0 * ticks_per_beat as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tempo_quarter_note() {
        let (map, warnings) = TempoMap::build(480, &[]);
        assert!(warnings.is_empty());
        assert_eq!(map.segments().len(), 1);
        assert_eq!(map.to_seconds(480), 0.5);
        assert_eq!(map.to_seconds(0), 0.0);
    }

    #[test]
    fn test_explicit_120_bpm_is_exact() {
        let (map, _) = TempoMap::build(
            96,
            &[RawTempoChange {
                tick: 0,
                microseconds_per_beat: 500_000,
            }],
        );
        assert_eq!(map.to_seconds(96), 0.5);
        assert_eq!(map.to_seconds(96 * 4), 2.0);
    }

    #[test]
    fn test_tempo_change_accumulates() {
        // 120 BPM for one beat, then 60 BPM
        let changes = [
            RawTempoChange::from_bpm(0, 120.0),
            RawTempoChange::from_bpm(480, 60.0),
        ];
        let (map, _) = TempoMap::build(480, &changes);
        assert_eq!(map.segments().len(), 2);
        assert_eq!(map.segments()[1].start_seconds, 0.5);
        assert!((map.to_seconds(960) - 1.5).abs() < 1e-12);
        assert!((map.bpm_at(700) - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_unsorted_changes_are_sorted() {
        let changes = [
            RawTempoChange::from_bpm(960, 240.0),
            RawTempoChange::from_bpm(480, 60.0),
        ];
        let (map, _) = TempoMap::build(480, &changes);
        // 0.5s for first beat at 120, 1.0s for second beat at 60
        assert!((map.to_seconds(960) - 1.5).abs() < 1e-12);
        // 0.25s per beat at 240
        assert!((map.to_seconds(1440) - 1.75).abs() < 1e-12);
    }

    #[test]
    fn test_zero_rate_dropped_with_warning() {
        let changes = [
            RawTempoChange::from_bpm(0, 60.0),
            RawTempoChange {
                tick: 480,
                microseconds_per_beat: 0,
            },
        ];
        let (map, warnings) = TempoMap::build(480, &changes);
        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            warnings[0],
            BuildWarning::InvalidTempo { tick: 480, .. }
        ));
        // Previous rate continues
        assert_eq!(map.to_seconds(960), 2.0);
    }

    #[test]
    fn test_same_tick_last_wins() {
        let changes = [
            RawTempoChange::from_bpm(0, 60.0),
            RawTempoChange::from_bpm(0, 120.0),
        ];
        let (map, _) = TempoMap::build(480, &changes);
        assert_eq!(map.segments().len(), 1);
        assert_eq!(map.to_seconds(480), 0.5);
    }

    #[test]
    fn test_segment_lookup_at_boundary() {
        let changes = [RawTempoChange::from_bpm(480, 60.0)];
        let (map, _) = TempoMap::build(480, &changes);
        assert_eq!(map.segment_at(479).start_tick, 0);
        assert_eq!(map.segment_at(480).start_tick, 480);
        assert_eq!(map.to_seconds(480), 0.5);
    }

    #[test]
    fn test_bpm_at_seconds() {
        let changes = [
            RawTempoChange::from_bpm(0, 120.0),
            RawTempoChange::from_bpm(480, 60.0),
        ];
        let (map, _) = TempoMap::build(480, &changes);
        assert!((map.bpm_at_seconds(0.25) - 120.0).abs() < 1e-9);
        assert!((map.bpm_at_seconds(0.5) - 60.0).abs() < 1e-9);
        assert!((map.bpm_at_seconds(-1.0) - 120.0).abs() < 1e-9);
    }
}
