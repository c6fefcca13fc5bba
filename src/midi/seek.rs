//! Binary-search lookups over the sorted timeline.
//!
//! Both bounds are pure functions of the timeline and the query time, so
//! repeated seeks to the same time always land on the same index no matter
//! where playback currently is.

use super::Timeline;

impl Timeline {
    /// Returns the index of the first event at or after `time_seconds`.
    ///
    /// Returns `self.len()` when every event is earlier.
    pub fn index_of(&self, time_seconds: f64) -> usize {
        self.events()
            .partition_point(|event| event.time_seconds < time_seconds)
    }

    /// Returns the index of the first event strictly after `time_seconds`.
    pub fn upper_bound(&self, time_seconds: f64) -> usize {
        self.events()
            .partition_point(|event| event.time_seconds <= time_seconds)
    }
}
