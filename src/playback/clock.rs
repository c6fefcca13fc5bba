//! The playback clock.
//!
//! Piece time is always derived from one monotonic, hardware-paced source:
//! `elapsed = hardware.now() - epoch`. Nothing sums per-frame deltas, so the
//! visual position cannot drift away from the audio over a long piece.

use crate::error::PlaybackError;
use std::cell::Cell;
use std::rc::Rc;

/// A monotonic time source paced by hardware, in seconds.
pub trait HardwareClock {
    /// Returns the current hardware time.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::ClockUnavailable`] if the source has gone away
    fn now(&self) -> Result<f64, PlaybackError>;
}

/// Position in the piece, derived from a [`HardwareClock`].
#[derive(Debug)]
pub struct PlaybackClock<C> {
    hardware: C,
    /// Hardware time at which the piece was (or would have been) at 0.
    epoch: f64,
    /// Position held while paused.
    frozen: f64,
    /// Last position successfully read from the hardware.
    last_elapsed: Cell<f64>,
    running: bool,
}

impl<C: HardwareClock> PlaybackClock<C> {
    /// Wraps a hardware clock, paused at 0.
    ///
    /// # Errors
    ///
    /// Fails if the hardware clock cannot be read, since playback could not
    /// stay in sync without it
    pub fn new(hardware: C) -> Result<Self, PlaybackError> {
        hardware.now()?;
        Ok(Self {
            hardware,
            epoch: 0.0,
            frozen: 0.0,
            last_elapsed: Cell::new(0.0),
            running: false,
        })
    }

    /// Starts (or restarts) running from `from_seconds`.
    pub fn start(&mut self, from_seconds: f64) -> Result<(), PlaybackError> {
        self.epoch = self.hardware.now()? - from_seconds;
        self.last_elapsed.set(from_seconds);
        self.running = true;
        Ok(())
    }

    /// Freezes the clock at its current position.
    ///
    /// If the hardware clock fails, the clock still stops, holding the last
    /// value it could read.
    pub fn pause(&mut self) -> Result<(), PlaybackError> {
        if !self.running {
            return Ok(());
        }
        self.running = false;
        let reading = self.hardware.now();
        self.frozen = match reading {
            Ok(now) => now - self.epoch,
            Err(_) => self.last_elapsed.get(),
        };
        reading.map(|_| ())
    }

    /// Returns the current position in the piece.
    pub fn elapsed_seconds(&self) -> Result<f64, PlaybackError> {
        if self.running {
            let elapsed = self.hardware.now()? - self.epoch;
            self.last_elapsed.set(elapsed);
            Ok(elapsed)
        } else {
            Ok(self.frozen)
        }
    }

    /// Moves the position to `target_seconds` without changing run state.
    pub fn seek(&mut self, target_seconds: f64) -> Result<(), PlaybackError> {
        if self.running {
            self.epoch = self.hardware.now()? - target_seconds;
            self.last_elapsed.set(target_seconds);
        } else {
            self.frozen = target_seconds;
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

/// A hand-driven clock for tests and offline rendering.
///
/// Clones share the same time, so a test can keep one handle and advance it
/// while the clock under test holds another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
    unavailable: Rc<Cell<bool>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, seconds: f64) {
        self.now.set(seconds);
    }

    pub fn advance(&self, seconds: f64) {
        self.now.set(self.now.get() + seconds);
    }

    /// Makes every following read fail, as if the device disappeared.
    pub fn disconnect(&self) {
        self.unavailable.set(true);
    }
}

impl HardwareClock for ManualClock {
    fn now(&self) -> Result<f64, PlaybackError> {
        if self.unavailable.get() {
            Err(PlaybackError::ClockUnavailable("clock disconnected".into()))
        } else {
            Ok(self.now.get())
        }
    }
}
