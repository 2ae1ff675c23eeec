//! Clock and timing utilities for playback synchronization.
//!
//! Every derived position in Lyricut (active clip offset, active cue) is
//! computed from a single master clock. This module provides:
//! - A wall-clock master for previews without an audio device
//! - Drift measurement between the master and a media element
//! - Rate control for frame emission

use std::time::Instant;

/// A pausable, seekable playback clock backed by the monotonic clock.
///
/// Time only advances while playing. Reaching `duration_secs` latches the
/// clock at the end position and marks it ended.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    /// Position accumulated before the current run started.
    base_secs: f64,

    /// Instant the current run started, `None` while paused.
    running_since: Option<Instant>,

    /// Total length of the media this clock stands in for.
    duration_secs: Option<f64>,
}

impl PlaybackClock {
    /// Create a paused clock at position zero.
    pub fn new(duration_secs: Option<f64>) -> Self {
        Self {
            base_secs: 0.0,
            running_since: None,
            duration_secs,
        }
    }

    /// Current position in seconds, clamped to the duration.
    pub fn position_secs(&self) -> f64 {
        let raw = match self.running_since {
            Some(start) => self.base_secs + start.elapsed().as_secs_f64(),
            None => self.base_secs,
        };
        match self.duration_secs {
            Some(d) => raw.min(d),
            None => raw,
        }
    }

    /// Total duration, if known.
    pub fn duration_secs(&self) -> Option<f64> {
        self.duration_secs
    }

    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    /// Whether the clock has reached its duration.
    pub fn has_ended(&self) -> bool {
        matches!(self.duration_secs, Some(d) if self.position_secs() >= d)
    }

    pub fn play(&mut self) {
        if self.running_since.is_none() {
            if self.has_ended() {
                self.base_secs = 0.0;
            }
            self.running_since = Some(Instant::now());
        }
    }

    pub fn pause(&mut self) {
        self.base_secs = self.position_secs();
        self.running_since = None;
    }

    /// Jump to `secs`, keeping the run state.
    pub fn seek(&mut self, secs: f64) {
        let clamped = match self.duration_secs {
            Some(d) => secs.clamp(0.0, d),
            None => secs.max(0.0),
        };
        self.base_secs = clamped;
        if self.running_since.is_some() {
            self.running_since = Some(Instant::now());
        }
    }
}

/// Drift measurement between the master clock and a media element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftMeasurement {
    /// Position expected from the master clock (seconds).
    pub expected_secs: f64,
    /// Position reported by the media element (seconds).
    pub reported_secs: f64,
}

impl DriftMeasurement {
    pub fn new(expected_secs: f64, reported_secs: f64) -> Self {
        Self {
            expected_secs,
            reported_secs,
        }
    }

    /// Drift in seconds (positive = element is ahead).
    pub fn drift_secs(&self) -> f64 {
        self.reported_secs - self.expected_secs
    }

    /// Whether drift strictly exceeds an acceptable threshold.
    pub fn exceeds_threshold_secs(&self, threshold_secs: f64) -> bool {
        self.drift_secs().abs() > threshold_secs
    }
}

/// Frame rate controller for frame emission.
#[derive(Debug)]
pub struct RateController {
    target_interval_ns: u64,
    last_tick_ns: Option<u64>,
}

impl RateController {
    /// Create a controller targeting the given Hz rate.
    pub fn new(target_hz: u32) -> Self {
        Self {
            target_interval_ns: 1_000_000_000 / target_hz.max(1) as u64,
            last_tick_ns: None,
        }
    }

    /// Check if enough time has passed for the next tick.
    /// Returns true and updates internal state if ready.
    /// The first call always returns true.
    pub fn should_tick(&mut self, current_ns: u64) -> bool {
        match self.last_tick_ns {
            None => {
                self.last_tick_ns = Some(current_ns);
                true
            }
            Some(last) if current_ns >= last + self.target_interval_ns => {
                self.last_tick_ns = Some(current_ns);
                true
            }
            // The clock jumped backwards (seek or rewind): restart the cadence.
            Some(last) if current_ns < last => {
                self.last_tick_ns = Some(current_ns);
                true
            }
            _ => false,
        }
    }

    /// Convert seconds to nanoseconds, rounding to the nearest one.
    pub fn secs_to_ns(secs: f64) -> u64 {
        (secs.max(0.0) * 1_000_000_000.0).round() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paused_clock_does_not_advance() {
        let clock = PlaybackClock::new(Some(10.0));
        assert_eq!(clock.position_secs(), 0.0);
        assert!(!clock.is_running());
        assert!(!clock.has_ended());
    }

    #[test]
    fn test_seek_clamps_to_duration() {
        let mut clock = PlaybackClock::new(Some(10.0));
        clock.seek(12.0);
        assert_eq!(clock.position_secs(), 10.0);
        assert!(clock.has_ended());

        clock.seek(-3.0);
        assert_eq!(clock.position_secs(), 0.0);
    }

    #[test]
    fn test_play_after_end_rewinds() {
        let mut clock = PlaybackClock::new(Some(5.0));
        clock.seek(5.0);
        clock.play();
        assert!(clock.position_secs() < 1.0);
        clock.pause();
        assert!(!clock.is_running());
    }

    #[test]
    fn test_drift_measurement() {
        let drift = DriftMeasurement::new(4.0, 4.25);
        assert!((drift.drift_secs() - 0.25).abs() < 1e-9);
        assert!(drift.exceeds_threshold_secs(0.2));
        assert!(!drift.exceeds_threshold_secs(0.3));
    }

    #[test]
    fn test_rate_controller() {
        let mut ctrl = RateController::new(60);
        assert!(ctrl.should_tick(0)); // first tick always fires
        assert!(!ctrl.should_tick(1_000_000)); // 1ms later, too soon
        assert!(ctrl.should_tick(17_000_000)); // ~17ms later, should fire (60Hz ~ 16.67ms)
    }

    #[test]
    fn test_rate_controller_restarts_after_rewind() {
        let mut ctrl = RateController::new(30);
        assert!(ctrl.should_tick(RateController::secs_to_ns(5.0)));
        assert!(ctrl.should_tick(0));
        assert!(!ctrl.should_tick(10_000_000));
    }
}
