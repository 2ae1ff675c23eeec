//! Media collaborators, seen through a small polling interface.
//!
//! The engine never owns a decode pipeline. It reads positions and states
//! once per tick and issues seek/play/pause commands; everything else is
//! up to the implementation.

use image::RgbaImage;
use lyricut_common::clock::PlaybackClock;
use lyricut_project_model::SourceHandle;

/// The authoritative time source (the audio master).
pub trait MasterClock: Send {
    /// Current position in seconds.
    fn position(&self) -> f64;

    /// Total length, when known.
    fn duration(&self) -> Option<f64>;

    fn is_paused(&self) -> bool;

    /// End-of-stream condition.
    fn has_ended(&self) -> bool;

    fn seek(&mut self, secs: f64);
    fn play(&mut self);
    fn pause(&mut self);

    /// Output volume scalar in `[0, 1]`.
    fn set_volume(&mut self, volume: f32);
}

/// Load state of a visual source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// No source loaded yet, or still opening.
    Loading,
    Ready,
    /// Terminal: the source cannot produce frames.
    Failed,
}

/// The element that plays the active clip.
pub trait VisualSource: Send {
    /// Start loading a new source. Readiness may stay `Loading` for a while.
    fn load(&mut self, source: &SourceHandle);

    /// Native position in seconds (source timeline, not global).
    fn position(&self) -> f64;

    fn readiness(&self) -> Readiness;

    /// Native frame size once known.
    fn native_size(&self) -> Option<(u32, u32)>;

    fn seek(&mut self, secs: f64);
    fn play(&mut self);
    fn pause(&mut self);
    fn is_paused(&self) -> bool;

    /// Clip audio volume scalar in `[0, 1]`.
    fn set_volume(&mut self, volume: f32);

    /// Frame at the current position, if one can be produced.
    fn frame(&mut self) -> Option<&RgbaImage>;
}

impl MasterClock for PlaybackClock {
    fn position(&self) -> f64 {
        self.position_secs()
    }

    fn duration(&self) -> Option<f64> {
        self.duration_secs()
    }

    fn is_paused(&self) -> bool {
        !self.is_running()
    }

    fn has_ended(&self) -> bool {
        PlaybackClock::has_ended(self)
    }

    fn seek(&mut self, secs: f64) {
        PlaybackClock::seek(self, secs);
    }

    fn play(&mut self) {
        PlaybackClock::play(self);
    }

    fn pause(&mut self) {
        PlaybackClock::pause(self);
    }

    fn set_volume(&mut self, volume: f32) {
        // Silent clock: nothing to attenuate.
        tracing::trace!(volume, "Ignoring volume on wall clock");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playback_clock_as_master() {
        let mut clock = PlaybackClock::new(Some(3.0));
        let master: &mut dyn MasterClock = &mut clock;
        assert!(master.is_paused());
        assert_eq!(master.duration(), Some(3.0));

        master.seek(2.5);
        assert!((master.position() - 2.5).abs() < 1e-9);
        master.play();
        assert!(!master.is_paused());
        master.pause();
        assert!(master.is_paused());

        master.seek(10.0);
        assert!(master.has_ended());
    }
}
