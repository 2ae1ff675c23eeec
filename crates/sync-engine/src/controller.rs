//! Per-tick reconciliation of the active clip against the master clock.
//!
//! Every tick reads the master position, resolves the active clip and its
//! local offset, switches sources when the clip changes, re-snaps the clip
//! when it drifts too far, and mirrors the master's run state onto it.
//!
//! Drift correction only fires while the master is visibly progressing
//! (or on the first tick after playback starts). A stalled master with a
//! free-running clip would otherwise re-seek the clip on every tick.

use lyricut_common::clock::DriftMeasurement;
use lyricut_project_model::{ClipId, ClipSequence, CueId, CueStore, SourceHandle};

use crate::media::{MasterClock, Readiness, VisualSource};

/// Run state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No ticks are driven.
    Idle,
    /// Ticking for preview.
    Playing,
    /// Ticking and feeding the export sink; seeks are refused.
    Exporting,
}

impl EngineState {
    pub fn is_running(self) -> bool {
        !matches!(self, EngineState::Idle)
    }
}

/// Why a reconciliation pass runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMode {
    /// Scheduled tick: drift correction is gated on master progress.
    Tick,
    /// User seek: the clip is always re-positioned.
    Seek,
}

/// What one tick observed and did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    /// Master position read at the start of the tick.
    pub master_secs: f64,

    /// Active clip, `None` past the end of the sequence.
    pub clip: Option<ClipId>,

    /// Expected position inside the active clip's source.
    pub local_time: Option<f64>,

    /// A different source was loaded this tick.
    pub switched: bool,

    /// The clip was forcibly re-positioned to `local_time`.
    pub corrected: bool,

    /// Measured drift before any correction.
    pub drift: Option<DriftMeasurement>,

    /// Active cue at `master_secs`.
    pub cue: Option<CueId>,

    /// The master reached its end; the controller is now idle.
    pub ended: bool,
}

impl TickReport {
    fn ended(master_secs: f64) -> Self {
        Self {
            master_secs,
            clip: None,
            local_time: None,
            switched: false,
            corrected: false,
            drift: None,
            cue: None,
            ended: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct LoadedClip {
    id: ClipId,
    source: SourceHandle,
}

/// Drives one visual source from the master clock.
#[derive(Debug, Clone)]
pub struct SyncController {
    state: EngineState,
    loaded: Option<LoadedClip>,
    prev_master_secs: Option<f64>,
    first_tick: bool,
    drift_threshold_secs: f64,
    corrections: u64,
    switches: u64,
}

impl SyncController {
    pub fn new(drift_threshold_secs: f64) -> Self {
        Self {
            state: EngineState::Idle,
            loaded: None,
            prev_master_secs: None,
            first_tick: true,
            drift_threshold_secs,
            corrections: 0,
            switches: 0,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Clip whose source is currently loaded.
    pub fn loaded_clip(&self) -> Option<ClipId> {
        self.loaded.as_ref().map(|l| l.id)
    }

    /// Drift corrections applied so far.
    pub fn corrections(&self) -> u64 {
        self.corrections
    }

    /// Source switches performed so far.
    pub fn switches(&self) -> u64 {
        self.switches
    }

    pub fn drift_threshold_secs(&self) -> f64 {
        self.drift_threshold_secs
    }

    pub fn start_playing(&mut self) {
        self.enter(EngineState::Playing);
    }

    pub fn start_exporting(&mut self) {
        self.enter(EngineState::Exporting);
    }

    pub fn stop(&mut self) {
        if self.state != EngineState::Idle {
            tracing::debug!(from = ?self.state, "Controller idle");
        }
        self.state = EngineState::Idle;
    }

    fn enter(&mut self, state: EngineState) {
        tracing::debug!(from = ?self.state, to = ?state, "Controller state change");
        self.state = state;
        self.first_tick = true;
    }

    /// Forget the loaded source so the next pass reloads it.
    pub fn invalidate_source(&mut self) {
        self.loaded = None;
    }

    /// One scheduled tick. Does nothing useful while idle.
    pub fn tick(
        &mut self,
        master: &mut dyn MasterClock,
        visual: &mut dyn VisualSource,
        clips: &ClipSequence,
        cues: &CueStore,
    ) -> TickReport {
        let t = master.position();

        if master.has_ended() {
            tracing::debug!(time_secs = t, "Master clock ended");
            self.stop();
            visual.pause();
            self.prev_master_secs = Some(t);
            return TickReport::ended(t);
        }

        self.reconcile(t, ReconcileMode::Tick, master, visual, clips, cues)
    }

    /// Steps 3 to 8 of a tick at master time `t`.
    pub fn reconcile(
        &mut self,
        t: f64,
        mode: ReconcileMode,
        master: &mut dyn MasterClock,
        visual: &mut dyn VisualSource,
        clips: &ClipSequence,
        cues: &CueStore,
    ) -> TickReport {
        let mut report = TickReport {
            master_secs: t,
            clip: None,
            local_time: None,
            switched: false,
            corrected: false,
            drift: None,
            cue: cues.active_at(t).map(|c| c.id),
            ended: false,
        };

        match clips.resolve(t) {
            Some(resolved) => {
                let clip = resolved.clip;
                let local_time = resolved.local_time;
                report.clip = Some(clip.id);
                report.local_time = Some(local_time);

                let same_source = self
                    .loaded
                    .as_ref()
                    .is_some_and(|l| l.id == clip.id && l.source == clip.source);

                if !same_source {
                    tracing::debug!(
                        clip_id = %clip.id,
                        source = %clip.source,
                        local_time,
                        time_secs = t,
                        "Switching active clip"
                    );
                    visual.load(&clip.source);
                    visual.seek(local_time);
                    if self.state.is_running() {
                        visual.play();
                    }
                    self.loaded = Some(LoadedClip {
                        id: clip.id,
                        source: clip.source.clone(),
                    });
                    self.switches += 1;
                    report.switched = true;
                } else {
                    let drift = DriftMeasurement::new(local_time, visual.position());
                    report.drift = Some(drift);
                    match mode {
                        ReconcileMode::Seek => {
                            visual.seek(local_time);
                            report.corrected = true;
                        }
                        ReconcileMode::Tick => {
                            let progressing = self.first_tick
                                || self.prev_master_secs.map_or(true, |prev| t > prev);
                            if progressing
                                && visual.readiness() == Readiness::Ready
                                && drift.exceeds_threshold_secs(self.drift_threshold_secs)
                            {
                                tracing::debug!(
                                    clip_id = %clip.id,
                                    drift_secs = drift.drift_secs(),
                                    local_time,
                                    "Correcting clip drift"
                                );
                                visual.seek(local_time);
                                self.corrections += 1;
                                report.corrected = true;
                            }
                        }
                    }
                }
            }
            None => {
                if let Some(loaded) = self.loaded.take() {
                    tracing::debug!(
                        clip_id = %loaded.id,
                        time_secs = t,
                        "Clip sequence exhausted; drawing placeholder"
                    );
                    visual.pause();
                }
            }
        }

        if self.loaded.is_some() {
            if master.is_paused() || !self.state.is_running() {
                if !visual.is_paused() {
                    visual.pause();
                }
            } else if visual.readiness() == Readiness::Ready && visual.is_paused() {
                visual.play();
            }
        }

        self.prev_master_secs = Some(t);
        self.first_tick = false;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeMaster, FakeVisual, VisualCall};
    use lyricut_project_model::{ClipEdit, Cue};

    fn two_clips() -> ClipSequence {
        ClipSequence::new()
            .apply(&ClipEdit::Append {
                source: SourceHandle::new("a.mp4"),
                original_duration: 4.0,
            })
            .unwrap()
            .apply(&ClipEdit::Append {
                source: SourceHandle::new("b.mp4"),
                original_duration: 6.0,
            })
            .unwrap()
    }

    #[test]
    fn test_first_tick_loads_and_plays() {
        let clips = two_clips();
        let cues = CueStore::from_cues(vec![Cue::new(CueId(7), 0.0, Some(2.0), "가", "a")]);
        let mut master = FakeMaster::playing(0.5, 10.0);
        let mut visual = FakeVisual::default();
        let mut ctrl = SyncController::new(0.2);
        ctrl.start_playing();

        let report = ctrl.tick(&mut master, &mut visual, &clips, &cues);
        assert!(report.switched);
        assert_eq!(report.clip, Some(ClipId(0)));
        assert_eq!(report.cue, Some(CueId(7)));
        assert_eq!(visual.loaded.as_deref(), Some("a.mp4"));
        assert!((visual.position - 0.5).abs() < 1e-9);
        assert!(!visual.paused);
    }

    #[test]
    fn test_switch_at_boundary() {
        let clips = two_clips();
        let cues = CueStore::new();
        let mut master = FakeMaster::playing(3.9, 10.0);
        let mut visual = FakeVisual::default();
        let mut ctrl = SyncController::new(0.2);
        ctrl.start_playing();

        ctrl.tick(&mut master, &mut visual, &clips, &cues);
        master.position = 4.0;
        let report = ctrl.tick(&mut master, &mut visual, &clips, &cues);
        assert!(report.switched);
        assert_eq!(report.clip, Some(ClipId(1)));
        assert_eq!(visual.loaded.as_deref(), Some("b.mp4"));
        assert!(visual.position.abs() < 1e-9);
        assert_eq!(ctrl.switches(), 2);
    }

    #[test]
    fn test_drift_is_corrected_while_master_progresses() {
        let clips = two_clips();
        let cues = CueStore::new();
        let mut master = FakeMaster::playing(1.0, 10.0);
        let mut visual = FakeVisual::default();
        let mut ctrl = SyncController::new(0.2);
        ctrl.start_playing();
        ctrl.tick(&mut master, &mut visual, &clips, &cues);

        master.position = 1.5;
        visual.position = 1.1;
        let report = ctrl.tick(&mut master, &mut visual, &clips, &cues);
        assert!(report.corrected);
        assert!((visual.position - 1.5).abs() < 1e-9);
        assert_eq!(ctrl.corrections(), 1);

        // Small drift is tolerated.
        master.position = 1.6;
        visual.position = 1.45;
        let report = ctrl.tick(&mut master, &mut visual, &clips, &cues);
        assert!(!report.corrected);
        assert!((report.drift.unwrap().drift_secs() + 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_stalled_master_never_corrects() {
        let clips = two_clips();
        let cues = CueStore::new();
        let mut master = FakeMaster::playing(2.0, 10.0);
        let mut visual = FakeVisual::default();
        let mut ctrl = SyncController::new(0.2);
        ctrl.start_playing();
        ctrl.tick(&mut master, &mut visual, &clips, &cues);

        for step in 1..20 {
            visual.position = 2.0 + step as f64 * 0.1;
            let report = ctrl.tick(&mut master, &mut visual, &clips, &cues);
            assert!(!report.corrected, "corrected on stalled tick {step}");
        }
        assert_eq!(ctrl.corrections(), 0);
    }

    #[test]
    fn test_loading_source_is_not_corrected_or_resumed() {
        let clips = two_clips();
        let cues = CueStore::new();
        let mut master = FakeMaster::playing(0.0, 10.0);
        let mut visual = FakeVisual {
            readiness: Readiness::Loading,
            ..FakeVisual::default()
        };
        let mut ctrl = SyncController::new(0.2);
        ctrl.start_playing();
        ctrl.tick(&mut master, &mut visual, &clips, &cues);
        visual.paused = true;

        master.position = 1.0;
        let report = ctrl.tick(&mut master, &mut visual, &clips, &cues);
        assert!(!report.corrected);
        assert!(visual.paused);
    }

    #[test]
    fn test_paused_master_pauses_clip() {
        let clips = two_clips();
        let cues = CueStore::new();
        let mut master = FakeMaster::playing(1.0, 10.0);
        let mut visual = FakeVisual::default();
        let mut ctrl = SyncController::new(0.2);
        ctrl.start_playing();
        ctrl.tick(&mut master, &mut visual, &clips, &cues);
        assert!(!visual.paused);

        master.paused = true;
        ctrl.tick(&mut master, &mut visual, &clips, &cues);
        assert!(visual.paused);

        master.paused = false;
        master.position = 1.1;
        ctrl.tick(&mut master, &mut visual, &clips, &cues);
        assert!(!visual.paused);
    }

    #[test]
    fn test_seek_always_repositions() {
        let clips = two_clips();
        let cues = CueStore::new();
        let mut master = FakeMaster::playing(1.0, 10.0);
        let mut visual = FakeVisual::default();
        let mut ctrl = SyncController::new(0.2);
        ctrl.start_playing();
        ctrl.tick(&mut master, &mut visual, &clips, &cues);

        // Within threshold, but a seek still snaps.
        visual.position = 1.05;
        let report = ctrl.reconcile(
            1.0,
            ReconcileMode::Seek,
            &mut master,
            &mut visual,
            &clips,
            &cues,
        );
        assert!(report.corrected);
        assert_eq!(visual.calls.last(), Some(&VisualCall::Seek(1.0)));
        assert_eq!(ctrl.corrections(), 0);
    }

    #[test]
    fn test_end_of_master_goes_idle() {
        let clips = two_clips();
        let cues = CueStore::new();
        let mut master = FakeMaster::playing(10.0, 10.0);
        let mut visual = FakeVisual::default();
        let mut ctrl = SyncController::new(0.2);
        ctrl.start_playing();

        let report = ctrl.tick(&mut master, &mut visual, &clips, &cues);
        assert!(report.ended);
        assert_eq!(ctrl.state(), EngineState::Idle);
    }

    #[test]
    fn test_past_last_clip_releases_source() {
        let clips = two_clips();
        let cues = CueStore::new();
        let mut master = FakeMaster::playing(9.0, 20.0);
        let mut visual = FakeVisual::default();
        let mut ctrl = SyncController::new(0.2);
        ctrl.start_playing();
        ctrl.tick(&mut master, &mut visual, &clips, &cues);
        assert_eq!(ctrl.loaded_clip(), Some(ClipId(1)));

        master.position = 12.0;
        let report = ctrl.tick(&mut master, &mut visual, &clips, &cues);
        assert_eq!(report.clip, None);
        assert_eq!(ctrl.loaded_clip(), None);
        assert!(visual.paused);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_progressing_master_keeps_clip_within_threshold(
                steps in prop::collection::vec((0.01f64..0.5, -1.0f64..1.0), 1..60)
            ) {
                let clips = two_clips();
                let cues = CueStore::new();
                let mut master = FakeMaster::playing(0.0, 100.0);
                let mut visual = FakeVisual::default();
                let mut ctrl = SyncController::new(0.2);
                ctrl.start_playing();
                ctrl.tick(&mut master, &mut visual, &clips, &cues);

                for (dt, jitter) in steps {
                    master.position += dt;
                    visual.position += dt + jitter;
                    let report = ctrl.tick(&mut master, &mut visual, &clips, &cues);
                    if let Some(local) = report.local_time {
                        prop_assert!((visual.position - local).abs() <= 0.2 + 1e-9);
                    } else {
                        prop_assert_eq!(ctrl.loaded_clip(), None);
                    }
                }
            }
        }
    }
}
