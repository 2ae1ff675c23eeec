//! The playback engine: the surface callers drive.
//!
//! The engine owns the master clock, the visual source, the compositor and
//! the current cue/clip snapshots. Edits replace snapshots wholesale, so a
//! tick always sees one consistent version of each.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use image::RgbaImage;
use lyricut_common::clock::RateController;
use lyricut_common::config::PlaybackDefaults;
use lyricut_common::error::{LyricutError, LyricutResult};
use lyricut_project_model::{
    ClipEdit, ClipId, ClipSequence, CueEdit, CueId, CueStore, DurationWarning, EditOptions,
    SourceHandle, StyleConfig,
};
use lyricut_render_engine::{
    Compositor, CoverPlacement, ExportArtifact, ExportSettings, ExportSink, OutputSize,
    SinkCapabilities,
};

use crate::controller::{EngineState, ReconcileMode, SyncController, TickReport};
use crate::media::{MasterClock, Readiness, VisualSource};

/// Engine tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Preview and export frame size.
    pub output: OutputSize,
    pub drift_threshold_secs: f64,
    pub master_volume: f32,
    pub clip_volume: f32,
    pub nudge_step_secs: f64,
}

impl EngineSettings {
    pub fn from_playback(playback: &PlaybackDefaults, output: OutputSize) -> Self {
        Self {
            output,
            drift_threshold_secs: playback.drift_threshold_secs,
            master_volume: playback.master_volume,
            clip_volume: playback.clip_volume,
            nudge_step_secs: playback.nudge_step_secs,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_playback(&PlaybackDefaults::default(), OutputSize::new(1920, 1080))
    }
}

/// Non-fatal condition surfaced to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineWarning {
    /// The clips run out before the music; the tail shows the placeholder.
    ClipsShorterThanAudio(DurationWarning),

    /// The export sink cannot capture audio.
    VideoOnlyExport,

    /// A clip could not be loaded; its span plays audio-only.
    SourceLoadFailed { clip: ClipId, source: SourceHandle },
}

impl fmt::Display for EngineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineWarning::ClipsShorterThanAudio(warning) => write!(f, "{warning}"),
            EngineWarning::VideoOnlyExport => {
                f.write_str("Audio capture is not available; exporting video only.")
            }
            EngineWarning::SourceLoadFailed { clip, source } => {
                write!(f, "Clip {clip} ({source}) failed to load; showing placeholder.")
            }
        }
    }
}

/// Result of one [`PlaybackEngine::advance_tick`].
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Nothing is playing.
    Idle,

    /// A frame was composited.
    Rendered {
        time_secs: f64,
        clip: Option<ClipId>,
        cue: Option<CueId>,
    },

    /// Preview playback reached the end of the master clock.
    Ended,

    /// Export ran to the end and the sink produced its artifact.
    ExportFinished(ExportArtifact),

    /// The export was aborted.
    ExportFailed(String),
}

struct ExportRun {
    sink: Box<dyn ExportSink>,
    rate: RateController,
    frames: u64,
}

/// Drives a master clock, one visual source, and the compositor.
pub struct PlaybackEngine<M: MasterClock, V: VisualSource> {
    master: M,
    visual: V,
    controller: SyncController,
    compositor: Compositor,
    clips: Arc<ClipSequence>,
    cues: Arc<CueStore>,
    style: StyleConfig,
    edit_options: EditOptions,
    settings: EngineSettings,
    composite: Option<RgbaImage>,
    last_report: Option<TickReport>,
    warnings: Vec<EngineWarning>,
    failed_clips: HashSet<ClipId>,
    export: Option<ExportRun>,
}

impl<M: MasterClock, V: VisualSource> PlaybackEngine<M, V> {
    pub fn new(
        master: M,
        visual: V,
        compositor: Compositor,
        clips: Arc<ClipSequence>,
        cues: Arc<CueStore>,
        style: StyleConfig,
        settings: EngineSettings,
    ) -> Self {
        let mut engine = Self {
            master,
            visual,
            controller: SyncController::new(settings.drift_threshold_secs),
            compositor,
            clips,
            cues,
            style,
            edit_options: EditOptions {
                ripple: false,
                nudge_step_secs: settings.nudge_step_secs,
            },
            settings,
            composite: None,
            last_report: None,
            warnings: Vec::new(),
            failed_clips: HashSet::new(),
            export: None,
        };
        engine.check_durations();
        engine
    }

    pub fn state(&self) -> EngineState {
        self.controller.state()
    }

    pub fn master(&self) -> &M {
        &self.master
    }

    /// Direct access for drivers that advance the master themselves.
    pub fn master_mut(&mut self) -> &mut M {
        &mut self.master
    }

    pub fn visual(&self) -> &V {
        &self.visual
    }

    pub fn controller(&self) -> &SyncController {
        &self.controller
    }

    /// Current clip snapshot.
    pub fn clips(&self) -> Arc<ClipSequence> {
        Arc::clone(&self.clips)
    }

    /// Current cue snapshot.
    pub fn cues(&self) -> Arc<CueStore> {
        Arc::clone(&self.cues)
    }

    pub fn style(&self) -> &StyleConfig {
        &self.style
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn ripple_sync(&self) -> bool {
        self.edit_options.ripple
    }

    /// How the loaded clip covers the output, once its native size is known.
    pub fn placement(&self) -> Option<CoverPlacement> {
        self.controller.loaded_clip()?;
        let (width, height) = self.visual.native_size()?;
        CoverPlacement::compute(width, height, self.settings.output)
    }

    /// Report of the most recent tick or seek.
    pub fn last_report(&self) -> Option<&TickReport> {
        self.last_report.as_ref()
    }

    pub fn warnings(&self) -> &[EngineWarning] {
        &self.warnings
    }

    /// Drain warnings raised so far.
    pub fn take_warnings(&mut self) -> Vec<EngineWarning> {
        std::mem::take(&mut self.warnings)
    }

    /// Latest composited frame, for display.
    pub fn current_composite(&self) -> Option<&RgbaImage> {
        self.composite.as_ref()
    }

    /// Run one tick. Never fails: problems surface in the outcome or as
    /// warnings.
    pub fn advance_tick(&mut self) -> TickOutcome {
        if !self.controller.state().is_running() {
            return TickOutcome::Idle;
        }

        let clips = Arc::clone(&self.clips);
        let cues = Arc::clone(&self.cues);
        let report = self
            .controller
            .tick(&mut self.master, &mut self.visual, &clips, &cues);
        self.last_report = Some(report);

        if report.ended {
            return match self.export.take() {
                Some(run) => self.finish_export(run),
                None => {
                    self.master.pause();
                    tracing::info!(time_secs = report.master_secs, "Playback ended");
                    TickOutcome::Ended
                }
            };
        }

        self.note_source_failure(&report);
        self.render(&report);

        if let Some(run) = self.export.as_mut() {
            let time_ns = RateController::secs_to_ns(report.master_secs);
            if run.rate.should_tick(time_ns) {
                if let Some(frame) = self.composite.as_ref() {
                    match run.sink.push_frame(frame, report.master_secs) {
                        Ok(()) => run.frames += 1,
                        Err(e) => return self.abort_export(e),
                    }
                }
            }
        }

        TickOutcome::Rendered {
            time_secs: report.master_secs,
            clip: report.clip,
            cue: report.cue,
        }
    }

    /// Jump to `time_secs` and re-render immediately.
    pub fn seek(&mut self, time_secs: f64) -> LyricutResult<()> {
        if self.controller.state() == EngineState::Exporting {
            return Err(LyricutError::invalid_state("Cannot seek while exporting"));
        }
        if !time_secs.is_finite() {
            return Err(LyricutError::invalid_edit(format!(
                "seek target must be finite, got {time_secs}"
            )));
        }

        self.master.seek(time_secs.max(0.0));
        let t = self.master.position();
        tracing::debug!(time_secs = t, "Seek");
        self.reconcile_now(t, ReconcileMode::Seek);
        Ok(())
    }

    /// Start or pause preview playback.
    pub fn set_playing(&mut self, playing: bool) -> LyricutResult<()> {
        if self.controller.state() == EngineState::Exporting {
            return Err(LyricutError::invalid_state(
                "Playback cannot be toggled while exporting",
            ));
        }

        if playing {
            self.master.set_volume(self.settings.master_volume);
            self.visual.set_volume(self.settings.clip_volume);
            self.master.play();
            self.controller.start_playing();
            tracing::info!(time_secs = self.master.position(), "Playback started");
        } else {
            self.master.pause();
            self.visual.pause();
            self.controller.stop();
            tracing::info!(time_secs = self.master.position(), "Playback paused");
        }
        Ok(())
    }

    /// Rewind to the start and record until the master clock ends.
    pub fn start_export(
        &mut self,
        mut sink: Box<dyn ExportSink>,
        export: &ExportSettings,
    ) -> LyricutResult<SinkCapabilities> {
        if self.export.is_some() {
            return Err(LyricutError::invalid_state("An export is already running"));
        }
        if (export.width, export.height) != (self.settings.output.width, self.settings.output.height)
        {
            return Err(LyricutError::export(format!(
                "Export size {}x{} differs from engine output {}x{}",
                export.width, export.height, self.settings.output.width, self.settings.output.height
            )));
        }

        let capabilities = sink.start(export)?;
        if !capabilities.audio {
            tracing::warn!(sink = sink.name(), "Exporting without audio");
            self.warnings.push(EngineWarning::VideoOnlyExport);
        }

        self.master.pause();
        self.master.seek(0.0);
        self.controller.invalidate_source();
        self.reconcile_now(0.0, ReconcileMode::Seek);

        self.master.set_volume(self.settings.master_volume);
        self.visual.set_volume(self.settings.clip_volume);
        self.controller.start_exporting();
        self.master.play();

        tracing::info!(
            sink = sink.name(),
            output = %export.output_path.display(),
            fps = export.fps,
            audio = capabilities.audio,
            "Export started"
        );

        self.export = Some(ExportRun {
            sink,
            rate: RateController::new(export.fps),
            frames: 0,
        });
        Ok(capabilities)
    }

    /// Stop an export early and collect whatever was recorded.
    pub fn stop_export(&mut self) -> LyricutResult<ExportArtifact> {
        let mut run = self
            .export
            .take()
            .ok_or_else(|| LyricutError::invalid_state("No export is running"))?;
        self.master.pause();
        self.visual.pause();
        self.controller.stop();
        tracing::info!(frames = run.frames, "Export stopped");
        run.sink.stop()
    }

    /// Apply a cue edit and publish the new snapshot.
    pub fn mutate_cue(&mut self, edit: &CueEdit) -> LyricutResult<Arc<CueStore>> {
        let next = self
            .cues
            .apply(edit, &self.edit_options)
            .map_err(|e| LyricutError::invalid_edit(e.to_string()))?;
        self.cues = Arc::new(next);
        tracing::debug!(version = self.cues.version(), ?edit, "Cue edit applied");
        self.refresh_if_idle();
        Ok(Arc::clone(&self.cues))
    }

    /// Apply a clip edit and publish the new snapshot.
    pub fn mutate_clip(&mut self, edit: &ClipEdit) -> LyricutResult<Arc<ClipSequence>> {
        let next = self
            .clips
            .apply(edit)
            .map_err(|e| LyricutError::invalid_edit(e.to_string()))?;
        self.clips = Arc::new(next);
        tracing::debug!(version = self.clips.version(), ?edit, "Clip edit applied");
        self.check_durations();
        self.refresh_if_idle();
        Ok(Arc::clone(&self.clips))
    }

    /// Swap in a cue snapshot produced elsewhere (e.g. a fresh import).
    pub fn replace_cues(&mut self, cues: Arc<CueStore>) {
        self.cues = cues;
        self.refresh_if_idle();
    }

    pub fn set_style(&mut self, style: StyleConfig) -> LyricutResult<()> {
        style
            .validate()
            .map_err(|e| LyricutError::config(e.to_string()))?;
        self.style = style;
        self.refresh_if_idle();
        Ok(())
    }

    pub fn set_ripple_sync(&mut self, enabled: bool) {
        self.edit_options.ripple = enabled;
    }

    /// Composite the current position without advancing anything.
    pub fn refresh(&mut self) -> Option<&RgbaImage> {
        let t = self.master.position();
        self.reconcile_now(t, ReconcileMode::Seek);
        self.composite.as_ref()
    }

    fn refresh_if_idle(&mut self) {
        if !self.controller.state().is_running() && self.composite.is_some() {
            self.refresh();
        }
    }

    fn reconcile_now(&mut self, t: f64, mode: ReconcileMode) {
        let clips = Arc::clone(&self.clips);
        let cues = Arc::clone(&self.cues);
        let report =
            self.controller
                .reconcile(t, mode, &mut self.master, &mut self.visual, &clips, &cues);
        self.note_source_failure(&report);
        self.render(&report);
        self.last_report = Some(report);
    }

    fn render(&mut self, report: &TickReport) {
        if report.switched {
            if let Some(placement) = self.placement() {
                tracing::debug!(
                    width = placement.source_width,
                    height = placement.source_height,
                    scale = placement.scale,
                    "Clip covers output"
                );
            }
        }
        let cue = report.cue.and_then(|id| self.cues.get(id));
        let visual = match report.clip {
            Some(_) if self.visual.readiness() == Readiness::Ready => self.visual.frame(),
            _ => None,
        };
        match self
            .compositor
            .composite(visual, cue, &self.style, self.settings.output)
        {
            Ok(frame) => self.composite = Some(frame),
            Err(e) => {
                tracing::warn!(error = %e, time_secs = report.master_secs, "Compositing failed");
            }
        }
    }

    fn note_source_failure(&mut self, report: &TickReport) {
        let Some(clip_id) = report.clip else {
            return;
        };
        if self.visual.readiness() != Readiness::Failed || !self.failed_clips.insert(clip_id) {
            return;
        }
        let source = self
            .clips
            .get(clip_id)
            .map(|c| c.source.clone())
            .unwrap_or_else(|| SourceHandle::new("<removed>"));
        tracing::warn!(clip_id = %clip_id, source = %source, "Clip failed to load; continuing audio-only");
        self.warnings.push(EngineWarning::SourceLoadFailed {
            clip: clip_id,
            source,
        });
    }

    fn check_durations(&mut self) {
        let Some(audio_secs) = self.master.duration() else {
            return;
        };
        self.warnings
            .retain(|w| !matches!(w, EngineWarning::ClipsShorterThanAudio(_)));
        if let Some(warning) = self.clips.duration_warning(audio_secs) {
            tracing::warn!(
                audio_secs = warning.audio_secs,
                visible_secs = warning.visible_secs,
                "Clips are shorter than the audio"
            );
            self.warnings
                .push(EngineWarning::ClipsShorterThanAudio(warning));
        }
    }

    fn finish_export(&mut self, mut run: ExportRun) -> TickOutcome {
        self.master.pause();
        self.visual.pause();
        let outcome = match run.sink.stop() {
            Ok(artifact) => {
                tracing::info!(
                    frames = run.frames,
                    path = %artifact.path.display(),
                    "Export finished"
                );
                TickOutcome::ExportFinished(artifact)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Export sink failed to finalize");
                TickOutcome::ExportFailed(e.to_string())
            }
        };
        self.rewind();
        outcome
    }

    fn abort_export(&mut self, error: LyricutError) -> TickOutcome {
        tracing::warn!(error = %error, "Export aborted");
        if let Some(mut run) = self.export.take() {
            if let Err(e) = run.sink.stop() {
                tracing::debug!(error = %e, "Sink stop after failure also failed");
            }
        }
        self.master.pause();
        self.visual.pause();
        self.controller.stop();
        TickOutcome::ExportFailed(error.to_string())
    }

    fn rewind(&mut self) {
        self.master.seek(0.0);
        self.reconcile_now(0.0, ReconcileMode::Seek);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeMaster, FakeVisual, MemorySink};
    use lyricut_project_model::{Cue, SourceHandle};
    use lyricut_render_engine::FontBook;

    fn engine(master: FakeMaster) -> PlaybackEngine<FakeMaster, FakeVisual> {
        let clips = ClipSequence::new()
            .apply(&ClipEdit::Append {
                source: SourceHandle::new("red.mp4"),
                original_duration: 4.0,
            })
            .unwrap();
        let cues = CueStore::from_cues(vec![
            Cue::new(CueId(0), 2.0, Some(5.0), "가", "A"),
            Cue::new(CueId(1), 5.0, Some(8.0), "나", "B"),
        ]);
        PlaybackEngine::new(
            master,
            FakeVisual::with_palette(&[("red.mp4", [255, 0, 0, 255])]),
            Compositor::new(Box::new(FontBook::empty())),
            Arc::new(clips),
            Arc::new(cues),
            StyleConfig::default(),
            EngineSettings {
                output: OutputSize::new(32, 18),
                ..EngineSettings::default()
            },
        )
    }

    #[test]
    fn test_duration_warning_is_raised() {
        let engine = engine(FakeMaster::paused(0.0, 10.0));
        assert!(matches!(
            engine.warnings(),
            [EngineWarning::ClipsShorterThanAudio(_)]
        ));
        assert_eq!(
            engine.warnings()[0].to_string(),
            "Video is too short! Music is 10s, but video is only 4s."
        );
    }

    #[test]
    fn test_placement_follows_loaded_clip() {
        let mut engine = engine(FakeMaster::paused(0.0, 10.0));
        assert_eq!(engine.placement(), None);

        engine.seek(1.0).unwrap();
        let placement = engine.placement().unwrap();
        assert_eq!((placement.source_width, placement.source_height), (16, 9));
        assert!((placement.scale - 2.0).abs() < 1e-9);

        engine.seek(6.0).unwrap();
        assert_eq!(engine.placement(), None);
    }

    #[test]
    fn test_idle_tick_does_nothing() {
        let mut engine = engine(FakeMaster::paused(0.0, 10.0));
        assert_eq!(engine.advance_tick(), TickOutcome::Idle);
        assert!(engine.current_composite().is_none());
    }

    #[test]
    fn test_seek_renders_immediately() {
        let mut engine = engine(FakeMaster::paused(0.0, 10.0));
        engine.seek(1.0).unwrap();
        let frame = engine.current_composite().unwrap();
        assert_eq!(frame.get_pixel(0, 0).0, [255, 0, 0, 255]);

        // Past the clips: placeholder.
        engine.seek(6.0).unwrap();
        let frame = engine.current_composite().unwrap();
        assert_eq!(frame.get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(engine.last_report().and_then(|r| r.cue), Some(CueId(1)));
    }

    #[test]
    fn test_ripple_edit_through_engine() {
        let mut engine = engine(FakeMaster::paused(0.0, 10.0));
        engine.set_ripple_sync(true);
        let before = engine.cues();
        let after = engine
            .mutate_cue(&CueEdit::CommitEnd {
                id: CueId(0),
                end: 7.0,
                original_end: Some(5.0),
            })
            .unwrap();
        assert_eq!(after.get(CueId(1)).map(|c| (c.start, c.end)), Some((7.0, Some(10.0))));
        // The old snapshot is untouched.
        assert_eq!(before.get(CueId(1)).map(|c| c.start), Some(5.0));
        assert!(after.version() > before.version());
    }

    #[test]
    fn test_invalid_clip_edit_is_rejected() {
        let mut engine = engine(FakeMaster::paused(0.0, 10.0));
        let err = engine
            .mutate_clip(&ClipEdit::SetTrim {
                id: ClipId(0),
                trim_in: 3.0,
                trim_out: 3.0,
            })
            .unwrap_err();
        assert!(err.is_invalid_edit());
        assert_eq!(engine.clips().get(ClipId(0)).map(|c| c.trim_out), Some(4.0));
    }

    #[test]
    fn test_seek_and_pause_rejected_while_exporting() {
        let mut engine = engine(FakeMaster::paused(0.0, 10.0));
        let settings = ExportSettings {
            output_path: "song_cinematic.webm".into(),
            width: 32,
            height: 18,
            fps: 30,
            video_bitrate_kbps: 8000,
            audio_bitrate_kbps: 192,
            audio_path: None,
            duration_secs: Some(10.0),
        };
        engine
            .start_export(Box::new(MemorySink::new(true)), &settings)
            .unwrap();
        assert_eq!(engine.state(), EngineState::Exporting);
        assert!(engine.seek(3.0).is_err());
        assert!(engine.set_playing(false).is_err());

        let artifact = engine.stop_export().unwrap();
        assert_eq!(artifact.frames, 0);
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(engine.seek(3.0).is_ok());
    }

    #[test]
    fn test_invalid_style_is_rejected() {
        let mut engine = engine(FakeMaster::paused(0.0, 10.0));
        let mut style = StyleConfig::default();
        style.primary.color = "white".to_string();
        assert!(engine.set_style(style).is_err());
        assert_eq!(engine.style(), &StyleConfig::default());
    }
}
