pub mod add_clip;
pub mod add_cue;
pub mod cues;
pub mod edit_cue;
pub mod export;
pub mod frame;
pub mod import;
pub mod info;
pub mod init;
pub mod play;
pub mod subtitles;
pub mod trim;
pub mod validate;

use std::path::Path;
use std::sync::Arc;

use lyricut_common::config::AppConfig;
use lyricut_project_model::LoadedProject;
use lyricut_render_engine::{Compositor, FontBook, OutputSize};
use lyricut_sync_engine::{EngineSettings, FfmpegClipSource, MasterClock, PlaybackEngine};

pub(crate) fn load_project(path: &Path) -> anyhow::Result<LoadedProject> {
    LoadedProject::load(path).map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))
}

pub(crate) fn save_project(project: &LoadedProject) -> anyhow::Result<()> {
    project
        .save()
        .map_err(|e| anyhow::anyhow!("Failed to save project: {e}"))
}

/// Timeline length: the audio track, or the clips when there is none.
pub(crate) fn timeline_secs(project: &LoadedProject) -> Option<f64> {
    match &project.project.audio {
        Some(audio) => Some(audio.duration_secs),
        None => {
            let visible = project.project.clip_sequence().total_visible_duration();
            (visible > 0.0).then_some(visible)
        }
    }
}

/// Engine over the project's clips, decoding at `decode_fps`.
pub(crate) fn build_engine<M: MasterClock>(
    config: &AppConfig,
    project: &LoadedProject,
    master: M,
    decode_fps: u32,
) -> PlaybackEngine<M, FfmpegClipSource> {
    let p = &project.project;
    let fonts = FontBook::load_or_system(&config.fonts);
    if fonts.is_empty() {
        tracing::warn!("No fonts available; lyrics will not be drawn");
    }

    let settings = EngineSettings::from_playback(
        &config.playback,
        OutputSize::new(p.export.width, p.export.height),
    );
    let mut engine = PlaybackEngine::new(
        master,
        FfmpegClipSource::new(project.root.clone(), decode_fps),
        Compositor::new(Box::new(fonts)),
        Arc::new(p.clip_sequence()),
        Arc::new(p.cue_store()),
        p.style.clone(),
        settings,
    );
    engine.set_ripple_sync(p.ripple_sync);
    engine
}

pub(crate) fn print_warnings<M: MasterClock>(engine: &mut PlaybackEngine<M, FfmpegClipSource>) {
    for warning in engine.take_warnings() {
        println!("  [WARN] {warning}");
    }
}
