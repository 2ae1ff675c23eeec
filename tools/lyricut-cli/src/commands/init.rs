//! Initialize a new Lyricut project.

use std::path::PathBuf;

use lyricut_common::config::AppConfig;
use lyricut_project_model::{AudioTrackRef, ExportConfig, LoadedProject};
use lyricut_render_engine::probe::probe_duration_secs;

use super::save_project;

pub fn run(
    config: &AppConfig,
    name: String,
    output: PathBuf,
    audio: Option<PathBuf>,
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<u32>,
) -> anyhow::Result<()> {
    let project_dir = output.join(&name);
    println!("Creating project '{}' at {}", name, project_dir.display());

    let defaults = &config.output;
    let export = ExportConfig {
        width: width.unwrap_or(defaults.width),
        height: height.unwrap_or(defaults.height),
        fps: fps.unwrap_or(defaults.fps),
        video_bitrate_kbps: defaults.video_bitrate_kbps,
        audio_bitrate_kbps: defaults.audio_bitrate_kbps,
    };

    let mut project = LoadedProject::create(&project_dir, &name, export.clone())
        .map_err(|e| anyhow::anyhow!("Failed to create project: {e}"))?;

    if let Some(audio) = audio {
        let duration_secs = probe_duration_secs(&audio).ok_or_else(|| {
            anyhow::anyhow!("Could not read the duration of {}", audio.display())
        })?;
        let audio = std::fs::canonicalize(&audio).unwrap_or(audio);
        project.project.audio = Some(AudioTrackRef {
            path: audio.to_string_lossy().into_owned(),
            duration_secs,
        });
        save_project(&project)?;
        println!("  Audio: {} ({duration_secs:.1}s)", audio.display());
    }

    println!("Project created successfully:");
    println!("  Directory: {}", project.root.display());
    println!(
        "  Output: {}x{} @ {}fps",
        export.width, export.height, export.fps
    );
    println!();
    println!("Directory structure:");
    println!("  {}/", name);
    println!("  ├── sources/     (video clips)");
    println!("  ├── meta/        (project.json)");
    println!("  └── exports/     (rendered videos, subtitles)");

    Ok(())
}
