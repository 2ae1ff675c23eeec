//! Export a project to WebM.

use std::path::PathBuf;
use std::time::Instant;

use lyricut_common::config::AppConfig;
use lyricut_render_engine::{
    progress_report, ExportProgress, ExportSettings, ExportStage, FfmpegExportSink,
};
use lyricut_sync_engine::{run_stepped, MasterClock, SteppedClock, TickOutcome};

use super::{build_engine, load_project, print_warnings, timeline_secs};

pub async fn run(config: AppConfig, path: PathBuf, output: Option<PathBuf>) -> anyhow::Result<()> {
    println!("Exporting project at: {}", path.display());

    let project = load_project(&path)?;
    if !FfmpegExportSink::is_available() {
        anyhow::bail!("ffmpeg was not found on PATH; it is required for export");
    }
    let duration_secs = timeline_secs(&project)
        .ok_or_else(|| anyhow::anyhow!("Nothing to export: no audio track and no clips"))?;

    let p = &project.project;
    let output_path =
        output.unwrap_or_else(|| project.exports_dir().join(p.export_file_name()));
    let settings = ExportSettings {
        output_path: output_path.clone(),
        width: p.export.width,
        height: p.export.height,
        fps: p.export.fps,
        video_bitrate_kbps: p.export.video_bitrate_kbps,
        audio_bitrate_kbps: p.export.audio_bitrate_kbps,
        audio_path: project.audio_path(),
        duration_secs: Some(duration_secs),
    };

    println!("  Output: {}", output_path.display());
    println!(
        "  Resolution: {}x{} @ {}fps",
        settings.width, settings.height, settings.fps
    );
    println!("  Duration: {duration_secs:.1}s");

    // Rendering is CPU-bound and drives blocking pipes.
    let outcome = tokio::task::spawn_blocking(move || -> anyhow::Result<TickOutcome> {
        let clock = SteppedClock::new(settings.fps, Some(duration_secs));
        let mut engine = build_engine(&config, &project, clock, settings.fps);
        engine.start_export(Box::new(FfmpegExportSink::new()), &settings)?;
        print_progress(&progress_report(0, 0.0, Some(duration_secs), 0.0));
        print_warnings(&mut engine);

        let started = Instant::now();
        let mut frames = 0u64;
        let outcome = run_stepped(&mut engine, |engine, outcome| {
            if let TickOutcome::Rendered { time_secs, .. } = outcome {
                frames += 1;
                if frames % u64::from(settings.fps.max(1)) == 0 {
                    let report = progress_report(
                        frames,
                        *time_secs,
                        engine.master().duration(),
                        started.elapsed().as_secs_f64(),
                    );
                    print_progress(&report);
                }
            }
        })?;
        print_warnings(&mut engine);
        Ok(outcome)
    })
    .await??;

    match outcome {
        TickOutcome::ExportFinished(artifact) => {
            print_progress(&ExportProgress {
                progress: 1.0,
                frames_rendered: artifact.frames,
                eta_secs: 0.0,
                stage: ExportStage::Complete,
            });
            println!("\nExport complete: {}", artifact.path.display());
            println!(
                "  {} frames, {:.1}s{}",
                artifact.frames,
                artifact.duration_secs,
                if artifact.has_audio { "" } else { " (video only)" }
            );
        }
        TickOutcome::ExportFailed(message) => {
            print_progress(&ExportProgress {
                progress: 0.0,
                frames_rendered: 0,
                eta_secs: 0.0,
                stage: ExportStage::Failed,
            });
            println!("\nExport failed: {message}");
        }
        other => println!("\nExport stopped early: {other:?}"),
    }

    Ok(())
}

fn print_progress(p: &ExportProgress) {
    match p.stage {
        ExportStage::Complete => print!("\r  Progress: 100.0% ({} frames)          ", p.frames_rendered),
        ExportStage::Failed => print!("\r  Progress: failed                          "),
        ExportStage::Preparing => println!("  Encoder started"),
        _ => print!(
            "\r  Progress: {:.1}% ({} frames, ETA: {:.0}s)  ",
            p.progress * 100.0,
            p.frames_rendered,
            p.eta_secs,
        ),
    }
}
