//! Render one composited frame to PNG.

use std::path::PathBuf;

use lyricut_common::config::AppConfig;
use lyricut_sync_engine::SteppedClock;

use super::{build_engine, load_project, print_warnings, timeline_secs};

pub fn run(config: &AppConfig, path: PathBuf, time: f64, output: PathBuf) -> anyhow::Result<()> {
    let project = load_project(&path)?;
    let fps = project.project.export.fps;

    let clock = SteppedClock::new(fps, timeline_secs(&project));
    let mut engine = build_engine(config, &project, clock, fps);
    engine.seek(time)?;
    print_warnings(&mut engine);

    let report = engine.last_report().copied();
    let placement = engine.placement();
    let frame = engine
        .current_composite()
        .ok_or_else(|| anyhow::anyhow!("No frame was composited at {time:.2}s"))?;
    frame
        .save(&output)
        .map_err(|e| anyhow::anyhow!("Failed to write {}: {e}", output.display()))?;

    println!("Frame at {time:.2}s written to {}", output.display());
    if let Some(report) = report {
        match report.clip {
            Some(clip) => println!(
                "  Clip: {clip} at {:.2}s",
                report.local_time.unwrap_or_default()
            ),
            None => println!("  Clip: (placeholder)"),
        }
        if let Some(p) = placement {
            println!(
                "  Source: {}x{} scaled {:.3}x",
                p.source_width, p.source_height, p.scale
            );
        }
        if let Some(cue) = report.cue.and_then(|id| engine.cues().get(id).cloned()) {
            println!("  Cue: {} / {}", cue.primary, cue.secondary);
        }
    }
    Ok(())
}
