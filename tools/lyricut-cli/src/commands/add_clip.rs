//! Append a video clip to the sequence.

use std::path::PathBuf;

use lyricut_project_model::{ClipEdit, SourceHandle};
use lyricut_render_engine::probe::probe_duration_secs;

use super::{load_project, save_project};

pub fn run(path: PathBuf, file: PathBuf, duration: Option<f64>) -> anyhow::Result<()> {
    let mut project = load_project(&path)?;

    let original_duration = match duration {
        Some(secs) => secs,
        None => probe_duration_secs(&file)
            .ok_or_else(|| anyhow::anyhow!("Could not read the duration of {}", file.display()))?,
    };

    let file = std::fs::canonicalize(&file).unwrap_or(file);
    let clips = project.project.clip_sequence();
    let id = clips.peek_next_id();
    let clips = clips
        .apply(&ClipEdit::Append {
            source: SourceHandle::new(file.to_string_lossy()),
            original_duration,
        })
        .map_err(|e| anyhow::anyhow!("Cannot add clip: {e}"))?;

    project.project.set_clips(&clips);
    save_project(&project)?;

    println!("Added clip {id}: {} ({original_duration:.2}s)", file.display());
    println!(
        "  Sequence: {} clip(s), {:.2}s visible",
        clips.len(),
        clips.total_visible_duration()
    );
    if let Some(audio) = &project.project.audio {
        if let Some(warning) = clips.duration_warning(audio.duration_secs) {
            println!("  [WARN] {warning}");
        }
    }

    Ok(())
}
