//! Change a clip's trim points.

use std::path::PathBuf;

use lyricut_project_model::{ClipEdit, ClipId};

use super::{load_project, save_project};

pub fn run(path: PathBuf, clip: u64, trim_in: f64, trim_out: f64) -> anyhow::Result<()> {
    let mut project = load_project(&path)?;
    let id = ClipId(clip);

    let clips = project
        .project
        .clip_sequence()
        .apply(&ClipEdit::SetTrim {
            id,
            trim_in,
            trim_out,
        })
        .map_err(|e| anyhow::anyhow!("Trim rejected: {e}"))?;

    project.project.set_clips(&clips);
    save_project(&project)?;

    if let Some(c) = clips.get(id) {
        println!(
            "Clip {id}: {:.2}s..{:.2}s of {:.2}s ({:.2}s visible)",
            c.trim_in,
            c.trim_out,
            c.original_duration,
            c.visible_duration()
        );
    }
    println!("  Sequence: {:.2}s visible", clips.total_visible_duration());

    Ok(())
}
