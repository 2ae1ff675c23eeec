//! Insert a placeholder cue.

use std::path::PathBuf;

use lyricut_project_model::{CueEdit, EditOptions};

use super::{load_project, save_project};

pub fn run(path: PathBuf, at: f64) -> anyhow::Result<()> {
    let mut project = load_project(&path)?;
    let store = project.project.cue_store();
    let id = store.peek_next_id();

    let store = store
        .apply(&CueEdit::Insert { at }, &EditOptions::default())
        .map_err(|e| anyhow::anyhow!("Cannot insert cue: {e}"))?;
    project.project.set_cues(&store);
    save_project(&project)?;

    if let Some(cue) = store.get(id) {
        println!(
            "Inserted cue {id} at {:.2}s: {} / {}",
            cue.start, cue.primary, cue.secondary
        );
    }
    Ok(())
}
