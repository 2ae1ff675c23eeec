//! Retime, retext, or delete one cue.

use std::path::PathBuf;

use lyricut_common::config::AppConfig;
use lyricut_project_model::{CueEdit, CueId, CueStore, EditOptions, Nudge};

use super::{load_project, save_project};
use crate::NudgeArg;

pub struct CueChanges {
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub nudge_start: Option<NudgeArg>,
    pub nudge_end: Option<NudgeArg>,
    pub primary: Option<String>,
    pub secondary: Option<String>,
    pub ripple: Option<bool>,
    pub delete: bool,
}

impl From<NudgeArg> for Nudge {
    fn from(arg: NudgeArg) -> Self {
        match arg {
            NudgeArg::Earlier => Nudge::Earlier,
            NudgeArg::Later => Nudge::Later,
        }
    }
}

/// Edits in the order they are applied.
fn edits_for(id: CueId, changes: &CueChanges) -> Vec<CueEdit> {
    if changes.delete {
        return vec![CueEdit::Delete { id }];
    }

    let mut edits = Vec::new();
    if let Some(start) = changes.start {
        edits.push(CueEdit::SetStart { id, start });
    }
    if let Some(direction) = changes.nudge_start {
        edits.push(CueEdit::NudgeStart {
            id,
            direction: direction.into(),
        });
    }
    if let Some(end) = changes.end {
        edits.push(CueEdit::CommitEnd {
            id,
            end,
            original_end: None,
        });
    }
    if let Some(direction) = changes.nudge_end {
        edits.push(CueEdit::NudgeEnd {
            id,
            direction: direction.into(),
        });
    }
    if changes.primary.is_some() || changes.secondary.is_some() {
        edits.push(CueEdit::SetText {
            id,
            primary: changes.primary.clone(),
            secondary: changes.secondary.clone(),
        });
    }
    edits
}

pub fn run(config: &AppConfig, path: PathBuf, cue: u64, changes: CueChanges) -> anyhow::Result<()> {
    let mut project = load_project(&path)?;
    let id = CueId(cue);

    let edits = edits_for(id, &changes);
    if edits.is_empty() {
        anyhow::bail!("Nothing to change; pass --start, --end, --primary, --secondary or --delete");
    }

    let options = EditOptions {
        ripple: changes.ripple.unwrap_or(project.project.ripple_sync),
        nudge_step_secs: config.playback.nudge_step_secs,
    };

    // All edits land or none do.
    let store = edits
        .iter()
        .try_fold(project.project.cue_store(), |store: CueStore, edit| {
            store.apply(edit, &options)
        })
        .map_err(|e| anyhow::anyhow!("Edit rejected: {e}"))?;

    project.project.set_cues(&store);
    save_project(&project)?;

    match store.index_of(id).and_then(|i| store.cues().get(i).map(|c| (i, c))) {
        Some((index, c)) => println!(
            "Cue {id}: {:.2} → {:.2}  {} / {}{}",
            c.start,
            store.effective_end(index),
            c.primary,
            c.secondary,
            if options.ripple { "  (ripple)" } else { "" }
        ),
        None => println!("Cue {id} deleted"),
    }
    Ok(())
}
