//! List cues.

use std::path::PathBuf;

use super::load_project;

pub fn run(path: PathBuf, json: bool) -> anyhow::Result<()> {
    let project = load_project(&path)?;
    let store = project.project.cue_store();

    if json {
        println!("{}", serde_json::to_string_pretty(store.cues())?);
        return Ok(());
    }

    println!("{} cue(s):", store.len());
    for (index, cue) in store.cues().iter().enumerate() {
        let end = store.effective_end(index);
        let inferred = if cue.end.is_none() { "*" } else { "" };
        println!(
            "  #{:<4} {:>8.2} → {:>8.2}{inferred:1}  {}",
            cue.id.0, cue.start, end, cue.primary
        );
        if !cue.secondary.is_empty() {
            println!("  {:>24}  {}", "", cue.secondary);
        }
    }
    if store.cues().iter().any(|c| c.end.is_none()) {
        println!();
        println!("  * end inferred from the next cue");
    }

    Ok(())
}
