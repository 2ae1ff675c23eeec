//! Validate a Lyricut project.

use std::path::PathBuf;

use super::load_project;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    println!("Validating project at: {}", path.display());

    let project = load_project(&path)?;
    let p = &project.project;

    println!("  Name: {}", p.name);
    println!("  Version: {}", p.version);
    println!(
        "  Output: {}x{} @ {}fps",
        p.export.width, p.export.height, p.export.fps
    );
    println!("  Clips: {}", p.clips.len());
    println!("  Cues: {}", p.cues.len());

    let mut errors = project.validate_sources();
    if let Some(audio) = &p.audio {
        if let Some(warning) = p.clip_sequence().duration_warning(audio.duration_secs) {
            // Not fatal: the tail plays over the placeholder.
            println!("  [WARN] {warning}");
        }
    }
    if p.cues.is_empty() {
        errors.push("No cues imported".to_string());
    }

    if errors.is_empty() {
        println!("  Sources: All present");
        println!("\nProject is valid.");
    } else {
        println!("\nValidation issues:");
        for error in &errors {
            println!("  - {error}");
        }
        println!(
            "\n{} issue(s) found. Project may not be fully usable.",
            errors.len()
        );
    }

    Ok(())
}
