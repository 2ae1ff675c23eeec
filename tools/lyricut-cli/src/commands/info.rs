//! Show project information.

use std::path::PathBuf;

use super::load_project;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    let project = load_project(&path)?;
    let p = &project.project;

    println!("Project: {}", p.name);
    println!("  ID: {}", p.id);
    println!("  Created: {}", p.created_at);
    println!("  Modified: {}", p.modified_at);
    println!();

    println!("Audio:");
    match &p.audio {
        Some(audio) => println!("  {} ({:.1}s)", audio.path, audio.duration_secs),
        None => println!("  (none)"),
    }
    println!();

    let clips = p.clip_sequence();
    println!("Clips ({:.2}s visible):", clips.total_visible_duration());
    for clip in clips.clips() {
        println!(
            "  #{} {}  [{:.2}..{:.2}] of {:.2}s",
            clip.id, clip.source, clip.trim_in, clip.trim_out, clip.original_duration
        );
    }
    println!();

    println!("Cues: {}", p.cues.len());
    println!("  Ripple sync: {}", if p.ripple_sync { "on" } else { "off" });
    println!();

    println!("Style:");
    println!(
        "  Primary: {}px {} at {}% ({:?})",
        p.style.primary.font_size,
        p.style.primary.color,
        p.style.primary.offset_pct,
        p.style.primary.anchor
    );
    println!(
        "  Secondary: {}px {} at {}% ({:?})",
        p.style.secondary.font_size,
        p.style.secondary.color,
        p.style.secondary.offset_pct,
        p.style.secondary.anchor
    );
    println!("  Font: {}", p.style.font_family);
    println!();

    println!("Export config:");
    println!(
        "  Output: {}x{} @ {}fps",
        p.export.width, p.export.height, p.export.fps
    );
    println!(
        "  Bitrate: {} kbps video, {} kbps audio",
        p.export.video_bitrate_kbps, p.export.audio_bitrate_kbps
    );
    println!("  File: {}", p.export_file_name());

    Ok(())
}
