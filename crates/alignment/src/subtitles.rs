//! Subtitle files in SRT and VTT formats.
//!
//! Each cue becomes one entry with the primary line above the secondary
//! line. Cues without an explicit end use the inferred end.

use std::path::Path;

use lyricut_common::error::LyricutResult;
use lyricut_project_model::CueStore;

/// Generate SRT content.
pub fn generate_srt(store: &CueStore) -> String {
    let mut output = String::new();

    for (i, cue) in store.cues().iter().enumerate() {
        output.push_str(&format!("{}\n", i + 1));
        output.push_str(&format!(
            "{} --> {}\n",
            format_timestamp(cue.start, ','),
            format_timestamp(store.effective_end(i), ','),
        ));
        push_lines(&mut output, &cue.primary, &cue.secondary);
    }

    output
}

/// Generate WebVTT content.
pub fn generate_vtt(store: &CueStore) -> String {
    let mut output = String::from("WEBVTT\n\n");

    for (i, cue) in store.cues().iter().enumerate() {
        output.push_str(&format!(
            "{} --> {}\n",
            format_timestamp(cue.start, '.'),
            format_timestamp(store.effective_end(i), '.'),
        ));
        push_lines(&mut output, &cue.primary, &cue.secondary);
    }

    output
}

fn push_lines(output: &mut String, primary: &str, secondary: &str) {
    for line in [primary, secondary] {
        let line = line.trim();
        if !line.is_empty() {
            output.push_str(line);
            output.push('\n');
        }
    }
    output.push('\n');
}

/// `HH:MM:SS<sep>mmm`, rounded to the nearest millisecond.
fn format_timestamp(secs: f64, separator: char) -> String {
    let total_ms = (secs.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02}{separator}{millis:03}")
}

/// Write subtitles to `path`; `.vtt` selects WebVTT, anything else SRT.
pub fn save_subtitles(store: &CueStore, path: &Path) -> LyricutResult<()> {
    let content = match path.extension().and_then(|e| e.to_str()) {
        Some("vtt") => generate_vtt(store),
        _ => generate_srt(store),
    };
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), cues = store.len(), "Subtitles written");
    Ok(())
}
