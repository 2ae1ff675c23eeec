//! Write subtitle files.

use std::path::PathBuf;

use lyricut_alignment::save_subtitles;

use super::load_project;
use crate::SubtitleFormat;

pub fn run(path: PathBuf, format: SubtitleFormat, output: Option<PathBuf>) -> anyhow::Result<()> {
    let project = load_project(&path)?;
    let store = project.project.cue_store();

    let extension = match format {
        SubtitleFormat::Srt => "srt",
        SubtitleFormat::Vtt => "vtt",
    };
    let output = output.unwrap_or_else(|| {
        let stem = project
            .project
            .export_file_name()
            .trim_end_matches(".webm")
            .to_string();
        project.exports_dir().join(format!("{stem}.{extension}"))
    });

    save_subtitles(&store, &output)?;
    println!("Wrote {} cue(s) to {}", store.len(), output.display());
    Ok(())
}
