//! Import aligned cues from a saved alignment response.

use std::path::PathBuf;

use lyricut_alignment::{AlignmentRequest, AlignmentService, RecordedResponse};

use super::{load_project, save_project};

pub fn run(
    path: PathBuf,
    response: PathBuf,
    transcript: Option<PathBuf>,
    lyrics: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut project = load_project(&path)?;

    let lyrics = lyrics
        .map(std::fs::read_to_string)
        .transpose()
        .map_err(|e| anyhow::anyhow!("Failed to read lyrics: {e}"))?;
    let request = match transcript {
        Some(transcript) => {
            let json = std::fs::read_to_string(&transcript)
                .map_err(|e| anyhow::anyhow!("Failed to read transcript: {e}"))?;
            AlignmentRequest::from_transcript_json(&json, lyrics)?
        }
        None => AlignmentRequest {
            words: Vec::new(),
            lyrics,
        },
    };

    let service = RecordedResponse::new(&response);
    println!("Importing cues via '{}' from {}", service.name(), response.display());

    // A rejected response leaves the project untouched.
    let aligned = service.align(&request)?;
    if let Some(title) = &aligned.title {
        println!("  Title: {title}");
    }
    let store = aligned.into_store();
    project.project.set_cues(&store);
    save_project(&project)?;

    println!("  Imported {} cue(s)", store.len());
    Ok(())
}
