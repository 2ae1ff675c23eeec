//! Alignment service seam and response parsing.
//!
//! Transcription and translation happen outside Lyricut. The service takes
//! word-level timestamps plus optional reference lyrics and answers with a
//! cue list:
//!
//! ```json
//! { "subtitles": [ { "time": 1.2, "endTime": 3.4, "en": "...", "ko": "..." } ],
//!   "title": "song" }
//! ```
//!
//! An import either yields a complete, valid cue list or fails as a whole.

use std::path::{Path, PathBuf};

use lyricut_common::error::LyricutError;
use lyricut_project_model::{Cue, CueId, CueStore};
use serde::{Deserialize, Serialize};

/// One transcribed word with timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedWord {
    pub word: String,
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
}

/// Input handed to an alignment service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignmentRequest {
    pub words: Vec<TimedWord>,

    /// Reference lyrics, when the user supplied them.
    #[serde(default)]
    pub lyrics: Option<String>,
}

impl AlignmentRequest {
    /// Build a request from a word-level transcript
    /// (`{"words": [{"word", "start", "end"}]}`).
    pub fn from_transcript_json(json: &str, lyrics: Option<String>) -> Result<Self, AlignmentError> {
        #[derive(Deserialize)]
        struct Transcript {
            #[serde(default)]
            words: Vec<TimedWord>,
        }

        let transcript: Transcript =
            serde_json::from_str(json).map_err(|e| AlignmentError::Malformed(e.to_string()))?;
        Ok(Self {
            words: transcript.words,
            lyrics: lyrics.filter(|l| !l.trim().is_empty()),
        })
    }
}

/// Successful alignment result.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentResponse {
    /// Cues in the order the service returned them, ids `0..n`.
    pub cues: Vec<Cue>,

    /// Title suggested by the service (usually the audio file stem).
    pub title: Option<String>,
}

impl AlignmentResponse {
    /// Sorted, versioned store built from the response.
    pub fn into_store(self) -> CueStore {
        CueStore::from_cues(self.cues)
    }
}

/// Something that turns timed words into cues.
pub trait AlignmentService {
    fn name(&self) -> &str;

    fn align(&self, request: &AlignmentRequest) -> Result<AlignmentResponse, AlignmentError>;
}

/// Service backed by a response the alignment endpoint already produced
/// and that was saved to disk.
///
/// The request is only logged; its words and lyrics do not affect the
/// returned cues, which always come from the saved file.
#[derive(Debug, Clone)]
pub struct RecordedResponse {
    path: PathBuf,
}

impl RecordedResponse {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl AlignmentService for RecordedResponse {
    fn name(&self) -> &str {
        "recorded"
    }

    fn align(&self, request: &AlignmentRequest) -> Result<AlignmentResponse, AlignmentError> {
        tracing::info!(
            path = %self.path.display(),
            words = request.words.len(),
            has_lyrics = request.lyrics.is_some(),
            "Loading recorded alignment response"
        );
        let json = std::fs::read_to_string(&self.path).map_err(|e| {
            AlignmentError::Service(format!("cannot read {}: {e}", self.path.display()))
        })?;
        parse_alignment_response(&json)
    }
}

/// Alignment failure. Any of these rejects the whole import.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AlignmentError {
    #[error("Alignment service failed: {0}")]
    Service(String),

    #[error("Malformed alignment response: {0}")]
    Malformed(String),

    #[error("Alignment response contains no subtitles")]
    Empty,

    #[error("Subtitle {index} is missing `{field}`")]
    MissingField { index: usize, field: &'static str },

    #[error("Subtitle {index} has invalid timing {start}..{end}")]
    InvalidTiming { index: usize, start: f64, end: f64 },
}

impl From<AlignmentError> for LyricutError {
    fn from(e: AlignmentError) -> Self {
        LyricutError::alignment(e.to_string())
    }
}

#[derive(Deserialize)]
struct RawResponse {
    subtitles: Option<Vec<RawSubtitle>>,
    title: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSubtitle {
    time: Option<f64>,
    end_time: Option<f64>,
    en: Option<String>,
    ko: Option<String>,
}

/// Parse and validate a service response.
///
/// The Korean line becomes the primary text and the English line the
/// secondary text.
pub fn parse_alignment_response(json: &str) -> Result<AlignmentResponse, AlignmentError> {
    let raw: RawResponse =
        serde_json::from_str(json).map_err(|e| AlignmentError::Malformed(e.to_string()))?;

    if let Some(error) = raw.error {
        return Err(AlignmentError::Service(error));
    }

    let subtitles = raw.subtitles.unwrap_or_default();
    if subtitles.is_empty() {
        return Err(AlignmentError::Empty);
    }

    let mut cues = Vec::with_capacity(subtitles.len());
    for (index, sub) in subtitles.into_iter().enumerate() {
        let missing = |field| AlignmentError::MissingField { index, field };
        let start = sub.time.ok_or_else(|| missing("time"))?;
        let end = sub.end_time.ok_or_else(|| missing("endTime"))?;
        let primary = sub.ko.ok_or_else(|| missing("ko"))?;
        let secondary = sub.en.ok_or_else(|| missing("en"))?;

        if !(start.is_finite() && end.is_finite() && start >= 0.0 && end > start) {
            return Err(AlignmentError::InvalidTiming { index, start, end });
        }

        cues.push(Cue::new(CueId(index as u64), start, Some(end), primary, secondary));
    }

    tracing::debug!(count = cues.len(), "Parsed alignment response");

    Ok(AlignmentResponse {
        cues,
        title: raw.title.filter(|t| !t.is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_response() {
        let json = r#"{
            "subtitles": [
                { "time": 0.5, "endTime": 2.0, "en": "Hello", "ko": "안녕" },
                { "time": 2.0, "endTime": 4.25, "en": "World", "ko": "세상" }
            ],
            "title": "greeting"
        }"#;
        let response = parse_alignment_response(json).unwrap();
        assert_eq!(response.title.as_deref(), Some("greeting"));
        assert_eq!(response.cues.len(), 2);
        assert_eq!(response.cues[0].id, CueId(0));
        assert_eq!(response.cues[0].primary, "안녕");
        assert_eq!(response.cues[0].secondary, "Hello");
        assert_eq!(response.cues[1].end, Some(4.25));

        let store = response.into_store();
        assert_eq!(store.active_at(2.0).map(|c| c.id), Some(CueId(1)));
    }

    #[test]
    fn test_empty_response_is_rejected() {
        assert_eq!(
            parse_alignment_response(r#"{"subtitles": []}"#),
            Err(AlignmentError::Empty)
        );
        assert_eq!(parse_alignment_response("{}"), Err(AlignmentError::Empty));
    }

    #[test]
    fn test_malformed_response_is_rejected() {
        assert!(matches!(
            parse_alignment_response("not json"),
            Err(AlignmentError::Malformed(_))
        ));
        assert!(matches!(
            parse_alignment_response(r#"{"subtitles": [{"time": "one"}]}"#),
            Err(AlignmentError::Malformed(_))
        ));
    }

    #[test]
    fn test_service_error_is_surfaced() {
        assert_eq!(
            parse_alignment_response(r#"{"error": "Internal Server Error"}"#),
            Err(AlignmentError::Service("Internal Server Error".to_string()))
        );
    }

    #[test]
    fn test_one_bad_cue_fails_the_whole_import() {
        let missing = r#"{"subtitles": [
            { "time": 0.0, "endTime": 1.0, "en": "a", "ko": "가" },
            { "time": 1.0, "en": "b", "ko": "나" }
        ]}"#;
        assert_eq!(
            parse_alignment_response(missing),
            Err(AlignmentError::MissingField {
                index: 1,
                field: "endTime"
            })
        );

        let inverted = r#"{"subtitles": [
            { "time": 3.0, "endTime": 3.0, "en": "a", "ko": "가" }
        ]}"#;
        assert!(matches!(
            parse_alignment_response(inverted),
            Err(AlignmentError::InvalidTiming { index: 0, .. })
        ));

        let negative = r#"{"subtitles": [
            { "time": -1.0, "endTime": 3.0, "en": "a", "ko": "가" }
        ]}"#;
        assert!(matches!(
            parse_alignment_response(negative),
            Err(AlignmentError::InvalidTiming { .. })
        ));
    }

    #[test]
    fn test_request_from_transcript() {
        let json = r#"{"text": "hi there", "words": [
            { "word": "hi", "start": 0.1, "end": 0.4 },
            { "word": "there", "start": 0.5, "end": 0.9 }
        ]}"#;
        let request = AlignmentRequest::from_transcript_json(json, Some("  ".to_string())).unwrap();
        assert_eq!(request.words.len(), 2);
        assert_eq!(request.words[1].word, "there");
        assert!(request.lyrics.is_none());
    }

    #[test]
    fn test_recorded_response_missing_file() {
        let service = RecordedResponse::new("/nonexistent/lyricut/response.json");
        let err = service.align(&AlignmentRequest::default()).unwrap_err();
        assert!(matches!(err, AlignmentError::Service(_)));

        let lyricut: LyricutError = err.into();
        assert!(matches!(lyricut, LyricutError::Alignment { .. }));
    }

    #[test]
    fn test_recorded_response_ignores_request_contents() {
        let dir = std::env::temp_dir().join(format!("lyricut_align_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("response.json");
        std::fs::write(
            &path,
            r#"{"subtitles": [{ "time": 1.0, "endTime": 2.0, "en": "a", "ko": "가" }]}"#,
        )
        .unwrap();

        let service = RecordedResponse::new(&path);
        let empty = service.align(&AlignmentRequest::default()).unwrap();
        let full = service
            .align(&AlignmentRequest {
                words: vec![TimedWord {
                    word: "other".to_string(),
                    start: 5.0,
                    end: 6.0,
                }],
                lyrics: Some("different lyrics".to_string()),
            })
            .unwrap();
        assert_eq!(empty, full);
        assert_eq!(full.cues.len(), 1);

        std::fs::remove_dir_all(&dir).ok();
    }
}
