//! Lyricut Alignment
//!
//! Bridges the external lyric-alignment service and the cue store:
//! - **Alignment:** request types, the service seam, and strict parsing of
//!   the service's cue list
//! - **Subtitle Output:** SRT/VTT files generated from cues

pub mod alignment;
pub mod subtitles;

pub use alignment::*;
pub use subtitles::*;
