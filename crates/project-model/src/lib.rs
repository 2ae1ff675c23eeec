//! Lyricut Project Model
//!
//! Defines the core data contracts for Lyricut projects:
//! - **Cues:** Timed bilingual subtitle entries and the ripple-editing store
//! - **Clips:** Trimmed video segments and global-time resolution
//! - **Style:** Presentation attributes for the two text layers
//! - **Project:** Top-level manifest tying audio, clips, cues, and export settings
//!
//! Stores are immutable snapshots: every accepted edit produces a new
//! store with a bumped version, so readers never observe a torn list.

pub mod clip;
pub mod cue;
pub mod edit;
pub mod project;
pub mod style;

pub use clip::*;
pub use cue::*;
pub use edit::*;
pub use project::*;
pub use style::*;
