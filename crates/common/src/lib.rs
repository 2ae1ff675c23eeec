//! Lyricut Common Utilities
//!
//! Shared infrastructure for all Lyricut crates:
//! - Error types and result aliases
//! - Clock and timing utilities for playback synchronization
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
