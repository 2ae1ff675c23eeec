//! Lyricut Sync Engine
//!
//! Keeps the active video clip locked to the music. The audio track is the
//! master clock; every tick resolves which clip covers the master position,
//! switches sources at clip boundaries, re-snaps the clip when it drifts,
//! and composites the frame with the active lyric cue.
//!
//! # Tick
//!
//! ```text
//! MasterClock ── position ──┐
//!                           ├── SyncController ── load / seek / play / pause ──▶ VisualSource
//! ClipSequence ── resolve ──┘          │
//!                                      ▼
//! CueStore ── active cue ──────▶ Compositor ── RgbaImage ──▶ preview / ExportSink
//! ```
//!
//! Real-time preview runs under [`scheduler::run_realtime`]; offline export
//! steps frame by frame with [`offline::run_stepped`].

pub mod controller;
pub mod engine;
pub mod media;
pub mod offline;
pub mod scheduler;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use controller::{EngineState, ReconcileMode, SyncController, TickReport};
pub use engine::*;
pub use media::{MasterClock, Readiness, VisualSource};
pub use offline::{run_stepped, FfmpegClipSource, SteppedClock};
pub use scheduler::{run_realtime, RunSummary};
