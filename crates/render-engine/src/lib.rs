//! Lyricut Render Engine
//!
//! Turns the active clip frame and the active cue into output frames, and
//! hands those frames to an export sink.
//!
//! # Pipeline
//!
//! ```text
//! clip frame ──┐
//!              ├── plan_frame (cover placement, text layout)
//! active cue ──┘         │
//!                        ├── Compositor::render ── RgbaImage ── preview
//! style ─────────────────┘                              │
//!                                                       ▼
//!                                              ExportSink (ffmpeg, VP9/WebM)
//! ```

pub mod compositor;
pub mod export;
pub mod probe;
pub mod text;

pub use compositor::*;
pub use export::*;
pub use text::{FontBook, FontSpec, GlyphMask, TextRasterizer};
