//! Shared edit plumbing for cue and clip stores.

use crate::clip::ClipId;
use crate::cue::CueId;

/// Why an edit was refused. A refused edit leaves the store untouched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditError {
    #[error("No cue with id {0}")]
    UnknownCue(CueId),

    #[error("No clip with id {0}")]
    UnknownClip(ClipId),

    #[error("{field} must be a finite number, got {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("Trim in ({trim_in:.3}s) must be before trim out ({trim_out:.3}s)")]
    InvalidTrim { trim_in: f64, trim_out: f64 },

    #[error("Clip duration must be positive, got {0}")]
    InvalidDuration(f64),
}

/// Knobs that change how timing edits behave.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EditOptions {
    /// Global "sync" toggle: committed end edits shift every later cue.
    pub ripple: bool,

    /// Step used by keyboard nudges.
    pub nudge_step_secs: f64,
}

impl Default for EditOptions {
    fn default() -> Self {
        Self {
            ripple: false,
            nudge_step_secs: 0.5,
        }
    }
}

pub(crate) fn finite(field: &'static str, value: f64) -> Result<f64, EditError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EditError::NonFinite { field, value })
    }
}
