//! Subtitle cues and the ripple-editing cue store.
//!
//! A cue is active on the half-open window `[start, end)`. Cues imported
//! from older data may lack an explicit end; their end is inferred from
//! the next cue's start, or [`DEFAULT_TAIL_SECS`] after the start for the
//! last cue.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::edit::{finite, EditError, EditOptions};

/// Inferred length of the last cue when it has no explicit end.
pub const DEFAULT_TAIL_SECS: f64 = 5.0;

/// Extension applied when a start edit overtakes the cue's end (and the
/// pull-back applied when an end edit undercuts the start).
pub const AUTO_EXTEND_SECS: f64 = 0.5;

/// Shortest window a cue may be left with after a correction.
pub const MIN_CUE_SECS: f64 = 0.1;

/// Window given to a freshly inserted cue.
pub const INSERT_DURATION_SECS: f64 = 3.0;

/// Placeholder texts for inserted cues.
pub const INSERT_PRIMARY_TEXT: &str = "새 자막";
pub const INSERT_SECONDARY_TEXT: &str = "New Subtitle";

/// Stable cue identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CueId(pub u64);

impl fmt::Display for CueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One timed bilingual subtitle entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    pub id: CueId,

    /// Start time in seconds (>= 0).
    pub start: f64,

    /// Exclusive end time in seconds. `None` for legacy cues.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,

    /// Primary-language text (drawn with the primary style).
    pub primary: String,

    /// Secondary-language text (drawn with the secondary style).
    pub secondary: String,
}

impl Cue {
    pub fn new(
        id: CueId,
        start: f64,
        end: Option<f64>,
        primary: impl Into<String>,
        secondary: impl Into<String>,
    ) -> Self {
        Self {
            id,
            start,
            end,
            primary: primary.into(),
            secondary: secondary.into(),
        }
    }
}

/// Direction of a keyboard nudge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nudge {
    Earlier,
    Later,
}

impl Nudge {
    fn signed(self, step: f64) -> f64 {
        match self {
            Nudge::Earlier => -step,
            Nudge::Later => step,
        }
    }
}

/// A single mutation of the cue list.
#[derive(Debug, Clone, PartialEq)]
pub enum CueEdit {
    /// Move a cue's start. Trims the predecessor if it now overlaps.
    SetStart { id: CueId, start: f64 },

    /// Live end edit while the user is still typing. Never touches other cues.
    SetEnd { id: CueId, end: f64 },

    /// Final end edit. With ripple on, every later cue shifts by the
    /// difference between `end` and `original_end` (or the cue's current
    /// end when no original was captured).
    CommitEnd {
        id: CueId,
        end: f64,
        original_end: Option<f64>,
    },

    /// Nudge the start of the selected cue by one step.
    NudgeStart { id: CueId, direction: Nudge },

    /// Nudge the end of the selected cue by one step, rippling immediately.
    NudgeEnd { id: CueId, direction: Nudge },

    /// Insert a placeholder cue at the playhead.
    Insert { at: f64 },

    /// Remove a cue. Neighbours are left as they are.
    Delete { id: CueId },

    /// Replace text without any timing side effects.
    SetText {
        id: CueId,
        primary: Option<String>,
        secondary: Option<String>,
    },
}

/// Ordered, versioned cue list.
///
/// The store is never mutated in place: [`CueStore::apply`] returns a new
/// snapshot, keeping `cues` sorted by start.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CueStore {
    cues: Vec<Cue>,
    version: u64,
    next_id: u64,
}

impl CueStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from imported or legacy cues, repairing what can be
    /// repaired locally: order, negative starts, and inverted windows.
    pub fn from_cues(mut cues: Vec<Cue>) -> Self {
        for cue in &mut cues {
            if !cue.start.is_finite() || cue.start < 0.0 {
                cue.start = 0.0;
            }
            if let Some(end) = cue.end {
                if !end.is_finite() || end <= cue.start {
                    tracing::warn!(
                        cue_id = %cue.id,
                        start = cue.start,
                        end,
                        "Repairing cue with inverted window"
                    );
                    cue.end = Some(cue.start + AUTO_EXTEND_SECS);
                }
            }
        }
        sort_by_start(&mut cues);
        let next_id = cues.iter().map(|c| c.id.0 + 1).max().unwrap_or(0);
        Self {
            cues,
            version: 0,
            next_id,
        }
    }

    /// Cues in non-decreasing start order.
    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Number of accepted edits since construction.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Identifier the next inserted cue will receive.
    pub fn peek_next_id(&self) -> CueId {
        CueId(self.next_id)
    }

    pub fn get(&self, id: CueId) -> Option<&Cue> {
        self.cues.iter().find(|c| c.id == id)
    }

    pub fn index_of(&self, id: CueId) -> Option<usize> {
        self.cues.iter().position(|c| c.id == id)
    }

    /// End of the cue at `index`, inferring it when absent.
    pub fn effective_end(&self, index: usize) -> f64 {
        effective_end(&self.cues, index)
    }

    /// The cue whose window contains `time`.
    ///
    /// When windows overlap the first cue in sorted order wins.
    pub fn active_at(&self, time: f64) -> Option<&Cue> {
        for (index, cue) in self.cues.iter().enumerate() {
            if cue.start > time {
                break;
            }
            if time < effective_end(&self.cues, index) {
                return Some(cue);
            }
        }
        None
    }

    /// Apply an edit, producing the next snapshot.
    pub fn apply(&self, edit: &CueEdit, options: &EditOptions) -> Result<CueStore, EditError> {
        let mut cues = self.cues.clone();
        let mut next_id = self.next_id;

        match edit {
            CueEdit::SetStart { id, start } => {
                let index = self.require(*id)?;
                let start = finite("start", *start)?.max(0.0);
                set_start(&mut cues, index, start);
                if index > 0 {
                    clamp_predecessor(&mut cues[index - 1], start);
                }
            }
            CueEdit::SetEnd { id, end } => {
                let index = self.require(*id)?;
                set_end(&mut cues[index], finite("end", *end)?);
            }
            CueEdit::CommitEnd {
                id,
                end,
                original_end,
            } => {
                let index = self.require(*id)?;
                let end = finite("end", *end)?;
                let old_end = match original_end {
                    Some(value) => finite("original_end", *value)?,
                    None => self.effective_end(index),
                };
                commit_end(&mut cues, index, end, old_end, options.ripple);
            }
            CueEdit::NudgeStart { id, direction } => {
                let index = self.require(*id)?;
                let start = (cues[index].start + direction.signed(options.nudge_step_secs)).max(0.0);
                set_start(&mut cues, index, start);
            }
            CueEdit::NudgeEnd { id, direction } => {
                let index = self.require(*id)?;
                let old_end = self.effective_end(index);
                let end = old_end + direction.signed(options.nudge_step_secs);
                commit_end(&mut cues, index, end, old_end, options.ripple);
            }
            CueEdit::Insert { at } => {
                let start = finite("at", *at)?.max(0.0);
                cues.push(Cue::new(
                    CueId(next_id),
                    start,
                    Some(start + INSERT_DURATION_SECS),
                    INSERT_PRIMARY_TEXT,
                    INSERT_SECONDARY_TEXT,
                ));
                next_id += 1;
            }
            CueEdit::Delete { id } => {
                let index = self.require(*id)?;
                cues.remove(index);
            }
            CueEdit::SetText {
                id,
                primary,
                secondary,
            } => {
                let index = self.require(*id)?;
                if let Some(text) = primary {
                    cues[index].primary = text.clone();
                }
                if let Some(text) = secondary {
                    cues[index].secondary = text.clone();
                }
            }
        }

        sort_by_start(&mut cues);
        Ok(CueStore {
            cues,
            version: self.version + 1,
            next_id,
        })
    }

    fn require(&self, id: CueId) -> Result<usize, EditError> {
        self.index_of(id).ok_or(EditError::UnknownCue(id))
    }
}

fn effective_end(cues: &[Cue], index: usize) -> f64 {
    let cue = &cues[index];
    match cue.end {
        Some(end) => end,
        None => cues
            .get(index + 1)
            .map(|next| next.start)
            .unwrap_or(cue.start + DEFAULT_TAIL_SECS),
    }
}

fn sort_by_start(cues: &mut [Cue]) {
    cues.sort_by(|a, b| a.start.total_cmp(&b.start));
}

/// Move a cue's start, materialising its end when the window would close.
///
/// An inferred end collapses when the new start reaches the following
/// cue's start; the last cue's inferred end moves with its start.
fn set_start(cues: &mut [Cue], index: usize, start: f64) {
    let collapses = match cues[index].end {
        Some(end) => end <= start,
        None => cues.get(index + 1).is_some_and(|next| next.start <= start),
    };
    let cue = &mut cues[index];
    cue.start = start;
    if collapses {
        cue.end = Some(start + AUTO_EXTEND_SECS);
    }
}

/// Pull the predecessor's end back to `new_start` when it overlaps.
///
/// If the edited cue moved before the predecessor's own start the two
/// swap places on re-sort, and the predecessor is left alone.
fn clamp_predecessor(prev: &mut Cue, new_start: f64) {
    if let Some(end) = prev.end {
        if end > new_start && new_start > prev.start {
            prev.end = Some(new_start);
        }
    }
}

fn set_end(cue: &mut Cue, end: f64) {
    let end = end.max(MIN_CUE_SECS);
    cue.end = Some(end);
    if cue.start >= end {
        cue.start = (end - AUTO_EXTEND_SECS).max(0.0);
    }
}

fn commit_end(cues: &mut [Cue], index: usize, end: f64, old_end: f64, ripple: bool) {
    set_end(&mut cues[index], end);
    if !ripple {
        return;
    }
    let new_end = cues[index].end.unwrap_or(end);
    let delta = new_end - old_end;
    if delta == 0.0 {
        return;
    }
    tracing::debug!(
        cue_id = %cues[index].id,
        delta,
        shifted = cues.len() - index - 1,
        "Rippling end edit"
    );
    for cue in cues.iter_mut().skip(index + 1) {
        cue.start = (cue.start + delta).max(0.0);
        if let Some(end) = cue.end {
            cue.end = Some((end + delta).max(cue.start + MIN_CUE_SECS));
        }
    }
}
