//! Trimmed video clips and global-time resolution.
//!
//! The clip sequence plays its clips back to back. A global timeline
//! position maps to exactly one clip through half-open segments
//! `[offset, offset + visible)`, so a boundary belongs to the clip that
//! starts there.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::edit::{finite, EditError};

/// Stable clip identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipId(pub u64);

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to a clip's media (file path or URL).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceHandle(pub String);

impl SourceHandle {
    pub fn new(source: impl Into<String>) -> Self {
        Self(source.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Interpret the handle as a local path.
    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl fmt::Display for SourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One trimmed video segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub id: ClipId,

    pub source: SourceHandle,

    /// First visible second of the source.
    pub trim_in: f64,

    /// Exclusive last visible second of the source.
    pub trim_out: f64,

    /// Full length of the source media in seconds.
    pub original_duration: f64,
}

impl Clip {
    /// Seconds this clip contributes to the timeline.
    pub fn visible_duration(&self) -> f64 {
        self.trim_out - self.trim_in
    }
}

/// Result of resolving a global time against the sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedClip<'a> {
    pub clip: &'a Clip,

    /// Position of the clip within the sequence.
    pub index: usize,

    /// Position inside the clip's source media (`trim_in` based).
    pub local_time: f64,

    /// Global time at which this clip starts.
    pub segment_offset: f64,
}

/// A single mutation of the clip sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum ClipEdit {
    /// Add a clip at the end with a full-length trim.
    Append {
        source: SourceHandle,
        original_duration: f64,
    },

    /// Change trim points. Values are clamped to `[0, original_duration]`;
    /// an edit that leaves `trim_in >= trim_out` is refused.
    SetTrim {
        id: ClipId,
        trim_in: f64,
        trim_out: f64,
    },

    /// Drop a clip. Other clips keep their trims.
    Remove { id: ClipId },

    /// Reorder a clip. `to_index` past the end moves it last.
    Move { id: ClipId, to_index: usize },
}

/// Warning raised when the clips run out before the music does.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationWarning {
    pub audio_secs: f64,
    pub visible_secs: f64,
}

impl fmt::Display for DurationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Video is too short! Music is {}s, but video is only {}s.",
            self.audio_secs.round(),
            self.visible_secs.round()
        )
    }
}

/// Ordered, versioned list of clips.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClipSequence {
    clips: Vec<Clip>,
    version: u64,
    next_id: u64,
}

impl ClipSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a sequence from stored clips. Clips with unusable trims are
    /// reset to their full length.
    pub fn from_clips(mut clips: Vec<Clip>) -> Self {
        for clip in &mut clips {
            let duration = clip.original_duration;
            let trim_in = clip.trim_in.clamp(0.0, duration.max(0.0));
            let trim_out = clip.trim_out.clamp(0.0, duration.max(0.0));
            if trim_in < trim_out {
                clip.trim_in = trim_in;
                clip.trim_out = trim_out;
            } else {
                tracing::warn!(
                    clip_id = %clip.id,
                    trim_in = clip.trim_in,
                    trim_out = clip.trim_out,
                    "Resetting clip with invalid trim to full length"
                );
                clip.trim_in = 0.0;
                clip.trim_out = duration.max(0.0);
            }
        }
        clips.retain(|c| c.visible_duration() > 0.0);
        let next_id = clips.iter().map(|c| c.id.0 + 1).max().unwrap_or(0);
        Self {
            clips,
            version: 0,
            next_id,
        }
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Identifier the next appended clip will receive.
    pub fn peek_next_id(&self) -> ClipId {
        ClipId(self.next_id)
    }

    pub fn get(&self, id: ClipId) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id == id)
    }

    /// Total runtime of the presentation.
    pub fn total_visible_duration(&self) -> f64 {
        self.clips.iter().map(Clip::visible_duration).sum()
    }

    /// Find the clip playing at `global_time` and its local offset.
    ///
    /// Returns `None` past the end of the sequence, for an empty sequence,
    /// and for negative or non-finite input.
    pub fn resolve(&self, global_time: f64) -> Option<ResolvedClip<'_>> {
        if !global_time.is_finite() || global_time < 0.0 {
            return None;
        }
        let mut segment_offset = 0.0;
        for (index, clip) in self.clips.iter().enumerate() {
            let visible = clip.visible_duration();
            if global_time < segment_offset + visible {
                return Some(ResolvedClip {
                    clip,
                    index,
                    local_time: clip.trim_in + (global_time - segment_offset),
                    segment_offset,
                });
            }
            segment_offset += visible;
        }
        None
    }

    /// Non-fatal anomaly: the clips end before the master audio does.
    pub fn duration_warning(&self, audio_secs: f64) -> Option<DurationWarning> {
        let visible_secs = self.total_visible_duration();
        (visible_secs < audio_secs).then_some(DurationWarning {
            audio_secs,
            visible_secs,
        })
    }

    /// Apply an edit, producing the next snapshot.
    pub fn apply(&self, edit: &ClipEdit) -> Result<ClipSequence, EditError> {
        let mut clips = self.clips.clone();
        let mut next_id = self.next_id;

        match edit {
            ClipEdit::Append {
                source,
                original_duration,
            } => {
                let duration = finite("original_duration", *original_duration)?;
                if duration <= 0.0 {
                    return Err(EditError::InvalidDuration(duration));
                }
                clips.push(Clip {
                    id: ClipId(next_id),
                    source: source.clone(),
                    trim_in: 0.0,
                    trim_out: duration,
                    original_duration: duration,
                });
                next_id += 1;
            }
            ClipEdit::SetTrim {
                id,
                trim_in,
                trim_out,
            } => {
                let index = self.require(*id)?;
                let clip = &mut clips[index];
                let trim_in = finite("trim_in", *trim_in)?.clamp(0.0, clip.original_duration);
                let trim_out = finite("trim_out", *trim_out)?.clamp(0.0, clip.original_duration);
                if trim_in >= trim_out {
                    return Err(EditError::InvalidTrim { trim_in, trim_out });
                }
                clip.trim_in = trim_in;
                clip.trim_out = trim_out;
            }
            ClipEdit::Remove { id } => {
                let index = self.require(*id)?;
                clips.remove(index);
            }
            ClipEdit::Move { id, to_index } => {
                let index = self.require(*id)?;
                let clip = clips.remove(index);
                let to_index = (*to_index).min(clips.len());
                clips.insert(to_index, clip);
            }
        }

        Ok(ClipSequence {
            clips,
            version: self.version + 1,
            next_id,
        })
    }

    fn require(&self, id: ClipId) -> Result<usize, EditError> {
        self.clips
            .iter()
            .position(|c| c.id == id)
            .ok_or(EditError::UnknownClip(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn clip(id: u64, trim_in: f64, trim_out: f64, original: f64) -> Clip {
        Clip {
            id: ClipId(id),
            source: SourceHandle::new(format!("clip{id}.mp4")),
            trim_in,
            trim_out,
            original_duration: original,
        }
    }

    /// Three clips with visible durations 4s, 6s and 5s.
    fn three_clips() -> ClipSequence {
        ClipSequence::from_clips(vec![
            clip(1, 1.0, 5.0, 10.0),
            clip(2, 2.0, 8.0, 8.0),
            clip(3, 0.5, 5.5, 7.0),
        ])
    }

    #[test]
    fn test_resolve_three_clip_scenario() {
        let seq = three_clips();
        assert!((seq.total_visible_duration() - 15.0).abs() < 1e-9);

        let r = seq.resolve(3.9).unwrap();
        assert_eq!(r.clip.id, ClipId(1));
        assert!((r.local_time - (1.0 + 3.9)).abs() < 1e-9);

        let r = seq.resolve(4.0).unwrap();
        assert_eq!(r.clip.id, ClipId(2));
        assert!((r.local_time - 2.0).abs() < 1e-9);
        assert_eq!(r.segment_offset, 4.0);

        let r = seq.resolve(14.999).unwrap();
        assert_eq!(r.clip.id, ClipId(3));
        assert_eq!(r.index, 2);

        assert!(seq.resolve(15.0).is_none());
    }

    #[test]
    fn test_resolve_empty_sequence() {
        let seq = ClipSequence::new();
        for t in [0.0, 1.0, 100.0] {
            assert!(seq.resolve(t).is_none());
        }
    }

    #[test]
    fn test_resolve_rejects_negative_time() {
        assert!(three_clips().resolve(-0.1).is_none());
        assert!(three_clips().resolve(f64::NAN).is_none());
    }

    #[test]
    fn test_invalid_trim_is_rejected_and_clip_unchanged() {
        let seq = three_clips();
        let equal = seq.apply(&ClipEdit::SetTrim {
            id: ClipId(1),
            trim_in: 3.0,
            trim_out: 3.0,
        });
        assert!(matches!(equal, Err(EditError::InvalidTrim { .. })));

        let inverted = seq.apply(&ClipEdit::SetTrim {
            id: ClipId(1),
            trim_in: 6.0,
            trim_out: 2.0,
        });
        assert!(matches!(inverted, Err(EditError::InvalidTrim { .. })));
        assert_eq!(seq.get(ClipId(1)).unwrap().trim_in, 1.0);
        assert_eq!(seq.get(ClipId(1)).unwrap().trim_out, 5.0);
    }

    #[test]
    fn test_trim_is_clamped_to_source_bounds() {
        let seq = three_clips()
            .apply(&ClipEdit::SetTrim {
                id: ClipId(2),
                trim_in: -4.0,
                trim_out: 20.0,
            })
            .unwrap();
        let c = seq.get(ClipId(2)).unwrap();
        assert_eq!((c.trim_in, c.trim_out), (0.0, 8.0));
        assert!((seq.total_visible_duration() - 17.0).abs() < 1e-9);
    }

    #[test]
    fn test_trim_collapsing_after_clamp_is_rejected() {
        let result = three_clips().apply(&ClipEdit::SetTrim {
            id: ClipId(2),
            trim_in: 9.0,
            trim_out: 12.0,
        });
        assert_eq!(
            result,
            Err(EditError::InvalidTrim {
                trim_in: 8.0,
                trim_out: 8.0
            })
        );
    }

    #[test]
    fn test_remove_keeps_other_trims() {
        let seq = three_clips()
            .apply(&ClipEdit::Remove { id: ClipId(2) })
            .unwrap();
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.get(ClipId(3)).unwrap().trim_in, 0.5);
        assert!((seq.total_visible_duration() - 9.0).abs() < 1e-9);
        assert_eq!(seq.resolve(4.0).unwrap().clip.id, ClipId(3));
    }

    #[test]
    fn test_append_uses_full_length_and_fresh_id() {
        let seq = three_clips()
            .apply(&ClipEdit::Append {
                source: SourceHandle::new("new.mp4"),
                original_duration: 12.0,
            })
            .unwrap();
        let added = seq.clips().last().unwrap();
        assert_eq!(added.id, ClipId(4));
        assert_eq!((added.trim_in, added.trim_out), (0.0, 12.0));
        assert_eq!(seq.version(), 1);

        let refused = seq.apply(&ClipEdit::Append {
            source: SourceHandle::new("broken.mp4"),
            original_duration: 0.0,
        });
        assert_eq!(refused, Err(EditError::InvalidDuration(0.0)));
    }

    #[test]
    fn test_move_reorders() {
        let seq = three_clips()
            .apply(&ClipEdit::Move {
                id: ClipId(3),
                to_index: 0,
            })
            .unwrap();
        let ids: Vec<_> = seq.clips().iter().map(|c| c.id.0).collect();
        assert_eq!(ids, vec![3, 1, 2]);

        let seq = seq
            .apply(&ClipEdit::Move {
                id: ClipId(3),
                to_index: 99,
            })
            .unwrap();
        let ids: Vec<_> = seq.clips().iter().map(|c| c.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_duration_warning_message() {
        let seq = three_clips();
        let warning = seq.duration_warning(180.4).unwrap();
        assert_eq!(
            warning.to_string(),
            "Video is too short! Music is 180s, but video is only 15s."
        );
        assert!(seq.duration_warning(15.0).is_none());
    }

    proptest! {
        #[test]
        fn prop_boundaries_belong_to_next_clip(
            lengths in prop::collection::vec(1u32..20, 2..8),
            pick in 0usize..8,
        ) {
            let clips = lengths
                .iter()
                .enumerate()
                .map(|(i, len)| clip(i as u64, 0.0, *len as f64, *len as f64))
                .collect();
            let seq = ClipSequence::from_clips(clips);
            let boundary_index = pick % (lengths.len() - 1);
            let boundary: f64 = lengths[..=boundary_index].iter().map(|l| *l as f64).sum();

            let resolved = seq.resolve(boundary).unwrap();
            prop_assert_eq!(resolved.index, boundary_index + 1);
            prop_assert_eq!(resolved.local_time, 0.0);
            prop_assert!(seq.resolve(seq.total_visible_duration()).is_none());
        }
    }
}
