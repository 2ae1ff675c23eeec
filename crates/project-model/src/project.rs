//! Project manifest and on-disk layout.
//!
//! A project directory looks like:
//!
//! ```text
//! my-song/
//!   meta/project.json   manifest (audio, clips, cues, style, export)
//!   sources/            imported media (optional, paths may point anywhere)
//!   exports/            rendered videos
//! ```

use std::path::{Path, PathBuf};

use lyricut_common::error::LyricutError;
use serde::{Deserialize, Serialize};

use crate::clip::{Clip, ClipSequence, SourceHandle};
use crate::cue::{Cue, CueStore};
use crate::style::StyleConfig;

/// Current manifest schema version.
pub const PROJECT_SCHEMA_VERSION: &str = "1.0";

/// Top-level project file (`meta/project.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Schema version.
    pub version: String,

    /// Human-readable title, also used to name exports.
    pub name: String,

    /// Unique project identifier (UUID).
    pub id: String,

    /// Creation timestamp (RFC 3339).
    pub created_at: String,

    /// Last modified timestamp (RFC 3339).
    pub modified_at: String,

    /// Master audio track.
    #[serde(default)]
    pub audio: Option<AudioTrackRef>,

    /// Visual clips in playback order.
    #[serde(default)]
    pub clips: Vec<Clip>,

    /// Subtitle cues.
    #[serde(default)]
    pub cues: Vec<Cue>,

    #[serde(default)]
    pub style: StyleConfig,

    pub export: ExportConfig,

    /// Whether committed end edits ripple into later cues.
    #[serde(default)]
    pub ripple_sync: bool,
}

/// Reference to the master audio file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrackRef {
    /// Path relative to the project root, or absolute.
    pub path: String,

    /// Duration in seconds.
    pub duration_secs: f64,
}

/// Output settings for rendered videos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,

    /// Video bitrate in kbps.
    pub video_bitrate_kbps: u32,

    /// Audio bitrate in kbps.
    pub audio_bitrate_kbps: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 60,
            video_bitrate_kbps: 8000,
            audio_bitrate_kbps: 192,
        }
    }
}

impl Project {
    /// Create an empty project.
    pub fn new(name: impl Into<String>, export: ExportConfig) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            version: PROJECT_SCHEMA_VERSION.to_string(),
            name: name.into(),
            id: uuid_v4(),
            created_at: now.clone(),
            modified_at: now,
            audio: None,
            clips: vec![],
            cues: vec![],
            style: StyleConfig::default(),
            export,
            ripple_sync: false,
        }
    }

    /// Snapshot of the stored clips.
    pub fn clip_sequence(&self) -> ClipSequence {
        ClipSequence::from_clips(self.clips.clone())
    }

    /// Snapshot of the stored cues.
    pub fn cue_store(&self) -> CueStore {
        CueStore::from_cues(self.cues.clone())
    }

    /// Replace the stored clips with an edited sequence.
    pub fn set_clips(&mut self, clips: &ClipSequence) {
        self.clips = clips.clips().to_vec();
        self.touch();
    }

    /// Replace the stored cues with an edited store.
    pub fn set_cues(&mut self, cues: &CueStore) {
        self.cues = cues.cues().to_vec();
        self.touch();
    }

    /// Bump `modified_at`.
    pub fn touch(&mut self) {
        self.modified_at = chrono::Utc::now().to_rfc3339();
    }

    /// File name used for exports: `<title>_cinematic.webm`.
    pub fn export_file_name(&self) -> String {
        let title: String = self
            .name
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let title = if title.is_empty() { "untitled" } else { &title };
        format!("{title}_cinematic.webm")
    }
}

/// A project together with the directory it lives in.
#[derive(Debug, Clone)]
pub struct LoadedProject {
    /// Filesystem path to the project directory.
    pub root: PathBuf,

    pub project: Project,
}

impl LoadedProject {
    /// Load `meta/project.json` from a project directory.
    pub fn load(root: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let root = root.as_ref().to_path_buf();
        let path = manifest_path(&root);

        let json = std::fs::read_to_string(&path).map_err(|e| ProjectError::IoError {
            path: path.clone(),
            source: e,
        })?;
        let project: Project =
            serde_json::from_str(&json).map_err(|e| ProjectError::ParseError { path, source: e })?;

        if project.version != PROJECT_SCHEMA_VERSION {
            tracing::warn!(
                version = %project.version,
                expected = PROJECT_SCHEMA_VERSION,
                "Project schema version differs; loading anyway"
            );
        }

        Ok(Self { root, project })
    }

    /// Write the manifest back to disk.
    pub fn save(&self) -> Result<(), ProjectError> {
        let meta_dir = self.root.join("meta");
        std::fs::create_dir_all(&meta_dir).map_err(|e| ProjectError::IoError {
            path: meta_dir.clone(),
            source: e,
        })?;

        let path = manifest_path(&self.root);
        let json = serde_json::to_string_pretty(&self.project).map_err(|e| {
            ProjectError::ParseError {
                path: path.clone(),
                source: e,
            }
        })?;
        std::fs::write(&path, json).map_err(|e| ProjectError::IoError { path, source: e })?;

        tracing::debug!(root = %self.root.display(), "Project saved");
        Ok(())
    }

    /// Create a new project directory with the standard layout.
    pub fn create(
        root: impl AsRef<Path>,
        name: impl Into<String>,
        export: ExportConfig,
    ) -> Result<Self, ProjectError> {
        let root = root.as_ref().to_path_buf();

        if manifest_path(&root).exists() {
            return Err(ProjectError::ValidationError {
                message: format!("{} already contains a project", root.display()),
            });
        }

        for subdir in ["meta", "sources", "exports"] {
            let dir = root.join(subdir);
            std::fs::create_dir_all(&dir)
                .map_err(|e| ProjectError::IoError { path: dir, source: e })?;
        }

        let loaded = Self {
            root,
            project: Project::new(name, export),
        };
        loaded.save()?;
        Ok(loaded)
    }

    /// Resolve a stored path against the project root.
    pub fn resolve_path(&self, stored: &str) -> PathBuf {
        let path = Path::new(stored);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Resolve a clip source handle to a local file.
    pub fn resolve_source(&self, source: &SourceHandle) -> PathBuf {
        self.resolve_path(source.as_str())
    }

    /// Absolute path of the master audio file, if one is set.
    pub fn audio_path(&self) -> Option<PathBuf> {
        self.project
            .audio
            .as_ref()
            .map(|audio| self.resolve_path(&audio.path))
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.root.join("exports")
    }

    /// Collect human-readable problems with the project. An empty list
    /// means the project is ready to play and export.
    pub fn validate_sources(&self) -> Vec<String> {
        let mut errors = vec![];

        match &self.project.audio {
            Some(audio) => {
                if !self.resolve_path(&audio.path).exists() {
                    errors.push(format!("Audio source missing: {}", audio.path));
                }
                if !(audio.duration_secs.is_finite() && audio.duration_secs > 0.0) {
                    errors.push(format!(
                        "Audio duration must be positive, got {}",
                        audio.duration_secs
                    ));
                }
            }
            None => errors.push("No audio track set".to_string()),
        }

        for clip in &self.project.clips {
            if !self.resolve_source(&clip.source).exists() {
                errors.push(format!("Clip {} source missing: {}", clip.id, clip.source));
            }
            if !(clip.trim_in >= 0.0
                && clip.trim_in < clip.trim_out
                && clip.trim_out <= clip.original_duration)
            {
                errors.push(format!(
                    "Clip {} has invalid trim {}..{} (source is {}s)",
                    clip.id, clip.trim_in, clip.trim_out, clip.original_duration
                ));
            }
        }

        if let Err(e) = self.project.style.validate() {
            errors.push(format!("Style: {e}"));
        }

        errors
    }
}

fn manifest_path(root: &Path) -> PathBuf {
    root.join("meta").join("project.json")
}

/// Errors that can occur when working with projects.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid project: {message}")]
    ValidationError { message: String },
}

impl From<ProjectError> for LyricutError {
    fn from(e: ProjectError) -> Self {
        match e {
            ProjectError::IoError { source, .. }
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                LyricutError::project(format!("no project found ({source})"))
            }
            other => LyricutError::project(other.to_string()),
        }
    }
}

/// Time-seeded UUID v4 string. Uniqueness only needs to hold per machine.
fn uuid_v4() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let mixed = nanos ^ (u128::from(std::process::id()) << 64);
    format!(
        "{:08x}-{:04x}-4{:03x}-{:04x}-{:012x}",
        (mixed & 0xFFFF_FFFF) as u32,
        ((mixed >> 32) & 0xFFFF) as u16,
        ((mixed >> 48) & 0x0FFF) as u16,
        (((mixed >> 60) & 0x3FFF) as u16) | 0x8000,
        (mixed >> 74) & 0xFFFF_FFFF_FFFF,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::ClipEdit;
    use crate::cue::CueId;
    use crate::edit::EditOptions;

    fn temp_root(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lyricut_test_{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_project_creation() {
        let project = Project::new("Spring Day", ExportConfig::default());
        assert_eq!(project.name, "Spring Day");
        assert_eq!(project.version, PROJECT_SCHEMA_VERSION);
        assert_eq!(project.export.fps, 60);
        assert!(project.clips.is_empty());
        assert!(!project.ripple_sync);
        assert_eq!(project.id.len(), 36);
    }

    #[test]
    fn test_export_file_name() {
        let project = Project::new("My Song: Live", ExportConfig::default());
        assert_eq!(project.export_file_name(), "My_Song__Live_cinematic.webm");

        let unnamed = Project::new("", ExportConfig::default());
        assert_eq!(unnamed.export_file_name(), "untitled_cinematic.webm");
    }

    #[test]
    fn test_minimal_manifest_uses_defaults() {
        let json = r#"{
            "version": "1.0",
            "name": "Legacy",
            "id": "x",
            "created_at": "2024-01-01T00:00:00Z",
            "modified_at": "2024-01-01T00:00:00Z",
            "cues": [{ "id": 0, "start": 1.0, "primary": "a", "secondary": "b" }],
            "export": { "width": 1280, "height": 720, "fps": 30,
                        "video_bitrate_kbps": 4000, "audio_bitrate_kbps": 128 }
        }"#;
        let project: Project = serde_json::from_str(json).unwrap();
        assert!(project.audio.is_none());
        assert_eq!(project.cues[0].end, None);
        assert_eq!(project.style, StyleConfig::default());
        assert_eq!(project.cue_store().active_at(5.9).map(|c| c.id), Some(CueId(0)));
    }

    #[test]
    fn test_loaded_project_create_and_load() {
        let dir = temp_root("create_load");

        let mut created = LoadedProject::create(&dir, "Round Trip", ExportConfig::default()).unwrap();
        let clips = created
            .project
            .clip_sequence()
            .apply(&ClipEdit::Append {
                source: SourceHandle::new("sources/a.mp4"),
                original_duration: 8.0,
            })
            .unwrap();
        created.project.set_clips(&clips);
        let cues = created
            .project
            .cue_store()
            .apply(&crate::cue::CueEdit::Insert { at: 1.0 }, &EditOptions::default())
            .unwrap();
        created.project.set_cues(&cues);
        created.save().unwrap();

        let loaded = LoadedProject::load(&dir).unwrap();
        assert_eq!(loaded.project.name, "Round Trip");
        assert_eq!(loaded.project.clips.len(), 1);
        assert_eq!(loaded.project.cues.len(), 1);
        assert_eq!(loaded.project.cues[0].end, Some(4.0));

        assert!(LoadedProject::create(&dir, "Again", ExportConfig::default()).is_err());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_validate_sources_reports_missing() {
        let dir = temp_root("validate");

        let mut loaded = LoadedProject::create(&dir, "Validate", ExportConfig::default()).unwrap();
        assert!(loaded
            .validate_sources()
            .iter()
            .any(|e| e.contains("No audio track")));

        loaded.project.audio = Some(AudioTrackRef {
            path: "sources/song.mp3".to_string(),
            duration_secs: 180.0,
        });
        loaded.project.clips.push(Clip {
            id: crate::clip::ClipId(0),
            source: SourceHandle::new("sources/clip.mp4"),
            trim_in: 3.0,
            trim_out: 2.0,
            original_duration: 10.0,
        });

        let errors = loaded.validate_sources();
        assert!(errors.iter().any(|e| e.contains("Audio source missing")));
        assert!(errors.iter().any(|e| e.contains("Clip 0 source missing")));
        assert!(errors.iter().any(|e| e.contains("invalid trim")));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_resolve_path() {
        let loaded = LoadedProject {
            root: PathBuf::from("/projects/song"),
            project: Project::new("x", ExportConfig::default()),
        };
        assert_eq!(
            loaded.resolve_path("sources/a.mp4"),
            PathBuf::from("/projects/song/sources/a.mp4")
        );
        assert_eq!(loaded.resolve_path("/media/b.mp4"), PathBuf::from("/media/b.mp4"));
    }
}
