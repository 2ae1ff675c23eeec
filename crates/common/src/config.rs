//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Playback and synchronization tuning.
    #[serde(default)]
    pub playback: PlaybackDefaults,

    /// Default output settings for previews and exports.
    #[serde(default)]
    pub output: OutputDefaults,

    /// Font faces available to the text rasterizer.
    #[serde(default)]
    pub fonts: Vec<FontFace>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Playback synchronization parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackDefaults {
    /// Maximum tolerated distance (seconds) between the active clip's own
    /// position and the timeline-derived position before it is re-snapped.
    pub drift_threshold_secs: f64,

    /// Rate of the per-frame tick when driven by the built-in scheduler.
    pub tick_hz: u32,

    /// Step applied by keyboard nudges on cue timing.
    pub nudge_step_secs: f64,

    /// Master audio volume scalar [0.0, 1.0].
    pub master_volume: f32,

    /// Clip audio volume scalar [0.0, 1.0].
    pub clip_volume: f32,
}

/// Default output parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputDefaults {
    pub width: u32,
    pub height: u32,
    pub fps: u32,

    /// Video bitrate in kbps.
    pub video_bitrate_kbps: u32,

    /// Audio bitrate in kbps.
    pub audio_bitrate_kbps: u32,
}

/// A font family backed by a font file on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontFace {
    /// Family name matched against style font-family lists (case-insensitive).
    pub family: String,

    /// Path to a TrueType/OpenType file.
    pub path: PathBuf,

    /// Whether this face is the bold weight of its family.
    #[serde(default)]
    pub bold: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "lyricut=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            playback: PlaybackDefaults::default(),
            output: OutputDefaults::default(),
            fonts: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for PlaybackDefaults {
    fn default() -> Self {
        Self {
            drift_threshold_secs: 0.2,
            tick_hz: 60,
            nudge_step_secs: 0.5,
            master_volume: 1.0,
            clip_volume: 1.0,
        }
    }
}

impl Default for OutputDefaults {
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

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("lyricut").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_editor_behaviour() {
        let config = AppConfig::default();
        assert!((config.playback.drift_threshold_secs - 0.2).abs() < 1e-9);
        assert_eq!(config.playback.tick_hz, 60);
        assert_eq!(config.output.width, 1920);
        assert_eq!(config.output.height, 1080);
        assert_eq!(config.output.video_bitrate_kbps, 8000);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let json = r#"{ "playback": { "drift_threshold_secs": 0.1 } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert!((config.playback.drift_threshold_secs - 0.1).abs() < 1e-9);
        assert!((config.playback.nudge_step_secs - 0.5).abs() < 1e-9);
        assert_eq!(config.logging.level, "info");
        assert!(config.fonts.is_empty());
    }
}
