//! In-memory media doubles for tests.
//!
//! None of these touch real media: the master is a plain number the caller
//! moves, the visual source records every command it receives, and the
//! sink only counts frames.

use std::sync::{Arc, Mutex};

use image::{Rgba, RgbaImage};
use lyricut_common::error::{LyricutError, LyricutResult};
use lyricut_project_model::SourceHandle;
use lyricut_render_engine::{ExportArtifact, ExportSettings, ExportSink, SinkCapabilities};

use crate::media::{MasterClock, Readiness, VisualSource};

/// Master clock whose position is set by hand.
#[derive(Debug, Clone, PartialEq)]
pub struct FakeMaster {
    pub position: f64,
    pub duration: Option<f64>,
    pub paused: bool,
    pub volume: f32,
}

impl FakeMaster {
    pub fn playing(position: f64, duration: f64) -> Self {
        Self {
            position,
            duration: Some(duration),
            paused: false,
            volume: 1.0,
        }
    }

    pub fn paused(position: f64, duration: f64) -> Self {
        Self {
            paused: true,
            ..Self::playing(position, duration)
        }
    }
}

impl MasterClock for FakeMaster {
    fn position(&self) -> f64 {
        self.position
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn has_ended(&self) -> bool {
        self.duration.is_some_and(|d| self.position >= d)
    }

    fn seek(&mut self, secs: f64) {
        self.position = match self.duration {
            Some(d) => secs.clamp(0.0, d),
            None => secs.max(0.0),
        };
    }

    fn play(&mut self) {
        self.paused = false;
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }
}

/// Command received by a [`FakeVisual`].
#[derive(Debug, Clone, PartialEq)]
pub enum VisualCall {
    Load(String),
    Seek(f64),
    Play,
    Pause,
}

/// Visual source that produces solid-color frames.
#[derive(Debug, Clone)]
pub struct FakeVisual {
    pub loaded: Option<String>,
    pub position: f64,
    pub readiness: Readiness,
    pub paused: bool,
    pub volume: f32,
    pub size: (u32, u32),

    /// Readiness a freshly loaded source reports.
    pub readiness_on_load: Readiness,

    /// Sources that fail to load.
    pub failing: Vec<String>,

    /// Frame color per source; unknown sources are gray.
    pub palette: Vec<(String, [u8; 4])>,

    /// Seconds the position moves per `frame()` call while playing.
    pub advance_per_frame: f64,

    pub calls: Vec<VisualCall>,
    pub frame: Option<RgbaImage>,
}

impl Default for FakeVisual {
    fn default() -> Self {
        Self {
            loaded: None,
            position: 0.0,
            readiness: Readiness::Ready,
            paused: true,
            volume: 1.0,
            size: (16, 9),
            readiness_on_load: Readiness::Ready,
            failing: Vec::new(),
            palette: Vec::new(),
            advance_per_frame: 0.0,
            calls: Vec::new(),
            frame: None,
        }
    }
}

impl FakeVisual {
    pub fn with_palette(palette: &[(&str, [u8; 4])]) -> Self {
        Self {
            palette: palette
                .iter()
                .map(|(name, color)| (name.to_string(), *color))
                .collect(),
            ..Self::default()
        }
    }

    fn color(&self) -> [u8; 4] {
        self.loaded
            .as_ref()
            .and_then(|name| self.palette.iter().find(|(n, _)| n == name))
            .map(|(_, color)| *color)
            .unwrap_or([128, 128, 128, 255])
    }
}

impl VisualSource for FakeVisual {
    fn load(&mut self, source: &SourceHandle) {
        self.calls.push(VisualCall::Load(source.as_str().to_string()));
        self.loaded = Some(source.as_str().to_string());
        self.position = 0.0;
        self.paused = true;
        self.frame = None;
        self.readiness = if self.failing.iter().any(|f| f == source.as_str()) {
            Readiness::Failed
        } else {
            self.readiness_on_load
        };
    }

    fn position(&self) -> f64 {
        self.position
    }

    fn readiness(&self) -> Readiness {
        self.readiness
    }

    fn native_size(&self) -> Option<(u32, u32)> {
        (self.readiness == Readiness::Ready).then_some(self.size)
    }

    fn seek(&mut self, secs: f64) {
        self.calls.push(VisualCall::Seek(secs));
        self.position = secs;
    }

    fn play(&mut self) {
        self.calls.push(VisualCall::Play);
        self.paused = false;
    }

    fn pause(&mut self) {
        self.calls.push(VisualCall::Pause);
        self.paused = true;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    fn frame(&mut self) -> Option<&RgbaImage> {
        if self.readiness != Readiness::Ready || self.loaded.is_none() {
            return None;
        }
        if !self.paused {
            self.position += self.advance_per_frame;
        }
        let (w, h) = self.size;
        let color = self.color();
        let frame = RgbaImage::from_pixel(w, h, Rgba(color));
        self.frame = Some(frame);
        self.frame.as_ref()
    }
}

/// Shared record of what a [`MemorySink`] received.
#[derive(Debug, Default)]
pub struct SinkLog {
    pub started: bool,
    pub stopped: bool,
    pub frame_times: Vec<f64>,

    /// Top-left pixel of every pushed frame.
    pub first_pixels: Vec<[u8; 4]>,
}

/// Export sink that keeps frame metadata in memory.
#[derive(Debug, Clone)]
pub struct MemorySink {
    pub log: Arc<Mutex<SinkLog>>,
    pub audio: bool,

    /// Fail the push after this many frames.
    pub fail_after: Option<u64>,
    settings: Option<ExportSettings>,
}

impl MemorySink {
    pub fn new(audio: bool) -> Self {
        Self {
            log: Arc::new(Mutex::new(SinkLog::default())),
            audio,
            fail_after: None,
            settings: None,
        }
    }

    fn with_log<T>(&self, f: impl FnOnce(&mut SinkLog) -> T) -> LyricutResult<T> {
        let mut log = self
            .log
            .lock()
            .map_err(|_| LyricutError::export("sink log poisoned"))?;
        Ok(f(&mut log))
    }
}

impl ExportSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn start(&mut self, settings: &ExportSettings) -> LyricutResult<SinkCapabilities> {
        self.settings = Some(settings.clone());
        self.with_log(|log| log.started = true)?;
        Ok(SinkCapabilities { audio: self.audio })
    }

    fn push_frame(&mut self, frame: &RgbaImage, time_secs: f64) -> LyricutResult<()> {
        let count = self.with_log(|log| log.frame_times.len() as u64)?;
        if self.fail_after.is_some_and(|limit| count >= limit) {
            return Err(LyricutError::export("memory sink full"));
        }
        let pixel = frame.get_pixel(0, 0).0;
        self.with_log(|log| {
            log.frame_times.push(time_secs);
            log.first_pixels.push(pixel);
        })
    }

    fn stop(&mut self) -> LyricutResult<ExportArtifact> {
        let settings = self
            .settings
            .take()
            .ok_or_else(|| LyricutError::invalid_state("memory sink not started"))?;
        let frames = self.with_log(|log| {
            log.stopped = true;
            log.frame_times.len() as u64
        })?;
        Ok(ExportArtifact {
            path: settings.output_path,
            frames,
            duration_secs: frames as f64 / f64::from(settings.fps.max(1)),
            has_audio: self.audio,
        })
    }
}
