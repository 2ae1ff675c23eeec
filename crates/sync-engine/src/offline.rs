//! Frame-stepped rendering with ffmpeg-decoded clips.
//!
//! Offline export does not run against the wall clock. [`SteppedClock`]
//! moves exactly one output frame per tick and [`FfmpegClipSource`] decodes
//! exactly one frame per [`VisualSource::frame`] call while playing, so the
//! two stay in lockstep no matter how long compositing takes.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use image::RgbaImage;
use lyricut_common::error::{LyricutError, LyricutResult};
use lyricut_project_model::SourceHandle;
use lyricut_render_engine::probe::probe_video_dimensions;

use crate::engine::{PlaybackEngine, TickOutcome};
use crate::media::{MasterClock, Readiness, VisualSource};

/// Master clock that only moves when told to.
#[derive(Debug, Clone, PartialEq)]
pub struct SteppedClock {
    fps: u32,
    frame: u64,
    duration_secs: Option<f64>,
    paused: bool,
}

impl SteppedClock {
    pub fn new(fps: u32, duration_secs: Option<f64>) -> Self {
        Self {
            fps: fps.max(1),
            frame: 0,
            duration_secs,
            paused: true,
        }
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Index of the current output frame.
    pub fn frame_index(&self) -> u64 {
        self.frame
    }

    /// Move one frame forward if playing.
    pub fn advance(&mut self) {
        if !self.paused && !MasterClock::has_ended(self) {
            self.frame += 1;
        }
    }
}

impl MasterClock for SteppedClock {
    fn position(&self) -> f64 {
        self.frame as f64 / f64::from(self.fps)
    }

    fn duration(&self) -> Option<f64> {
        self.duration_secs
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn has_ended(&self) -> bool {
        self.duration_secs.is_some_and(|d| self.position() >= d)
    }

    fn seek(&mut self, secs: f64) {
        let secs = match self.duration_secs {
            Some(d) => secs.clamp(0.0, d),
            None => secs.max(0.0),
        };
        self.frame = (secs * f64::from(self.fps)).round() as u64;
    }

    fn play(&mut self) {
        self.paused = false;
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn set_volume(&mut self, volume: f32) {
        tracing::trace!(volume, "Stepped clock has no audio output");
    }
}

struct Decoder {
    child: Child,
    stdout: ChildStdout,
}

impl Drop for Decoder {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Visual source decoding clip files with an `ffmpeg` subprocess.
pub struct FfmpegClipSource {
    root: PathBuf,
    fps: u32,
    path: Option<PathBuf>,
    size: Option<(u32, u32)>,
    readiness: Readiness,
    position: f64,
    paused: bool,

    decoder: Option<Decoder>,
    /// Source time of the next frame the decoder will emit.
    decoder_pos: f64,

    frame: Option<RgbaImage>,
    frame_pos: f64,
}

impl FfmpegClipSource {
    /// Relative source handles resolve against `root`.
    pub fn new(root: impl Into<PathBuf>, fps: u32) -> Self {
        Self {
            root: root.into(),
            fps: fps.max(1),
            path: None,
            size: None,
            readiness: Readiness::Loading,
            position: 0.0,
            paused: true,
            decoder: None,
            decoder_pos: 0.0,
            frame: None,
            frame_pos: f64::NAN,
        }
    }

    fn frame_secs(&self) -> f64 {
        1.0 / f64::from(self.fps)
    }

    fn spawn_decoder(&self, path: &Path, at: f64) -> LyricutResult<Decoder> {
        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-nostdin", "-ss"])
            .arg(format!("{at:.3}"))
            .arg("-i")
            .arg(path)
            .args(["-an", "-f", "rawvideo", "-pix_fmt", "rgba", "-r"])
            .arg(self.fps.to_string())
            .arg("-")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| LyricutError::media(format!("Failed to start ffmpeg decoder: {e}")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| LyricutError::media("ffmpeg decoder has no stdout"))?;
        tracing::debug!(path = %path.display(), at_secs = at, "Spawned clip decoder");
        Ok(Decoder { child, stdout })
    }

    fn decode_next(&mut self) -> LyricutResult<Option<RgbaImage>> {
        let (Some(path), Some((w, h))) = (self.path.clone(), self.size) else {
            return Ok(None);
        };
        let in_step = (self.decoder_pos - self.position).abs() < self.frame_secs() / 2.0;
        if self.decoder.is_none() || !in_step {
            self.decoder = Some(self.spawn_decoder(&path, self.position)?);
            self.decoder_pos = self.position;
        }
        let Some(decoder) = self.decoder.as_mut() else {
            return Ok(None);
        };

        let mut buf = vec![0u8; w as usize * h as usize * 4];
        match decoder.stdout.read_exact(&mut buf) {
            Ok(()) => {
                self.decoder_pos += self.frame_secs();
                Ok(RgbaImage::from_raw(w, h, buf))
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                // Past the end of the file: hold the last frame.
                self.decoder = None;
                Ok(None)
            }
            Err(e) => Err(LyricutError::media(format!("Clip decode failed: {e}"))),
        }
    }
}

impl VisualSource for FfmpegClipSource {
    fn load(&mut self, source: &SourceHandle) {
        let path = if source.as_path().is_absolute() {
            source.as_path().to_path_buf()
        } else {
            self.root.join(source.as_path())
        };

        self.decoder = None;
        self.frame = None;
        self.frame_pos = f64::NAN;
        self.position = 0.0;
        self.decoder_pos = 0.0;
        self.paused = true;

        match probe_video_dimensions(&path) {
            Some(size) => {
                tracing::debug!(path = %path.display(), width = size.0, height = size.1, "Clip loaded");
                self.size = Some(size);
                self.readiness = Readiness::Ready;
            }
            None => {
                tracing::warn!(path = %path.display(), "Could not probe clip");
                self.size = None;
                self.readiness = Readiness::Failed;
            }
        }
        self.path = Some(path);
    }

    fn position(&self) -> f64 {
        self.position
    }

    fn readiness(&self) -> Readiness {
        self.readiness
    }

    fn native_size(&self) -> Option<(u32, u32)> {
        self.size
    }

    fn seek(&mut self, secs: f64) {
        self.position = secs.max(0.0);
    }

    fn play(&mut self) {
        self.paused = false;
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn set_volume(&mut self, volume: f32) {
        tracing::trace!(volume, "Clip audio is not mixed offline");
    }

    fn frame(&mut self) -> Option<&RgbaImage> {
        if self.readiness != Readiness::Ready {
            return None;
        }
        let cached = self.frame.is_some() && (self.frame_pos - self.position).abs() < 1e-9;
        if !cached {
            match self.decode_next() {
                Ok(Some(frame)) => {
                    self.frame = Some(frame);
                    self.frame_pos = self.position;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Clip source failed");
                    self.readiness = Readiness::Failed;
                    self.decoder = None;
                    return None;
                }
            }
        }
        if !self.paused {
            self.position += self.frame_secs();
        }
        self.frame.as_ref()
    }
}

/// Tick a stepped engine until it stops, advancing one frame per tick.
pub fn run_stepped<V, F>(
    engine: &mut PlaybackEngine<SteppedClock, V>,
    mut on_tick: F,
) -> LyricutResult<TickOutcome>
where
    V: VisualSource,
    F: FnMut(&PlaybackEngine<SteppedClock, V>, &TickOutcome),
{
    if engine.master().duration().is_none() {
        return Err(LyricutError::invalid_state(
            "Stepped rendering needs a known duration",
        ));
    }

    loop {
        let outcome = engine.advance_tick();
        on_tick(engine, &outcome);
        match outcome {
            TickOutcome::Rendered { .. } => engine.master_mut().advance(),
            other => return Ok(other),
        }
    }
}
