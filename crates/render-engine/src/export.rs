//! Export sinks: consumers of the composited frame stream.
//!
//! The playback engine pushes every exported frame into an [`ExportSink`]
//! and asks it for the finished artifact when the master clock ends.
//! [`FfmpegExportSink`] pipes raw RGBA frames into an `ffmpeg` child that
//! encodes VP9/WebM and muxes the master audio track.

use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;
use std::time::Instant;

use image::RgbaImage;
use lyricut_common::error::{LyricutError, LyricutResult};

use crate::probe::command_exists;

/// Parameters for one export run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSettings {
    pub output_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: u32,

    /// Video bitrate in kbps.
    pub video_bitrate_kbps: u32,

    /// Audio bitrate in kbps.
    pub audio_bitrate_kbps: u32,

    /// Master audio file to mux, if any.
    pub audio_path: Option<PathBuf>,

    /// Expected length, used for progress reporting.
    pub duration_secs: Option<f64>,
}

/// What a started sink can actually record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkCapabilities {
    /// `false` means the export is video-only.
    pub audio: bool,
}

/// Result of a finished export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    pub path: PathBuf,
    pub frames: u64,
    pub duration_secs: f64,
    pub has_audio: bool,
}

/// Export progress report.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    pub frames_rendered: u64,

    /// Estimated wall time remaining in seconds.
    pub eta_secs: f64,

    pub stage: ExportStage,
}

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Preparing,
    Rendering,
    Finalizing,
    Complete,
    Failed,
}

/// Build a progress report from the master position.
pub fn progress_report(
    frames_rendered: u64,
    position_secs: f64,
    duration_secs: Option<f64>,
    elapsed_secs: f64,
) -> ExportProgress {
    let progress = match duration_secs {
        Some(d) if d > 0.0 => (position_secs / d).clamp(0.0, 1.0),
        _ => 0.0,
    };
    let eta_secs = if progress > 0.0 {
        (elapsed_secs / progress - elapsed_secs).max(0.0)
    } else {
        0.0
    };
    ExportProgress {
        progress,
        frames_rendered,
        eta_secs,
        stage: if frames_rendered == 0 {
            ExportStage::Preparing
        } else if progress >= 1.0 {
            ExportStage::Finalizing
        } else {
            ExportStage::Rendering
        },
    }
}

/// Consumer of the exported frame stream.
pub trait ExportSink: Send {
    fn name(&self) -> &str;

    /// Begin recording. Reports whether audio will be captured.
    fn start(&mut self, settings: &ExportSettings) -> LyricutResult<SinkCapabilities>;

    /// Append one composited frame at master time `time_secs`.
    fn push_frame(&mut self, frame: &RgbaImage, time_secs: f64) -> LyricutResult<()>;

    /// Finish recording and hand back the artifact.
    fn stop(&mut self) -> LyricutResult<ExportArtifact>;
}

struct RunningEncoder {
    child: Child,
    stdin: ChildStdin,
    stderr_task: JoinHandle<String>,
    settings: ExportSettings,
    has_audio: bool,
    frames: u64,
    last_time_secs: f64,
    started: Instant,
}

/// Encodes frames with an `ffmpeg` subprocess.
#[derive(Default)]
pub struct FfmpegExportSink {
    running: Option<RunningEncoder>,
}

impl FfmpegExportSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if ffmpeg is available on the system.
    pub fn is_available() -> bool {
        command_exists("ffmpeg")
    }

    fn build_args(settings: &ExportSettings, audio: Option<&PathBuf>) -> Vec<String> {
        let mut args: Vec<String> = [
            "-y",
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.push(format!("{}x{}", settings.width, settings.height));
        args.push("-r".to_string());
        args.push(settings.fps.max(1).to_string());
        args.push("-i".to_string());
        args.push("-".to_string());

        if let Some(audio) = audio {
            args.push("-i".to_string());
            args.push(audio.display().to_string());
            args.extend(["-map", "0:v:0", "-map", "1:a:0"].map(String::from));
        }

        args.extend(
            [
                "-c:v",
                "libvpx-vp9",
                "-deadline",
                "realtime",
                "-cpu-used",
                "8",
                "-pix_fmt",
                "yuv420p",
                "-b:v",
            ]
            .map(String::from),
        );
        args.push(format!("{}k", settings.video_bitrate_kbps.max(500)));

        if audio.is_some() {
            args.extend(["-c:a", "libopus", "-b:a"].map(String::from));
            args.push(format!("{}k", settings.audio_bitrate_kbps.max(64)));
            args.push("-shortest".to_string());
        }

        args.push(settings.output_path.display().to_string());
        args
    }
}

impl ExportSink for FfmpegExportSink {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn start(&mut self, settings: &ExportSettings) -> LyricutResult<SinkCapabilities> {
        if self.running.is_some() {
            return Err(LyricutError::invalid_state("ffmpeg sink already recording"));
        }
        if !Self::is_available() {
            return Err(LyricutError::unsupported(
                "No supported encoder found (expected ffmpeg in PATH)",
            ));
        }
        if let Some(parent) = settings.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let audio = match &settings.audio_path {
            Some(path) if path.exists() => Some(path),
            Some(path) => {
                tracing::warn!(path = %path.display(), "Master audio missing; exporting video only");
                None
            }
            None => None,
        };

        let args = Self::build_args(settings, audio);
        tracing::debug!(?args, "Running ffmpeg");

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| LyricutError::export(format!("Failed to start ffmpeg: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| LyricutError::export("Failed to open ffmpeg stdin"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| LyricutError::export("Failed to capture ffmpeg stderr"))?;

        // ffmpeg blocks once its stderr pipe fills up, so drain it on a thread.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut output = String::new();
            match BufReader::new(stderr).read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        tracing::info!(
            pid = child.id(),
            output = %settings.output_path.display(),
            width = settings.width,
            height = settings.height,
            fps = settings.fps,
            audio = audio.is_some(),
            "ffmpeg export started"
        );

        let has_audio = audio.is_some();
        self.running = Some(RunningEncoder {
            child,
            stdin,
            stderr_task,
            settings: settings.clone(),
            has_audio,
            frames: 0,
            last_time_secs: 0.0,
            started: Instant::now(),
        });

        Ok(SinkCapabilities { audio: has_audio })
    }

    fn push_frame(&mut self, frame: &RgbaImage, time_secs: f64) -> LyricutResult<()> {
        let encoder = self
            .running
            .as_mut()
            .ok_or_else(|| LyricutError::invalid_state("ffmpeg sink is not recording"))?;

        let expected = (encoder.settings.width, encoder.settings.height);
        if frame.dimensions() != expected {
            return Err(LyricutError::export(format!(
                "Frame is {:?}, encoder expects {:?}",
                frame.dimensions(),
                expected
            )));
        }

        encoder
            .stdin
            .write_all(frame.as_raw())
            .map_err(|e| LyricutError::export(format!("ffmpeg rejected frame: {e}")))?;
        encoder.frames += 1;
        encoder.last_time_secs = time_secs;

        if encoder.frames % (u64::from(encoder.settings.fps.max(1)) * 5) == 0 {
            let report = progress_report(
                encoder.frames,
                time_secs,
                encoder.settings.duration_secs,
                encoder.started.elapsed().as_secs_f64(),
            );
            tracing::info!(
                frames = report.frames_rendered,
                progress = report.progress,
                eta_secs = report.eta_secs,
                "Export progress"
            );
        }
        Ok(())
    }

    fn stop(&mut self) -> LyricutResult<ExportArtifact> {
        let RunningEncoder {
            mut child,
            stdin,
            stderr_task,
            settings,
            has_audio,
            frames,
            last_time_secs,
            started,
        } = self
            .running
            .take()
            .ok_or_else(|| LyricutError::invalid_state("ffmpeg sink is not recording"))?;

        // Closing stdin signals end of stream.
        drop(stdin);

        let status = child
            .wait()
            .map_err(|e| LyricutError::export(format!("Failed to wait on ffmpeg: {e}")))?;
        let stderr_output = stderr_task
            .join()
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            return Err(LyricutError::export(format!(
                "ffmpeg export failed (status {}): {}",
                status,
                stderr_output.trim()
            )));
        }

        let duration_secs = frames as f64 / f64::from(settings.fps.max(1));
        tracing::info!(
            output = %settings.output_path.display(),
            frames,
            duration_secs,
            last_time_secs,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Export finished"
        );

        Ok(ExportArtifact {
            path: settings.output_path,
            frames,
            duration_secs,
            has_audio,
        })
    }
}

impl Drop for FfmpegExportSink {
    fn drop(&mut self) {
        if let Some(mut encoder) = self.running.take() {
            tracing::warn!("ffmpeg sink dropped while recording; killing encoder");
            let _ = encoder.child.kill();
            let _ = encoder.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(audio: Option<&str>) -> ExportSettings {
        ExportSettings {
            output_path: PathBuf::from("/tmp/out/song_cinematic.webm"),
            width: 1280,
            height: 720,
            fps: 30,
            video_bitrate_kbps: 8000,
            audio_bitrate_kbps: 192,
            audio_path: audio.map(PathBuf::from),
            duration_secs: Some(10.0),
        }
    }

    #[test]
    fn test_ffmpeg_args_video_only() {
        let args = FfmpegExportSink::build_args(&settings(None), None);
        let joined = args.join(" ");
        assert!(joined.contains("-f rawvideo -pix_fmt rgba -s 1280x720 -r 30 -i -"));
        assert!(joined.contains("-c:v libvpx-vp9"));
        assert!(joined.contains("-b:v 8000k"));
        assert!(!joined.contains("libopus"));
        assert_eq!(args.last().map(String::as_str), Some("/tmp/out/song_cinematic.webm"));
    }

    #[test]
    fn test_ffmpeg_args_with_audio() {
        let audio = PathBuf::from("/music/song.mp3");
        let args = FfmpegExportSink::build_args(&settings(Some("/music/song.mp3")), Some(&audio));
        let joined = args.join(" ");
        assert!(joined.contains("-i /music/song.mp3 -map 0:v:0 -map 1:a:0"));
        assert!(joined.contains("-c:a libopus -b:a 192k -shortest"));
    }

    #[test]
    fn test_progress_report() {
        let report = progress_report(150, 5.0, Some(10.0), 2.0);
        assert!((report.progress - 0.5).abs() < 1e-9);
        assert!((report.eta_secs - 2.0).abs() < 1e-9);
        assert_eq!(report.stage, ExportStage::Rendering);

        let unknown = progress_report(10, 5.0, None, 1.0);
        assert_eq!(unknown.progress, 0.0);
        assert_eq!(unknown.eta_secs, 0.0);

        let before_first = progress_report(0, 0.0, Some(10.0), 0.0);
        assert_eq!(before_first.stage, ExportStage::Preparing);

        let done = progress_report(300, 10.0, Some(10.0), 4.0);
        assert_eq!(done.stage, ExportStage::Finalizing);
    }

    #[test]
    fn test_push_without_start_is_rejected() {
        let mut sink = FfmpegExportSink::new();
        let frame = RgbaImage::new(4, 4);
        assert!(sink.push_frame(&frame, 0.0).is_err());
        assert!(sink.stop().is_err());
    }
}
