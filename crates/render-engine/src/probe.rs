//! Media inspection through `ffprobe`.

use std::path::Path;
use std::process::Command;

/// Whether `binary` is on `PATH`.
pub fn command_exists(binary: &str) -> bool {
    Command::new(binary)
        .arg("-version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Width and height of the first video stream.
pub fn probe_video_dimensions(path: &Path) -> Option<(u32, u32)> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=p=0:s=x",
        ])
        .arg(path)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    parse_dimensions(&String::from_utf8(output.stdout).ok()?)
}

/// Container duration in seconds.
pub fn probe_duration_secs(path: &Path) -> Option<f64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    parse_duration(&String::from_utf8(output.stdout).ok()?)
}

fn parse_dimensions(raw: &str) -> Option<(u32, u32)> {
    let line = raw.lines().next()?.trim();
    let (w, h) = line.split_once('x')?;
    let width = w.trim().parse::<u32>().ok()?;
    let height = h.trim().trim_end_matches('x').parse::<u32>().ok()?;
    if width == 0 || height == 0 {
        return None;
    }
    Some((width, height))
}

fn parse_duration(raw: &str) -> Option<f64> {
    let secs = raw.lines().next()?.trim().parse::<f64>().ok()?;
    (secs.is_finite() && secs > 0.0).then_some(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dimensions() {
        assert_eq!(parse_dimensions("1920x1080\n"), Some((1920, 1080)));
        assert_eq!(parse_dimensions("1280x720x\n"), Some((1280, 720)));
        assert_eq!(parse_dimensions("0x1080"), None);
        assert_eq!(parse_dimensions(""), None);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("183.456000\n"), Some(183.456));
        assert_eq!(parse_duration("N/A"), None);
        assert_eq!(parse_duration("0.0"), None);
    }

    #[test]
    fn test_probe_missing_file() {
        let missing = Path::new("/nonexistent/lyricut/clip.mp4");
        assert_eq!(probe_video_dimensions(missing), None);
        assert_eq!(probe_duration_secs(missing), None);
    }
}
