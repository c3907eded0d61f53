//! ffmpeg/ffprobe wrappers for the local judge's chunked video pass.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use tracing::warn;

use crate::util::ensure_directory;

pub fn is_available(program: &str) -> bool {
    Command::new(program)
        .arg("-version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

pub fn tool_version(program: &str) -> Result<String> {
    let output = Command::new(program)
        .arg("-version")
        .output()
        .with_context(|| format!("failed to run {program} -version"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("{program} -version failed: {}", stderr.trim());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let version_line = stdout
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .unwrap_or("unknown");

    Ok(version_line.to_string())
}

pub fn probe_duration(video_path: &Path) -> Result<f64> {
    let output = Command::new("ffprobe")
        .args(["-v", "quiet", "-show_entries", "format=duration", "-of", "csv=p=0"])
        .arg(video_path)
        .output()
        .with_context(|| format!("failed to execute ffprobe for {}", video_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "ffprobe returned non-zero exit status for {}: {}",
            video_path.display(),
            stderr.trim()
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .trim()
        .parse::<f64>()
        .with_context(|| format!("could not determine duration for {}", video_path.display()))
}

/// Re-encodes to h264/yuv420p with audio stripped, the safest input shape
/// for vision models. Falls back to the original path when re-encoding
/// fails; the caller must not delete the returned path in that case unless
/// it differs from the input.
pub fn standardize_video(input: &Path) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .and_then(|name| name.to_str())
        .unwrap_or("video");
    let extension = input
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("mp4");
    let output_path = input.with_file_name(format!("{stem}_temp.{extension}"));

    let output = Command::new("ffmpeg")
        .args(["-y", "-loglevel", "error", "-i"])
        .arg(input)
        .args(["-c:v", "libx264", "-pix_fmt", "yuv420p", "-an"])
        .arg(&output_path)
        .output()
        .with_context(|| format!("failed to execute ffmpeg for {}", input.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(
            path = %input.display(),
            error = %stderr.trim(),
            "ffmpeg failed to standardize video, using original"
        );
        let _ = fs::remove_file(&output_path);
        return Ok(input.to_path_buf());
    }

    Ok(output_path)
}

pub fn cut_chunk(video_path: &Path, start: f64, duration: f64, output_path: &Path) -> Result<()> {
    let output = Command::new("ffmpeg")
        .args(["-y", "-loglevel", "error", "-i"])
        .arg(video_path)
        .args(["-ss", &start.to_string(), "-t", &duration.to_string()])
        .args(["-c:v", "libx264", "-pix_fmt", "yuv420p", "-an"])
        .arg(output_path)
        .output()
        .with_context(|| format!("failed to execute ffmpeg for {}", video_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "failed to create chunk {}: {}",
            output_path.display(),
            stderr.trim()
        );
    }

    Ok(())
}

/// Samples up to `max_frames` JPEG frames at 1 fps into `frames_dir`,
/// returning them in playback order.
pub fn sample_frames(chunk_path: &Path, frames_dir: &Path, max_frames: usize) -> Result<Vec<PathBuf>> {
    ensure_directory(frames_dir)?;

    let pattern = frames_dir.join("frame_%03d.jpg");
    let output = Command::new("ffmpeg")
        .args(["-y", "-loglevel", "error", "-i"])
        .arg(chunk_path)
        .args(["-vf", "fps=1", "-frames:v", &max_frames.to_string()])
        .arg(&pattern)
        .output()
        .with_context(|| format!("failed to execute ffmpeg for {}", chunk_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "failed to sample frames from {}: {}",
            chunk_path.display(),
            stderr.trim()
        );
    }

    let mut frames = Vec::new();
    let entries = fs::read_dir(frames_dir)
        .with_context(|| format!("failed to read {}", frames_dir.display()))?;
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", frames_dir.display()))?;
        let path = entry.path();
        let is_frame = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("jpg"))
            .unwrap_or(false);
        if is_frame {
            frames.push(path);
        }
    }

    frames.sort();

    if frames.is_empty() {
        bail!("ffmpeg produced no frames for {}", chunk_path.display());
    }

    Ok(frames)
}
