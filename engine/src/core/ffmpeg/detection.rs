//! FFmpeg Detection Module
//!
//! Locates the ffmpeg/ffprobe pair, either from an explicitly configured
//! path or from the system installation.

use std::path::{Path, PathBuf};
use std::process::Command;

use super::{FFmpegError, FFmpegResult};
use crate::core::process::configure_std_command;

#[cfg(target_os = "windows")]
const FFMPEG_BINARY: &str = "ffmpeg.exe";
#[cfg(not(target_os = "windows"))]
const FFMPEG_BINARY: &str = "ffmpeg";

#[cfg(target_os = "windows")]
const FFPROBE_BINARY: &str = "ffprobe.exe";
#[cfg(not(target_os = "windows"))]
const FFPROBE_BINARY: &str = "ffprobe";

/// Information about a detected FFmpeg installation
#[derive(Debug, Clone)]
pub struct FFmpegInfo {
    /// Path to ffmpeg binary
    pub ffmpeg_path: PathBuf,
    /// Path to ffprobe binary
    pub ffprobe_path: PathBuf,
    /// FFmpeg version string
    pub version: String,
}

/// Detect FFmpeg, preferring an explicitly configured binary.
///
/// With an override, ffprobe is looked up next to it first and then on the
/// system.
pub fn detect_ffmpeg(override_path: Option<&Path>) -> FFmpegResult<FFmpegInfo> {
    let Some(ffmpeg_path) = override_path else {
        return detect_system_ffmpeg();
    };

    if !ffmpeg_path.is_file() {
        tracing::warn!(
            "Configured FFmpeg path does not exist: {}",
            ffmpeg_path.display()
        );
        return Err(FFmpegError::NotFound);
    }

    let sibling = ffmpeg_path.with_file_name(FFPROBE_BINARY);
    let ffprobe_path = if sibling.is_file() {
        sibling
    } else {
        find_binary(FFPROBE_BINARY)?
    };

    let version = get_ffmpeg_version(ffmpeg_path)?;
    Ok(FFmpegInfo {
        ffmpeg_path: ffmpeg_path.to_path_buf(),
        ffprobe_path,
        version,
    })
}

/// Detect FFmpeg from common install locations and the system PATH.
pub fn detect_system_ffmpeg() -> FFmpegResult<FFmpegInfo> {
    let ffmpeg_path = find_binary(FFMPEG_BINARY)?;
    let ffprobe_path = find_binary(FFPROBE_BINARY)?;

    let version = get_ffmpeg_version(&ffmpeg_path)?;

    Ok(FFmpegInfo {
        ffmpeg_path,
        ffprobe_path,
        version,
    })
}

fn find_binary(binary_name: &str) -> FFmpegResult<PathBuf> {
    for dir in get_common_ffmpeg_paths() {
        let candidate = dir.join(binary_name);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    if let Some(path_var) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&path_var) {
            let candidate = dir.join(binary_name);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }

    Err(FFmpegError::NotFound)
}

/// Get common FFmpeg installation paths for the current platform
fn get_common_ffmpeg_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    #[cfg(target_os = "windows")]
    {
        paths.push(PathBuf::from(r"C:\ffmpeg\bin"));
        paths.push(PathBuf::from(r"C:\Program Files\ffmpeg\bin"));

        if let Ok(programdata) = std::env::var("ProgramData") {
            paths.push(PathBuf::from(programdata).join("chocolatey").join("bin"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        paths.push(PathBuf::from("/opt/homebrew/bin"));
        paths.push(PathBuf::from("/usr/local/bin"));
        paths.push(PathBuf::from("/opt/local/bin")); // MacPorts
    }

    #[cfg(target_os = "linux")]
    {
        paths.push(PathBuf::from("/usr/bin"));
        paths.push(PathBuf::from("/usr/local/bin"));
        paths.push(PathBuf::from("/snap/bin"));
    }

    paths
}

/// Get FFmpeg version string
fn get_ffmpeg_version(ffmpeg_path: &Path) -> FFmpegResult<String> {
    let mut cmd = Command::new(ffmpeg_path);
    configure_std_command(&mut cmd);
    let output = cmd.arg("-version").output()?;

    if !output.status.success() {
        return Err(FFmpegError::ExecutionFailed(
            "Failed to get FFmpeg version".to_string(),
        ));
    }

    parse_version_line(&String::from_utf8_lossy(&output.stdout))
}

/// Parses "ffmpeg version X.Y.Z ..." from `ffmpeg -version` output.
fn parse_version_line(output: &str) -> FFmpegResult<String> {
    let Some(first_line) = output.lines().next() else {
        return Err(FFmpegError::ParseError(
            "Could not parse FFmpeg version".to_string(),
        ));
    };

    Ok(first_line
        .strip_prefix("ffmpeg version ")
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap_or(first_line)
        .to_string())
}
