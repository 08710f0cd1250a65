//! FFmpeg Runner Module
//!
//! Probes sources and decodes the sampled grayscale frames the complexity
//! analyzer works on.

use std::path::Path;
use std::sync::Arc;

use super::{FFmpegError, FFmpegInfo, FFmpegResult};
use crate::core::analysis::GrayFrame;
use crate::core::process::{configure_tokio_command, stderr_tail};
use crate::core::settings::AnalysisSettings;
use crate::core::VideoMetadata;

const STDERR_TAIL_BYTES: usize = 600;

/// FFmpeg command runner
#[derive(Debug, Clone)]
pub struct FFmpegRunner {
    info: Arc<FFmpegInfo>,
}

impl FFmpegRunner {
    /// Create a new FFmpegRunner from detected FFmpeg installation
    pub fn new(info: FFmpegInfo) -> Self {
        Self {
            info: Arc::new(info),
        }
    }

    /// Get the FFmpeg info
    pub fn info(&self) -> &FFmpegInfo {
        &self.info
    }

    /// Probe a source to get its first video stream's metadata
    pub async fn probe(&self, input: &Path) -> FFmpegResult<VideoMetadata> {
        if !input.exists() {
            return Err(FFmpegError::InvalidInput(format!(
                "Input file does not exist: {}",
                input.display()
            )));
        }

        let mut cmd = tokio::process::Command::new(&self.info.ffprobe_path);
        configure_tokio_command(&mut cmd);
        let output = cmd
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(input)
            .output()
            .await?;

        // ffprobe rejects anything it cannot open or demux
        if !output.status.success() {
            return Err(FFmpegError::InvalidInput(format!(
                "Unreadable source {}: {}",
                input.display(),
                stderr_tail(&output.stderr, STDERR_TAIL_BYTES)
            )));
        }

        let json_str = String::from_utf8_lossy(&output.stdout);
        parse_probe_output(&json_str)
    }

    /// Decode a uniformly strided subset of frames as 8-bit grayscale.
    ///
    /// Frames are downscaled to `analysis_width` (keeping aspect) and at most
    /// `max_sampled_frames` are returned. A source that yields no complete
    /// frame is invalid input.
    pub async fn decode_gray_frames(
        &self,
        input: &Path,
        metadata: &VideoMetadata,
        settings: &AnalysisSettings,
    ) -> FFmpegResult<Vec<GrayFrame>> {
        let (width, height) = analysis_dimensions(metadata, settings.analysis_width)?;
        let stride = sample_stride(metadata.estimated_frame_count(), settings.max_sampled_frames);
        let frame_size = width as usize * height as usize;

        tracing::debug!(
            "Decoding {} every {} frame(s) at {}x{}",
            input.display(),
            stride,
            width,
            height
        );

        let mut cmd = tokio::process::Command::new(&self.info.ffmpeg_path);
        configure_tokio_command(&mut cmd);
        let output = cmd
            .args(["-hide_banner", "-loglevel", "error", "-i"])
            .arg(input)
            .args(decode_filter_args(stride, width, height, settings.max_sampled_frames))
            .output()
            .await?;

        if !output.status.success() {
            return Err(FFmpegError::InvalidInput(format!(
                "Could not decode {}: {}",
                input.display(),
                stderr_tail(&output.stderr, STDERR_TAIL_BYTES)
            )));
        }

        let frames = split_gray_frames(&output.stdout, width, height);
        let leftover = output.stdout.len() % frame_size;
        if leftover != 0 {
            tracing::warn!("Discarding {} trailing bytes of a partial frame", leftover);
        }
        if frames.is_empty() {
            return Err(FFmpegError::InvalidInput(format!(
                "No frames could be decoded from {}",
                input.display()
            )));
        }

        Ok(frames)
    }
}

/// Target analysis size: at most `analysis_width` wide, aspect preserved,
/// both sides even.
fn analysis_dimensions(metadata: &VideoMetadata, analysis_width: u32) -> FFmpegResult<(u32, u32)> {
    if metadata.width == 0 || metadata.height == 0 {
        return Err(FFmpegError::InvalidInput(
            "Source reports no frame dimensions".to_string(),
        ));
    }

    let width = even(analysis_width.min(metadata.width));
    let scaled = (metadata.height as f64 * width as f64 / metadata.width as f64).round() as u32;
    Ok((width, even(scaled)))
}

fn even(value: u32) -> u32 {
    (value & !1).max(2)
}

/// Every `stride`th frame is kept so that about `max_samples` span the video.
fn sample_stride(frame_count: u64, max_samples: u32) -> u64 {
    (frame_count / u64::from(max_samples.max(1))).max(1)
}

fn decode_filter_args(stride: u64, width: u32, height: u32, max_frames: u32) -> Vec<String> {
    vec![
        "-vf".to_string(),
        format!("select='not(mod(n\\,{stride}))',scale={width}:{height},format=gray"),
        "-vsync".to_string(),
        "vfr".to_string(),
        "-frames:v".to_string(),
        max_frames.to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        "gray".to_string(),
        "-".to_string(),
    ]
}

fn split_gray_frames(raw: &[u8], width: u32, height: u32) -> Vec<GrayFrame> {
    let frame_size = width as usize * height as usize;
    if frame_size == 0 {
        return Vec::new();
    }
    raw.chunks_exact(frame_size)
        .map(|chunk| GrayFrame::from_raw(width, height, chunk.to_vec()))
        .collect()
}

/// Parse FFprobe JSON output into the first video stream's metadata
pub fn parse_probe_output(json_str: &str) -> FFmpegResult<VideoMetadata> {
    let json: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| FFmpegError::ParseError(format!("Failed to parse FFprobe output: {}", e)))?;

    let format = json
        .get("format")
        .ok_or_else(|| FFmpegError::ParseError("Missing format info".to_string()))?;

    let format_duration = format
        .get("duration")
        .and_then(|d| d.as_str())
        .and_then(|s| s.parse::<f64>().ok());

    let size_bytes = format
        .get("size")
        .and_then(|s| s.as_str())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let stream = json
        .get("streams")
        .and_then(|s| s.as_array())
        .and_then(|streams| {
            streams
                .iter()
                .find(|s| s.get("codec_type").and_then(|c| c.as_str()) == Some("video"))
        })
        .ok_or_else(|| FFmpegError::InvalidInput("Source has no video stream".to_string()))?;

    let width = stream.get("width").and_then(|w| w.as_u64()).unwrap_or(0) as u32;
    let height = stream.get("height").and_then(|h| h.as_u64()).unwrap_or(0) as u32;

    // r_frame_rate is a rational such as "30/1" or "30000/1001"
    let fps = stream
        .get("r_frame_rate")
        .and_then(|f| f.as_str())
        .and_then(parse_rational)
        .unwrap_or(30.0);

    let frame_count = stream
        .get("nb_frames")
        .and_then(|n| n.as_str())
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|n| *n > 0);

    let duration_sec = stream
        .get("duration")
        .and_then(|d| d.as_str())
        .and_then(|s| s.parse::<f64>().ok())
        .or(format_duration)
        .unwrap_or(0.0);

    let codec = stream
        .get("codec_name")
        .and_then(|c| c.as_str())
        .unwrap_or("unknown")
        .to_string();

    Ok(VideoMetadata {
        width,
        height,
        fps,
        frame_count,
        duration_sec,
        size_bytes,
        codec,
    })
}

fn parse_rational(s: &str) -> Option<f64> {
    match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            (den > 0.0).then(|| num / den)
        }
        None => s.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn metadata(width: u32, height: u32) -> VideoMetadata {
        VideoMetadata {
            width,
            height,
            fps: 30.0,
            frame_count: Some(300),
            duration_sec: 10.0,
            size_bytes: 1_000_000,
            codec: "h264".to_string(),
        }
    }

    #[test]
    fn test_parse_probe_output_video() {
        let json = r#"{
            "format": {
                "duration": "10.5",
                "size": "1048576",
                "format_name": "mov,mp4,m4a,3gp,3g2,mj2"
            },
            "streams": [
                {
                    "codec_type": "audio",
                    "codec_name": "aac",
                    "sample_rate": "48000",
                    "channels": 2
                },
                {
                    "codec_type": "video",
                    "codec_name": "h264",
                    "width": 1920,
                    "height": 1080,
                    "r_frame_rate": "30/1",
                    "nb_frames": "315",
                    "pix_fmt": "yuv420p"
                }
            ]
        }"#;

        let meta = parse_probe_output(json).unwrap();
        assert_eq!(meta.duration_sec, 10.5);
        assert_eq!(meta.size_bytes, 1048576);
        assert_eq!(meta.width, 1920);
        assert_eq!(meta.height, 1080);
        assert_eq!(meta.fps, 30.0);
        assert_eq!(meta.frame_count, Some(315));
        assert_eq!(meta.codec, "h264");
    }

    #[test]
    fn test_parse_fractional_framerate() {
        let json = r#"{
            "format": { "duration": "1.0", "size": "1000" },
            "streams": [
                {
                    "codec_type": "video",
                    "codec_name": "h264",
                    "width": 1920,
                    "height": 1080,
                    "r_frame_rate": "30000/1001"
                }
            ]
        }"#;

        let meta = parse_probe_output(json).unwrap();
        // 30000/1001 ≈ 29.97
        assert!((meta.fps - 29.97).abs() < 0.01);
        assert_eq!(meta.frame_count, None);
        assert_eq!(meta.estimated_frame_count(), 30);
    }

    #[test]
    fn test_audio_only_source_is_invalid() {
        let json = r#"{
            "format": { "duration": "3.0", "size": "100" },
            "streams": [ { "codec_type": "audio", "codec_name": "aac" } ]
        }"#;
        assert!(matches!(
            parse_probe_output(json),
            Err(FFmpegError::InvalidInput(_))
        ));
        assert!(matches!(
            parse_probe_output("not json"),
            Err(FFmpegError::ParseError(_))
        ));
    }

    #[test]
    fn test_sample_stride() {
        assert_eq!(sample_stride(300, 20), 15);
        assert_eq!(sample_stride(10, 20), 1);
        assert_eq!(sample_stride(0, 20), 1);
        assert_eq!(sample_stride(100, 0), 100);
    }

    #[test]
    fn test_analysis_dimensions_keep_aspect() {
        assert_eq!(analysis_dimensions(&metadata(1920, 1080), 320).unwrap(), (320, 180));
        assert_eq!(analysis_dimensions(&metadata(160, 90), 320).unwrap(), (160, 90));
        assert_eq!(analysis_dimensions(&metadata(641, 361), 1000).unwrap(), (640, 360));
        assert!(analysis_dimensions(&metadata(0, 0), 320).is_err());
    }

    #[test]
    fn test_decode_filter_selects_strided_gray_frames() {
        let args = decode_filter_args(15, 320, 180, 20);
        assert_eq!(args[0], "-vf");
        assert_eq!(
            args[1],
            "select='not(mod(n\\,15))',scale=320:180,format=gray"
        );
        assert!(args.windows(2).any(|w| w[0] == "-frames:v" && w[1] == "20"));
        assert_eq!(args.last().map(String::as_str), Some("-"));
    }

    #[test]
    fn test_split_drops_partial_frame() {
        let raw = vec![7u8; 4 * 2 * 3 + 5];
        let frames = split_gray_frames(&raw, 4, 2);
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.width() == 4 && f.height() == 2));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_probe_failure_is_invalid_input() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("garbage.mp4");
        std::fs::write(&path, b"not a video").unwrap();

        let runner = FFmpegRunner::new(FFmpegInfo {
            ffmpeg_path: PathBuf::from("/bin/false"),
            ffprobe_path: PathBuf::from("/bin/false"),
            version: "test".to_string(),
        });
        let result = runner.probe(&path).await;
        assert!(matches!(result, Err(FFmpegError::InvalidInput(_))));
    }
}
