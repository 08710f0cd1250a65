//! FFmpeg-backed encoder for measured transcodes.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tokio::process::Command;

use crate::core::measure::{EncodeJob, Encoder};
use crate::core::process::configure_tokio_command;

/// Builds `ffmpeg` invocations for one encoding profile.
#[derive(Debug, Clone)]
pub struct FFmpegEncoder {
    ffmpeg_path: PathBuf,
    threads: u32,
}

impl FFmpegEncoder {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, threads: u32) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            threads: threads.max(1),
        }
    }

    pub fn threads(&self) -> u32 {
        self.threads
    }

    fn encode_args(&self, job: &EncodeJob) -> Vec<OsString> {
        let profile = &job.profile;
        let mut args: Vec<OsString> = vec!["-hide_banner".into(), "-y".into(), "-i".into()];
        args.push(job.input.clone().into_os_string());
        args.extend(
            [
                "-c:v".to_string(),
                profile.codec.ffmpeg_name().to_string(),
                "-preset".to_string(),
                profile.preset.name().to_string(),
                "-crf".to_string(),
                profile.quality_factor.to_string(),
                "-threads".to_string(),
                self.threads.to_string(),
            ]
            .into_iter()
            .map(OsString::from),
        );
        args.push(job.output.clone().into_os_string());
        args
    }

    fn warm_up_args(input: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-y",
            "-ss",
            "0",
            "-t",
            "0.1",
            "-i",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.push(input.as_os_str().to_os_string());
        args.extend(["-f", "null", "-"].into_iter().map(OsString::from));
        args
    }
}

impl Encoder for FFmpegEncoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn encode_command(&self, job: &EncodeJob) -> Command {
        let mut cmd = Command::new(&self.ffmpeg_path);
        configure_tokio_command(&mut cmd);
        cmd.args(self.encode_args(job));
        cmd
    }

    /// Decodes the first 100 ms so codec libraries and the source are warm.
    fn warm_up_command(&self, input: &Path) -> Option<Command> {
        let mut cmd = Command::new(&self.ffmpeg_path);
        configure_tokio_command(&mut cmd);
        cmd.args(Self::warm_up_args(input));
        Some(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Codec, EncodingProfile, Preset, ProfileMode};

    fn job() -> EncodeJob {
        EncodeJob {
            input: PathBuf::from("/in/clip.mp4"),
            output: PathBuf::from("/out/rule_based_clip.mp4"),
            profile: EncodingProfile::new(
                Codec::Libx264,
                Preset::Superfast,
                26,
                ProfileMode::RuleBased,
            ),
        }
    }

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn encode_args_carry_profile_parameters() {
        let encoder = FFmpegEncoder::new("ffmpeg", 4);
        let args = strings(encoder.encode_args(&job()));
        assert_eq!(
            args,
            vec![
                "-hide_banner",
                "-y",
                "-i",
                "/in/clip.mp4",
                "-c:v",
                "libx264",
                "-preset",
                "superfast",
                "-crf",
                "26",
                "-threads",
                "4",
                "/out/rule_based_clip.mp4",
            ]
        );
    }

    #[test]
    fn zero_threads_is_raised_to_one() {
        assert_eq!(FFmpegEncoder::new("ffmpeg", 0).threads(), 1);
    }

    #[test]
    fn warm_up_decodes_a_short_prefix_to_null() {
        let args = strings(FFmpegEncoder::warm_up_args(Path::new("/in/clip.mp4")));
        assert!(args.windows(2).any(|w| w[0] == "-t" && w[1] == "0.1"));
        assert!(args.ends_with(&["-f".to_string(), "null".to_string(), "-".to_string()]));
        assert!(FFmpegEncoder::new("ffmpeg", 1)
            .warm_up_command(Path::new("/in/clip.mp4"))
            .is_some());
    }
}
