//! Video probing and frame extraction through the `ffprobe`/`ffmpeg` command-line tools.

use crate::error::{CodecError, CodecErrorExt};
use crate::spec::ThumbnailSpec;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::Duration;
use tracing::debug;

/// Reads video metadata and renders single frames.
///
/// Calls block; async callers should run them on a blocking pool.
pub trait VideoCodec: Send + Sync + fmt::Debug {
    /// Length of the video at `source`.
    ///
    /// # Errors
    /// [`CodecError::InvalidDuration`] when the length is missing, non-finite or negative.
    fn probe_duration(&self, source: &Path) -> Result<Duration, CodecError>;

    /// Writes the frame shown at `at` to `dest` as a JPEG, cropped to `resize` if given.
    ///
    /// # Errors
    /// Returns a [`CodecError`] when the frame cannot be decoded or written.
    fn extract_frame(
        &self,
        source: &Path,
        at: Duration,
        resize: Option<ThumbnailSpec>,
        dest: &Path,
    ) -> Result<(), CodecError>;
}

/// The frame used as the cover: one third of the way in, rounded to whole seconds.
#[must_use]
pub fn representative_timestamp(duration: Duration) -> Duration {
    Duration::from_secs_f64((duration.as_secs_f64() / 3.0).round())
}

/// Parses a duration in seconds as printed by `ffprobe`.
///
/// # Errors
/// [`CodecError::InvalidDuration`] for anything but a finite, non-negative number.
pub fn parse_duration(raw: &str) -> Result<Duration, CodecError> {
    let trimmed = raw.trim();
    let invalid = || CodecError::InvalidDuration {
        message: if trimmed.is_empty() { "EMPTY".into() } else { trimmed.to_owned().into() },
        context: None,
    };

    let seconds: f64 = trimmed.parse().map_err(|_| invalid())?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(invalid());
    }
    Duration::try_from_secs_f64(seconds).map_err(|_| invalid())
}

/// [`VideoCodec`] that shells out to `ffprobe` and `ffmpeg`.
#[derive(Debug, Clone)]
pub struct FfmpegCodec {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for FfmpegCodec {
    fn default() -> Self {
        Self { ffmpeg: PathBuf::from("ffmpeg"), ffprobe: PathBuf::from("ffprobe") }
    }
}

impl FfmpegCodec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses explicit tool binaries instead of looking them up on `PATH`.
    #[must_use]
    pub fn with_binaries(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self { ffmpeg: ffmpeg.into(), ffprobe: ffprobe.into() }
    }

    fn run(program: &Path, args: &[OsString]) -> Result<Output, CodecError> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .context(format!("Failed to launch {}", program.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CodecError::Tool {
                message: stderr.trim().to_owned().into(),
                context: Some(format!("{} exited with {}", program.display(), output.status).into()),
            });
        }
        Ok(output)
    }
}

impl VideoCodec for FfmpegCodec {
    fn probe_duration(&self, source: &Path) -> Result<Duration, CodecError> {
        let output = Self::run(&self.ffprobe, &probe_args(source))?;
        let duration = parse_duration(&String::from_utf8_lossy(&output.stdout))
            .context(format!("Probing {}", source.display()))?;
        debug!(source = %source.display(), seconds = duration.as_secs_f64(), "Video probed");
        Ok(duration)
    }

    fn extract_frame(
        &self,
        source: &Path,
        at: Duration,
        resize: Option<ThumbnailSpec>,
        dest: &Path,
    ) -> Result<(), CodecError> {
        Self::run(&self.ffmpeg, &frame_args(source, at, resize, dest))?;
        debug!(source = %source.display(), dest = %dest.display(), "Video frame extracted");
        Ok(())
    }
}

fn probe_args(source: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-v",
        "error",
        "-show_entries",
        "format=duration",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();
    args.push(source.as_os_str().to_owned());
    args
}

fn frame_args(
    source: &Path,
    at: Duration,
    resize: Option<ThumbnailSpec>,
    dest: &Path,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-y".into(),
        "-loglevel".into(),
        "error".into(),
        "-ss".into(),
        format!("{:.3}", at.as_secs_f64()).into(),
        "-i".into(),
        source.as_os_str().to_owned(),
        "-frames:v".into(),
        "1".into(),
    ];
    if let Some(spec) = resize {
        args.push("-vf".into());
        args.push(
            format!(
                "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h}",
                w = spec.width,
                h = spec.height
            )
            .into(),
        );
    }
    args.extend(["-f".into(), "image2".into(), "-c:v".into(), "mjpeg".into()]);
    args.push(dest.as_os_str().to_owned());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ffprobe_output() {
        assert_eq!(parse_duration("12.500000\n").unwrap(), Duration::from_millis(12_500));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn rejects_unusable_durations() {
        for raw in ["", "N/A", "-1.0", "inf", "NaN"] {
            assert!(
                matches!(parse_duration(raw), Err(CodecError::InvalidDuration { .. })),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn cover_is_taken_at_a_third() {
        assert_eq!(representative_timestamp(Duration::from_secs(90)), Duration::from_secs(30));
        assert_eq!(representative_timestamp(Duration::from_secs(10)), Duration::from_secs(3));
        assert_eq!(representative_timestamp(Duration::from_secs(2)), Duration::from_secs(1));
        assert_eq!(representative_timestamp(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn frame_args_crop_only_when_resizing() {
        let plain = frame_args(Path::new("in.mp4"), Duration::from_secs(4), None, Path::new("out.jpg"));
        assert!(!plain.iter().any(|a| a == "-vf"));
        assert_eq!(plain.last().unwrap(), "out.jpg");
        assert!(plain.iter().any(|a| a == "4.000"));

        let sized = frame_args(
            Path::new("in.mp4"),
            Duration::from_secs(4),
            Some(ThumbnailSpec::new(64, 48)),
            Path::new("out.jpg"),
        );
        assert!(sized.iter().any(|a| a == "scale=64:48:force_original_aspect_ratio=increase,crop=64:48"));
    }

    #[test]
    fn probe_args_end_with_source() {
        let args = probe_args(Path::new("clip.mov"));
        assert_eq!(args.last().unwrap(), "clip.mov");
    }
}
