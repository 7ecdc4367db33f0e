//! Still and animated previews of archived video.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use mirror_config::ThumbnailMethod;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Produces a preview image from a video file.
pub trait MediaConverter: Send + Sync {
    fn thumbnail(&self, source: &Path, method: ThumbnailMethod, quality: u8) -> Result<Vec<u8>>;
}

/// `ffprobe` and `ffmpeg` from the `PATH`.
pub struct Ffmpeg {
    ffprobe: PathBuf,
    ffmpeg: PathBuf,
}

impl Ffmpeg {
    pub fn new(ffprobe: impl Into<PathBuf>, ffmpeg: impl Into<PathBuf>) -> Self {
        Self { ffprobe: ffprobe.into(), ffmpeg: ffmpeg.into() }
    }

    pub fn discover() -> Option<Self> {
        match (which::which("ffprobe"), which::which("ffmpeg")) {
            (Ok(ffprobe), Ok(ffmpeg)) => {
                tracing::debug!(ffprobe = %ffprobe.display(), ffmpeg = %ffmpeg.display(), "found ffmpeg executables");
                Some(Self::new(ffprobe, ffmpeg))
            },
            _ => {
                tracing::info!("ffmpeg executables not found in PATH; video thumbnails disabled");
                None
            },
        }
    }

    /// Length of the video in seconds, from what `ffprobe` prints.
    fn duration(&self, source: &Path) -> Result<f64> {
        let output = Command::new(&self.ffprobe)
            .arg(source)
            .output()
            .or_raise(|| ErrorKind::ExternalProcess(self.ffprobe.display().to_string()))?;
        let report = String::from_utf8_lossy(&output.stderr);
        match parse_duration(&report) {
            Some(duration) => Ok(duration),
            None => exn::bail!(ErrorKind::ExternalProcess(format!("no duration reported for {}", source.display()))),
        }
    }
}

impl MediaConverter for Ffmpeg {
    #[tracing::instrument(skip(self), fields(seek))]
    fn thumbnail(&self, source: &Path, method: ThumbnailMethod, quality: u8) -> Result<Vec<u8>> {
        let seek = format_timestamp(self.duration(source)? / 2.0);
        tracing::Span::current().record("seek", seek.as_str());

        let output = Command::new(&self.ffmpeg)
            .arg("-loglevel")
            .arg("error")
            .args(thumbnail_args(source, &seek, method, quality))
            .output()
            .or_raise(|| ErrorKind::ExternalProcess(self.ffmpeg.display().to_string()))?;
        if !output.status.success() || output.stdout.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(status = %output.status, stderr = %stderr.trim(), "ffmpeg produced no thumbnail");
            exn::bail!(ErrorKind::ExternalProcess(format!("{} exited with {}", self.ffmpeg.display(), output.status)));
        }
        Ok(output.stdout)
    }
}

/// Seconds from a `Duration: HH:MM:SS.xx,` line.
fn parse_duration(report: &str) -> Option<f64> {
    let (_, rest) = report.split_once("Duration:")?;
    let stamp = rest.trim_start().split([',', ' ', '\n']).next()?;
    let mut parts = stamp.split(':');
    let (hours, minutes, seconds) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let hours: f64 = hours.parse().ok()?;
    let minutes: f64 = minutes.parse().ok()?;
    let seconds: f64 = seconds.parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

fn format_timestamp(seconds: f64) -> String {
    let millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let (hours, rest) = (millis / 3_600_000, millis % 3_600_000);
    let (minutes, rest) = (rest / 60_000, rest % 60_000);
    format!("{hours:02}:{minutes:02}:{:02}.{:03}", rest / 1000, rest % 1000)
}

fn thumbnail_args(source: &Path, seek: &str, method: ThumbnailMethod, quality: u8) -> Vec<String> {
    let input = source.display().to_string();
    let quality = quality.min(100).to_string();
    let args = match method {
        ThumbnailMethod::Frame => {
            vec!["-i", input.as_str(), "-ss", seek, "-vframes", "1", "-f", "image2", "-c:v", "png", "-"]
        },
        ThumbnailMethod::Gif => vec![
            "-i",
            input.as_str(),
            "-ss",
            seek,
            "-t",
            "60",
            "-f",
            "gif",
            "-filter_complex",
            "[0:v] fps=4,scale=w=240:h=-1,split [a][b];[a] palettegen=stats_mode=single [p];[b][p] paletteuse=new=1",
            "-",
        ],
        ThumbnailMethod::Webp => vec![
            "-i",
            input.as_str(),
            "-vf",
            "fps=12,scale=w=640:h=-1",
            "-t",
            "30",
            "-f",
            "webp",
            "-compression_level",
            "0",
            "-quality",
            quality.as_str(),
            "-",
        ],
    };
    args.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const REPORT: &str = "Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'clip.mp4':\n  Duration: 00:01:30.50, start: 0.000000, bitrate: 1205 kb/s\n";

    #[test]
    fn durations_come_from_the_report() {
        assert_eq!(parse_duration(REPORT), Some(90.5));
        assert_eq!(parse_duration("Duration: N/A, bitrate: N/A"), None);
        assert_eq!(parse_duration("no streams"), None);
    }

    #[rstest]
    #[case(45.25, "00:00:45.250")]
    #[case(3725.0, "01:02:05.000")]
    #[case(0.0, "00:00:00.000")]
    fn timestamps(#[case] seconds: f64, #[case] expected: &str) {
        assert_eq!(format_timestamp(seconds), expected);
    }

    #[test]
    fn frames_are_single_pngs() {
        let args = thumbnail_args(Path::new("/tmp/v.mp4"), "00:00:10.000", ThumbnailMethod::Frame, 80);
        assert_eq!(args, ["-i", "/tmp/v.mp4", "-ss", "00:00:10.000", "-vframes", "1", "-f", "image2", "-c:v", "png", "-"]);
    }

    #[test]
    fn webp_previews_carry_the_quality() {
        let args = thumbnail_args(Path::new("v.mp4"), "00:00:01.000", ThumbnailMethod::Webp, 150);
        assert_eq!(args[args.len() - 2], "100");
        assert!(!args.contains(&"-ss".to_string()));
    }

    #[test]
    fn missing_tools_are_external_process_errors() {
        let ffmpeg = Ffmpeg::new("/nonexistent/ffprobe", "/nonexistent/ffmpeg");
        let err = ffmpeg.thumbnail(Path::new("v.mp4"), ThumbnailMethod::Frame, 80).unwrap_err();
        assert!(matches!(&*err, ErrorKind::ExternalProcess(_)));
    }
}
