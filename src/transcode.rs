//! ffmpeg invocation for burning a watermark into a video
//!
//! One call per job: the watermark is scaled to the resolved overlay size,
//! composited at the resolved position, and the video is re-encoded with
//! x264. Audio is copied untouched.
//!
//! Rate control:
//! - Source bit rate known: target 1.1× source, `maxrate` 1.5× and
//!   `bufsize` 2× the target
//! - Otherwise: constant quality (`-crf 18`)

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{Result, WatermarkError};
use crate::geometry::OverlayGeometry;

/// Lines of ffmpeg stderr kept in a failure report
const STDERR_TAIL_LINES: usize = 20;

/// Encoder rate-control mode for one job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateControl {
    /// Constant rate factor
    Crf(u8),
    /// Average bit rate with a VBV ceiling, all in bits per second
    Bitrate { target: u64, maxrate: u64, bufsize: u64 },
}

/// Encoder settings shared by every job
#[derive(Debug, Clone)]
pub struct TranscodeConfig {
    /// Path to ffmpeg binary
    pub ffmpeg_path: String,
    /// Video encoder
    pub video_codec: String,
    /// Encoder preset
    pub preset: String,
    /// Constant rate factor used when the source bit rate is unknown
    pub crf: u8,
    /// H.264 profile
    pub profile: String,
    /// H.264 level
    pub level: String,
    /// Output pixel format
    pub pix_fmt: String,
    /// Match the source bit rate when it is known
    pub match_source_bitrate: bool,
    /// Target bit rate as a multiple of the source
    pub bitrate_factor: f64,
    /// `maxrate` as a multiple of the target
    pub maxrate_factor: f64,
    /// `bufsize` as a multiple of the target
    pub bufsize_factor: f64,
    /// Wall-clock limit for one ffmpeg run
    pub timeout: Duration,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: which::which("ffmpeg").map_or_else(
                |_| "ffmpeg".to_string(),
                |p| p.to_string_lossy().to_string(),
            ),
            video_codec: "libx264".to_string(),
            preset: "slow".to_string(),
            crf: 18,
            profile: "high".to_string(),
            level: "4.1".to_string(),
            pix_fmt: "yuv420p".to_string(),
            match_source_bitrate: true,
            bitrate_factor: 1.1,
            maxrate_factor: 1.5,
            bufsize_factor: 2.0,
            timeout: Duration::from_secs(3600),
        }
    }
}

impl TranscodeConfig {
    /// Specify custom ffmpeg binary path
    #[must_use]
    pub fn with_ffmpeg_path(mut self, path: &str) -> Self {
        self.ffmpeg_path = path.to_string();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Always encode at constant quality
    #[must_use]
    pub fn constant_quality(mut self) -> Self {
        self.match_source_bitrate = false;
        self
    }

    /// Pick rate control for a source with the given bit rate
    #[must_use]
    pub fn rate_control(&self, source_bit_rate: Option<u64>) -> RateControl {
        match source_bit_rate {
            Some(source) if self.match_source_bitrate && source > 0 => {
                let target = (source as f64 * self.bitrate_factor) as u64;
                RateControl::Bitrate {
                    target,
                    maxrate: (target as f64 * self.maxrate_factor) as u64,
                    bufsize: (target as f64 * self.bufsize_factor) as u64,
                }
            }
            _ => RateControl::Crf(self.crf),
        }
    }
}

/// Everything ffmpeg needs for one watermark job
#[derive(Debug, Clone, Copy)]
pub struct TranscodeRequest<'a> {
    pub input: &'a Path,
    pub watermark: &'a Path,
    pub output: &'a Path,
    pub geometry: &'a OverlayGeometry,
    pub source_bit_rate: Option<u64>,
}

/// ffmpeg-based watermark transcoder
#[derive(Debug, Clone, Default)]
pub struct Transcoder {
    config: TranscodeConfig,
}

impl Transcoder {
    /// Create a transcoder with custom config
    #[must_use]
    pub fn with_config(config: TranscodeConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &TranscodeConfig {
        &self.config
    }

    /// Check if ffmpeg is available
    pub async fn check_available(&self) -> bool {
        Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Filter graph: scale input 1 to the overlay size, composite on input 0
    #[must_use]
    pub fn build_filter_complex(geometry: &OverlayGeometry) -> String {
        format!(
            "[1]scale={w}:{h}:force_original_aspect_ratio=decrease[wm];[0][wm]overlay={x}:{y}",
            w = geometry.width,
            h = geometry.height,
            x = geometry.x,
            y = geometry.y,
        )
    }

    /// Build ffmpeg arguments
    fn build_args(&self, request: &TranscodeRequest<'_>) -> Vec<OsString> {
        let config = &self.config;
        let mut args: Vec<OsString> = Vec::new();

        extend(&mut args, &["-hide_banner", "-loglevel", "error", "-i"]);
        args.push(request.input.into());
        args.push("-i".into());
        args.push(request.watermark.into());

        let filter = Self::build_filter_complex(request.geometry);
        extend(&mut args, &["-filter_complex", &filter]);
        extend(&mut args, &["-c:v", &config.video_codec, "-preset", &config.preset]);

        match config.rate_control(request.source_bit_rate) {
            RateControl::Crf(crf) => extend(&mut args, &["-crf", &crf.to_string()]),
            RateControl::Bitrate {
                target,
                maxrate,
                bufsize,
            } => extend(
                &mut args,
                &[
                    "-b:v",
                    &target.to_string(),
                    "-maxrate",
                    &maxrate.to_string(),
                    "-bufsize",
                    &bufsize.to_string(),
                ],
            ),
        }

        extend(
            &mut args,
            &[
                "-profile:v",
                &config.profile,
                "-level",
                &config.level,
                "-pix_fmt",
                &config.pix_fmt,
                "-movflags",
                "+faststart",
                "-c:a",
                "copy",
                "-y",
            ],
        );
        args.push(request.output.into());

        args
    }

    /// Run ffmpeg for one job.
    ///
    /// Success is decided by the exit status alone. On timeout the child is
    /// killed and any partial output is left in place.
    pub async fn run(&self, request: &TranscodeRequest<'_>) -> Result<()> {
        let args = self.build_args(request);
        debug!(?args, "ffmpeg args");

        let child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = tokio::time::timeout(self.config.timeout, child.wait_with_output())
            .await
            .map_err(|_| WatermarkError::Timeout {
                tool: "ffmpeg",
                after: self.config.timeout,
            })??;

        if !output.status.success() {
            return Err(WatermarkError::Transcode {
                code: output.status.code(),
                stderr: stderr_tail(&String::from_utf8_lossy(&output.stderr)),
            });
        }

        info!(output = %request.output.display(), "ffmpeg finished");
        Ok(())
    }
}

fn extend(args: &mut Vec<OsString>, items: &[&str]) {
    args.extend(items.iter().map(OsString::from));
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.trim_end().lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn geometry() -> OverlayGeometry {
        OverlayGeometry {
            x: 1678,
            y: 930,
            width: 192,
            height: 100,
            adjustments: Vec::new(),
        }
    }

    fn args_for(transcoder: &Transcoder, bit_rate: Option<u64>) -> Vec<String> {
        let geometry = geometry();
        let request = TranscodeRequest {
            input: Path::new("in/clip.mp4"),
            watermark: Path::new("watermarks/douyin.png"),
            output: Path::new("out/clip_抖音精选_带水印.mp4"),
            geometry: &geometry,
            source_bit_rate: bit_rate,
        };
        transcoder
            .build_args(&request)
            .into_iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect()
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn filter_complex_scales_then_overlays() {
        assert_eq!(
            Transcoder::build_filter_complex(&geometry()),
            "[1]scale=192:100:force_original_aspect_ratio=decrease[wm];[0][wm]overlay=1678:930"
        );
    }

    #[test]
    fn filter_complex_keeps_negative_offsets() {
        let mut geo = geometry();
        geo.x = -210;
        assert!(Transcoder::build_filter_complex(&geo).ends_with("overlay=-210:930"));
    }

    #[test]
    fn rate_control_matches_source() {
        let config = TranscodeConfig::default();
        assert_eq!(
            config.rate_control(Some(5_000_000)),
            RateControl::Bitrate {
                target: 5_500_000,
                maxrate: 8_250_000,
                bufsize: 11_000_000,
            }
        );
        assert_eq!(config.rate_control(None), RateControl::Crf(18));
        assert_eq!(config.rate_control(Some(0)), RateControl::Crf(18));
        assert_eq!(
            config.constant_quality().rate_control(Some(5_000_000)),
            RateControl::Crf(18)
        );
    }

    #[test]
    fn args_without_bitrate_use_crf() {
        let args = args_for(&Transcoder::default(), None);
        assert_eq!(value_after(&args, "-crf"), Some("18"));
        assert!(!args.contains(&"-b:v".to_string()));
        assert_eq!(value_after(&args, "-c:v"), Some("libx264"));
        assert_eq!(value_after(&args, "-preset"), Some("slow"));
        assert_eq!(value_after(&args, "-c:a"), Some("copy"));
        assert_eq!(value_after(&args, "-movflags"), Some("+faststart"));
    }

    #[test]
    fn args_with_bitrate_drop_crf() {
        let args = args_for(&Transcoder::default(), Some(2_000_000));
        assert!(!args.contains(&"-crf".to_string()));
        assert_eq!(value_after(&args, "-b:v"), Some("2200000"));
        assert_eq!(value_after(&args, "-maxrate"), Some("3300000"));
        assert_eq!(value_after(&args, "-bufsize"), Some("4400000"));
    }

    #[test]
    fn args_order_inputs_then_output_last() {
        let args = args_for(&Transcoder::default(), None);
        let inputs: Vec<_> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| *a == "-i")
            .map(|(i, _)| args[i + 1].as_str())
            .collect();
        assert_eq!(inputs, vec!["in/clip.mp4", "watermarks/douyin.png"]);
        assert_eq!(args.last().map(String::as_str), Some("out/clip_抖音精选_带水印.mp4"));
        assert_eq!(args[args.len() - 2], "-y");
    }

    #[test]
    fn stderr_tail_keeps_last_lines() {
        let long: String = (0..50).map(|i| format!("line {i}\n")).collect();
        let tail = stderr_tail(&long);
        assert_eq!(tail.lines().count(), STDERR_TAIL_LINES);
        assert!(tail.ends_with("line 49"));
    }

    #[tokio::test]
    async fn missing_binary_is_an_io_error() {
        let transcoder =
            Transcoder::with_config(TranscodeConfig::default().with_ffmpeg_path("/nonexistent/ffmpeg"));
        let geometry = geometry();
        let output = PathBuf::from("out.mp4");
        let request = TranscodeRequest {
            input: Path::new("in.mp4"),
            watermark: Path::new("wm.png"),
            output: &output,
            geometry: &geometry,
            source_bit_rate: None,
        };
        assert!(matches!(transcoder.run(&request).await, Err(WatermarkError::Io(_))));
        assert!(!transcoder.check_available().await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_reported() {
        let transcoder = Transcoder::with_config(TranscodeConfig::default().with_ffmpeg_path("false"));
        let geometry = geometry();
        let request = TranscodeRequest {
            input: Path::new("in.mp4"),
            watermark: Path::new("wm.png"),
            output: Path::new("out.mp4"),
            geometry: &geometry,
            source_bit_rate: None,
        };
        assert!(matches!(
            transcoder.run(&request).await,
            Err(WatermarkError::Transcode { code: Some(1), .. })
        ));
    }
}
