//! Media probing via the `ffprobe` CLI
//!
//! Every query asks for a single stream property and reads plain text back,
//! so nothing here depends on ffprobe's JSON layout. Probing never aborts a
//! job on its own: when the dimensions cannot be read the result is
//! [`Probed::Defaulted`] and the caller decides whether that is acceptable.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{Result, WatermarkError};
use crate::geometry::Dimensions;

/// Assumed video size when probing fails
pub const DEFAULT_VIDEO_DIMENSIONS: Dimensions = Dimensions::new(1920, 1080);

/// Assumed watermark size when probing fails
pub const DEFAULT_WATERMARK_DIMENSIONS: Dimensions = Dimensions::new(300, 100);

const DEFAULT_CODEC: &str = "h264";
const DEFAULT_PIX_FMT: &str = "yuv420p";
const DIMENSIONS_FORMAT: &str = "csv=p=0";
const VALUE_FORMAT: &str = "default=noprint_wrappers=1:nokey=1";

/// A probed value, or a stand-in used because probing failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Probed<T> {
    Measured(T),
    Defaulted { value: T, reason: String },
}

impl<T> Probed<T> {
    /// The value, whether measured or defaulted
    pub fn value(&self) -> &T {
        match self {
            Self::Measured(value) | Self::Defaulted { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Self::Measured(value) | Self::Defaulted { value, .. } => value,
        }
    }

    #[must_use]
    pub fn is_defaulted(&self) -> bool {
        matches!(self, Self::Defaulted { .. })
    }

    /// Why the default was used, if it was
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Measured(_) => None,
            Self::Defaulted { reason, .. } => Some(reason),
        }
    }
}

/// Properties of the first video stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoInfo {
    pub dimensions: Dimensions,
    /// Stream bit rate in bits per second, when the container reports one
    pub bit_rate: Option<u64>,
    pub codec: String,
    pub pix_fmt: String,
}

impl VideoInfo {
    fn fallback() -> Self {
        Self {
            dimensions: DEFAULT_VIDEO_DIMENSIONS,
            bit_rate: None,
            codec: DEFAULT_CODEC.to_string(),
            pix_fmt: DEFAULT_PIX_FMT.to_string(),
        }
    }
}

/// `ffprobe` wrapper
#[derive(Debug, Clone)]
pub struct Prober {
    ffprobe_path: String,
    timeout: Duration,
}

impl Default for Prober {
    fn default() -> Self {
        Self::new()
    }
}

impl Prober {
    /// Per-query time limit
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a prober, searching for `ffprobe` in PATH
    #[must_use]
    pub fn new() -> Self {
        let ffprobe_path = which::which("ffprobe")
            .map_or_else(|_| "ffprobe".to_string(), |p| p.to_string_lossy().to_string());

        Self {
            ffprobe_path,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Use a specific ffprobe binary
    #[must_use]
    pub fn with_ffprobe_path(mut self, path: &str) -> Self {
        self.ffprobe_path = path.to_string();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn ffprobe_path(&self) -> &str {
        &self.ffprobe_path
    }

    /// Check if ffprobe is available
    pub async fn check_available(&self) -> bool {
        Command::new(&self.ffprobe_path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Run one `-show_entries` query against the first video stream and
    /// return its trimmed stdout.
    async fn query(&self, path: &Path, entries: &str, format: &str) -> Result<String> {
        let mut command = Command::new(&self.ffprobe_path);
        command
            .args(["-v", "error", "-select_streams", "v:0", "-show_entries"])
            .arg(entries)
            .args(["-of", format])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| WatermarkError::Timeout {
                tool: "ffprobe",
                after: self.timeout,
            })?
            .map_err(|e| WatermarkError::Probe(format!("failed to run {}: {e}", self.ffprobe_path)))?;

        if !output.status.success() {
            return Err(WatermarkError::Probe(format!(
                "{entries} query exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if stdout.is_empty() {
            return Err(WatermarkError::Probe(format!("{entries} query returned nothing")));
        }

        debug!(path = %path.display(), entries, value = %stdout, "ffprobe");
        Ok(stdout)
    }

    async fn dimensions(&self, path: &Path) -> Result<Dimensions> {
        let raw = self.query(path, "stream=width,height", DIMENSIONS_FORMAT).await?;
        parse_dimensions(&raw)
    }

    /// Probe a video's size, bit rate, codec and pixel format.
    ///
    /// Bit rate, codec and pixel format are best effort and fall back
    /// individually; only a dimensions failure marks the result defaulted.
    pub async fn video(&self, path: &Path) -> Probed<VideoInfo> {
        let (dimensions, bit_rate, codec, pix_fmt) = tokio::join!(
            self.dimensions(path),
            self.query(path, "stream=bit_rate", VALUE_FORMAT),
            self.query(path, "stream=codec_name", VALUE_FORMAT),
            self.query(path, "stream=pix_fmt", VALUE_FORMAT),
        );

        let dimensions = match dimensions {
            Ok(dimensions) => dimensions,
            Err(error) => {
                let reason = error.to_string();
                warn!(path = %path.display(), %reason, "video probe failed, assuming {DEFAULT_VIDEO_DIMENSIONS}");
                return Probed::Defaulted {
                    value: VideoInfo::fallback(),
                    reason,
                };
            }
        };

        Probed::Measured(VideoInfo {
            dimensions,
            bit_rate: bit_rate.ok().as_deref().and_then(parse_bit_rate),
            codec: codec.unwrap_or_else(|_| DEFAULT_CODEC.to_string()),
            pix_fmt: pix_fmt.unwrap_or_else(|_| DEFAULT_PIX_FMT.to_string()),
        })
    }

    /// Probe an image's size
    pub async fn image(&self, path: &Path) -> Probed<Dimensions> {
        match self.dimensions(path).await {
            Ok(dimensions) => Probed::Measured(dimensions),
            Err(error) => {
                let reason = error.to_string();
                warn!(path = %path.display(), %reason, "image probe failed, assuming {DEFAULT_WATERMARK_DIMENSIONS}");
                Probed::Defaulted {
                    value: DEFAULT_WATERMARK_DIMENSIONS,
                    reason,
                }
            }
        }
    }
}

/// Parse `width,height` as printed with `-of csv=p=0`.
///
/// Only the first line is read; some builds append a trailing separator.
fn parse_dimensions(raw: &str) -> Result<Dimensions> {
    let line = raw.lines().next().unwrap_or_default();
    let mut parts = line.split(',').map(str::trim);

    let mut next = |name: &str| -> Result<u32> {
        let part = parts.next().unwrap_or_default();
        part.parse()
            .map_err(|_| WatermarkError::Probe(format!("unparseable {name} '{part}' in '{line}'")))
    };

    let width = next("width")?;
    let height = next("height")?;
    Ok(Dimensions::new(width, height))
}

/// Parse a bit rate value; ffprobe prints `N/A` when the stream has none.
fn parse_bit_rate(raw: &str) -> Option<u64> {
    raw.lines().next()?.trim().parse().ok().filter(|&b| b > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_dimensions_csv() {
        assert_eq!(parse_dimensions("1920,1080").unwrap(), Dimensions::new(1920, 1080));
        assert_eq!(parse_dimensions("300,100,\n").unwrap(), Dimensions::new(300, 100));
        assert_eq!(parse_dimensions("720,1280\n720,1280").unwrap(), Dimensions::new(720, 1280));
    }

    #[test]
    fn parse_dimensions_rejects_garbage() {
        assert!(parse_dimensions("1920").is_err());
        assert!(parse_dimensions("N/A,N/A").is_err());
        assert!(parse_dimensions("").is_err());
    }

    #[test]
    fn parse_bit_rate_handles_na() {
        assert_eq!(parse_bit_rate("5000000"), Some(5_000_000));
        assert_eq!(parse_bit_rate("N/A"), None);
        assert_eq!(parse_bit_rate("0"), None);
    }

    #[test]
    fn probed_accessors() {
        let measured = Probed::Measured(3);
        assert_eq!(*measured.value(), 3);
        assert!(!measured.is_defaulted());
        assert_eq!(measured.reason(), None);

        let defaulted = Probed::Defaulted {
            value: 7,
            reason: "no ffprobe".to_string(),
        };
        assert!(defaulted.is_defaulted());
        assert_eq!(defaulted.reason(), Some("no ffprobe"));
        assert_eq!(defaulted.into_value(), 7);
    }

    #[tokio::test]
    async fn missing_binary_defaults_video() {
        let prober = Prober::new().with_ffprobe_path("/nonexistent/ffprobe");
        let probed = prober.video(Path::new("clip.mp4")).await;
        assert!(probed.is_defaulted());
        assert_eq!(probed.value().dimensions, DEFAULT_VIDEO_DIMENSIONS);
        assert_eq!(probed.value().bit_rate, None);
        assert_eq!(probed.value().codec, "h264");
    }

    #[tokio::test]
    async fn missing_binary_defaults_image() {
        let prober = Prober::new().with_ffprobe_path("/nonexistent/ffprobe");
        let probed = prober.image(Path::new("douyin.png")).await;
        assert!(probed.is_defaulted());
        assert!(probed.reason().unwrap().contains("/nonexistent/ffprobe"));
        assert_eq!(probed.into_value(), DEFAULT_WATERMARK_DIMENSIONS);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_binary_defaults_image() {
        let prober = Prober::new().with_ffprobe_path("false");
        let probed = prober.image(Path::new("douyin.png")).await;
        assert!(probed.reason().unwrap().contains("exited"));
    }
}
