//! Error types shared across the library

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors produced while planning or running watermark jobs
#[derive(Error, Debug)]
pub enum WatermarkError {
    #[error("ffprobe error: {0}")]
    Probe(String),

    #[error("ffmpeg exited with status {code:?}: {stderr}")]
    Transcode { code: Option<i32>, stderr: String },

    #[error("{tool} timed out after {}s", .after.as_secs())]
    Timeout { tool: &'static str, after: Duration },

    #[error("watermark image has zero height ({width}x{height})")]
    DegenerateWatermark { width: u32, height: u32 },

    #[error("watermark asset not found: {}", .0.display())]
    MissingWatermark(PathBuf),

    #[error("unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("invalid platform selection: {0}")]
    InvalidSelection(String),

    #[error("directory not found: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WatermarkError>;
