//! `platmark` - batch platform watermarking for videos
//!
//! Stamps each input video with a per-platform watermark image. The crate
//! works out where the overlay goes and how large it is; `ffprobe` measures
//! the media and `ffmpeg` does the actual compositing and encoding.
//!
//! # Modules
//!
//! - [`geometry`]: reference-canvas anchors and margins to clamped overlay
//!   rectangles
//! - [`platform`]: the static platform registry and selection parsing
//! - [`config`]: the JSON placement config, including legacy migration
//! - [`probe`]: `ffprobe` queries with explicit fallbacks
//! - [`transcode`]: `ffmpeg` command assembly and execution
//! - [`batch`]: job planning and the bounded worker pool
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use platmark::batch::{self, BatchOptions, JobContext, Layout};
//! use platmark::{config, platform, Prober, Transcoder};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let layout = Layout::under(Path::new("."));
//!     layout.prepare()?;
//!     let (config, _) = config::load(Path::new(config::CONFIG_FILE));
//!
//!     let videos = batch::discover_videos(&layout.input_dir)?;
//!     let jobs = batch::plan_jobs(&videos, &platform::parse_keys("douyin,weibo")?, &layout);
//!
//!     let context = Arc::new(JobContext::new(config, Prober::new(), Transcoder::default()));
//!     let summary = batch::run_batch(context, jobs, BatchOptions::default()).await;
//!     println!("{} ok, {} failed", summary.succeeded, summary.failed);
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod geometry;
pub mod platform;
pub mod probe;
pub mod transcode;

pub use batch::{BatchOptions, BatchSummary, JobContext, JobOutcome, JobReport, Layout, WatermarkJob};
pub use config::{ConfigSource, PlatformConfig, PositionMode, WatermarkConfig};
pub use error::{Result, WatermarkError};
pub use geometry::{Dimensions, OverlayGeometry, Placement};
pub use platform::{Platform, PLATFORMS};
pub use probe::{Probed, Prober, VideoInfo};
pub use transcode::{RateControl, TranscodeConfig, TranscodeRequest, Transcoder};

/// Version of platmark
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
