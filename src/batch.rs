//! Batch planning and execution
//!
//! A run is an explicit list of [`WatermarkJob`]s, one per video × platform
//! pair. Jobs are independent: each probes its own inputs, resolves its own
//! geometry and runs its own ffmpeg process. [`run_batch`] executes them on
//! a worker pool bounded by a semaphore and collects one [`JobReport`] per
//! job. A failing job never stops the others.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::config::WatermarkConfig;
use crate::error::{Result, WatermarkError};
use crate::geometry::{self, OverlayGeometry};
use crate::platform::Platform;
use crate::probe::Prober;
use crate::transcode::{TranscodeRequest, Transcoder};

/// Video file extensions picked up from the input directory
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "flv"];

/// Suffix appended to every output file stem ("watermarked")
pub const OUTPUT_SUFFIX: &str = "带水印";

/// Directory layout of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub input_dir: PathBuf,
    pub watermark_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Layout {
    /// The standard `input_video` / `watermarks` / `output_videos` layout
    /// under `base`
    #[must_use]
    pub fn under(base: &Path) -> Self {
        Self {
            input_dir: base.join("input_video"),
            watermark_dir: base.join("watermarks"),
            output_dir: base.join("output_videos"),
        }
    }

    /// Check the input directories exist and create the output directory.
    pub fn prepare(&self) -> Result<()> {
        for dir in [&self.input_dir, &self.watermark_dir] {
            if !dir.is_dir() {
                return Err(WatermarkError::MissingDirectory(dir.clone()));
            }
        }
        if !self.output_dir.is_dir() {
            std::fs::create_dir_all(&self.output_dir)?;
            info!(dir = %self.output_dir.display(), "created output directory");
        }
        Ok(())
    }

    /// Watermark image for `platform`
    #[must_use]
    pub fn watermark_for(&self, platform: &Platform) -> PathBuf {
        self.watermark_dir.join(platform.asset_file_name())
    }
}

/// Whether `path` has one of [`VIDEO_EXTENSIONS`], ignoring case
#[must_use]
pub fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| VIDEO_EXTENSIONS.iter().any(|v| ext.eq_ignore_ascii_case(v)))
}

/// List the videos in `dir`, sorted by file name.
pub fn discover_videos(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut videos: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_video(path))
        .collect();

    videos.sort();
    Ok(videos)
}

/// `<stem>_<platform name>_带水印.mp4`
#[must_use]
pub fn output_file_name(video: &Path, platform: &Platform) -> String {
    format!("{}_{}_{OUTPUT_SUFFIX}.mp4", output_stem(video, false), platform.display_name)
}

/// File stem used for outputs, optionally tagged with the source extension
/// (`clip_mov`) to keep same-stem inputs apart.
fn output_stem(video: &Path, with_extension: bool) -> String {
    let stem = video
        .file_stem()
        .map_or_else(|| "video".to_string(), |s| s.to_string_lossy().to_string());
    match video.extension() {
        Some(ext) if with_extension => format!("{stem}_{}", ext.to_string_lossy()),
        _ => stem,
    }
}

/// One video × platform unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatermarkJob {
    pub video: PathBuf,
    pub platform: &'static Platform,
    pub watermark: PathBuf,
    pub output: PathBuf,
}

/// Build the task list, videos outer and platforms inner.
///
/// Every job gets its own output path. Inputs that share a stem (`a.mov`,
/// `a.mp4`) get the source extension in their output name, and any name
/// still taken after that gets a numeric suffix.
#[must_use]
pub fn plan_jobs(
    videos: &[PathBuf],
    platforms: &[&'static Platform],
    layout: &Layout,
) -> Vec<WatermarkJob> {
    let mut stem_counts: HashMap<String, usize> = HashMap::new();
    for video in videos {
        *stem_counts.entry(output_stem(video, false)).or_default() += 1;
    }

    let mut taken: HashSet<PathBuf> = HashSet::new();
    let mut jobs = Vec::with_capacity(videos.len() * platforms.len());

    for video in videos {
        let shared_stem = stem_counts.get(&output_stem(video, false)).copied().unwrap_or(0) > 1;
        let stem = output_stem(video, shared_stem);

        for &platform in platforms {
            let base = format!("{stem}_{}_{OUTPUT_SUFFIX}", platform.display_name);
            let mut output = layout.output_dir.join(format!("{base}.mp4"));
            let mut n = 2;
            while taken.contains(&output) {
                output = layout.output_dir.join(format!("{base}_{n}.mp4"));
                n += 1;
            }
            if shared_stem {
                debug!(video = %video.display(), output = %output.display(), "stem shared with another input");
            }
            taken.insert(output.clone());

            jobs.push(WatermarkJob {
                video: video.clone(),
                platform,
                watermark: layout.watermark_for(platform),
                output,
            });
        }
    }

    jobs
}

/// How one job ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Succeeded {
        geometry: OverlayGeometry,
        input_bytes: Option<u64>,
        output_bytes: Option<u64>,
    },
    /// Not attempted; counted as a failure
    Skipped { reason: String },
    Failed { error: String },
}

impl JobOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    fn failed(error: &WatermarkError) -> Self {
        Self::Failed {
            error: error.to_string(),
        }
    }
}

/// Outcome of one job plus what it was
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job: WatermarkJob,
    pub outcome: JobOutcome,
    pub elapsed_secs: f64,
}

/// Totals for a whole run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    /// Failed jobs, including skipped ones
    pub failed: usize,
    pub skipped: usize,
    /// Set when canary mode stopped the run after the first job
    pub aborted: bool,
    pub reports: Vec<JobReport>,
}

impl BatchSummary {
    fn record(&mut self, report: JobReport) {
        match report.outcome {
            JobOutcome::Succeeded { .. } => self.succeeded += 1,
            JobOutcome::Skipped { .. } => {
                self.skipped += 1;
                self.failed += 1;
            }
            JobOutcome::Failed { .. } => self.failed += 1,
        }
        self.reports.push(report);
    }
}

/// Knobs for [`run_batch`]
#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    /// Maximum jobs running at once
    pub concurrency: usize,
    /// Run the first job alone and stop if it fails
    pub canary: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get),
            canary: false,
        }
    }
}

/// Read-only state shared by every job
#[derive(Debug, Clone)]
pub struct JobContext {
    pub config: WatermarkConfig,
    pub prober: Prober,
    pub transcoder: Transcoder,
    /// Fail jobs whose dimensions could not be probed instead of assuming
    /// defaults
    pub strict_probe: bool,
}

impl JobContext {
    #[must_use]
    pub fn new(config: WatermarkConfig, prober: Prober, transcoder: Transcoder) -> Self {
        Self {
            config,
            prober,
            transcoder,
            strict_probe: false,
        }
    }

    #[must_use]
    pub fn with_strict_probe(mut self, strict: bool) -> Self {
        self.strict_probe = strict;
        self
    }

    /// Run a single job to completion and classify the result.
    pub async fn run_job(&self, job: &WatermarkJob) -> JobOutcome {
        let platform = job.platform.key;
        let video = job.video.display();
        info!(%video, platform, output = %job.output.display(), "processing");

        if !tokio::fs::try_exists(&job.watermark).await.unwrap_or(false) {
            let error = WatermarkError::MissingWatermark(job.watermark.clone());
            warn!(%video, platform, %error, "skipping");
            return JobOutcome::Skipped {
                reason: error.to_string(),
            };
        }

        match self.watermark(job).await {
            Ok(outcome) => outcome,
            Err(error) => {
                error!(%video, platform, %error, "watermarking failed");
                JobOutcome::failed(&error)
            }
        }
    }

    async fn watermark(&self, job: &WatermarkJob) -> Result<JobOutcome> {
        let (video_info, watermark_size) = tokio::join!(
            self.prober.video(&job.video),
            self.prober.image(&job.watermark),
        );

        if self.strict_probe {
            if let Some(reason) = video_info.reason().or(watermark_size.reason()) {
                return Err(WatermarkError::Probe(reason.to_string()));
            }
        }

        let video_info = video_info.into_value();
        let watermark_size = watermark_size.into_value();
        debug!(
            video = %video_info.dimensions,
            codec = %video_info.codec,
            pix_fmt = %video_info.pix_fmt,
            bit_rate = ?video_info.bit_rate,
            watermark = %watermark_size,
            "probed"
        );

        let settings = self.config.platform(job.platform.key);
        let geometry = geometry::resolve(
            video_info.dimensions,
            watermark_size,
            self.config.scale(),
            settings.placement(),
            self.config.global.bottom_region_threshold,
        )?;

        for adjustment in &geometry.adjustments {
            warn!(
                platform = job.platform.key,
                axis = ?adjustment.axis,
                from = adjustment.from,
                to = adjustment.to,
                "overlay pulled back into frame"
            );
        }
        info!(
            platform = job.platform.key,
            x = geometry.x,
            y = geometry.y,
            width = geometry.width,
            height = geometry.height,
            "overlay resolved"
        );

        self.transcoder
            .run(&TranscodeRequest {
                input: &job.video,
                watermark: &job.watermark,
                output: &job.output,
                geometry: &geometry,
                source_bit_rate: video_info.bit_rate,
            })
            .await?;

        let input_bytes = file_size(&job.video).await;
        let output_bytes = file_size(&job.output).await;
        if let (Some(input), Some(output)) = (input_bytes, output_bytes) {
            info!(
                output = %job.output.display(),
                input_mb = %format!("{:.2}", input as f64 / 1_048_576.0),
                output_mb = %format!("{:.2}", output as f64 / 1_048_576.0),
                ratio = %format!("{:.2}%", output as f64 / input.max(1) as f64 * 100.0),
                "done"
            );
        } else {
            warn!(output = %job.output.display(), "ffmpeg succeeded but output size is unavailable");
        }

        Ok(JobOutcome::Succeeded {
            geometry,
            input_bytes,
            output_bytes,
        })
    }
}

async fn file_size(path: &Path) -> Option<u64> {
    tokio::fs::metadata(path).await.ok().map(|m| m.len())
}

async fn run_timed(context: &JobContext, job: WatermarkJob) -> JobReport {
    let start = Instant::now();
    let outcome = context.run_job(&job).await;
    JobReport {
        job,
        outcome,
        elapsed_secs: start.elapsed().as_secs_f64(),
    }
}

/// Run every job, at most `options.concurrency` at a time.
///
/// Reports come back in task-list order. A job task that panics is recorded
/// as a failure of that job.
pub async fn run_batch(
    context: Arc<JobContext>,
    jobs: Vec<WatermarkJob>,
    options: BatchOptions,
) -> BatchSummary {
    let mut summary = BatchSummary::default();
    let mut jobs = jobs.into_iter();

    if options.canary {
        let Some(first) = jobs.next() else {
            return summary;
        };
        info!(video = %first.video.display(), platform = first.platform.key, "running canary job");
        let report = run_timed(&context, first).await;
        let passed = report.outcome.is_success();
        summary.record(report);
        if !passed {
            error!("canary job failed, not starting the remaining jobs");
            summary.aborted = true;
            return summary;
        }
        info!("canary job succeeded, processing the rest");
    }

    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let handles: Vec<_> = jobs
        .map(|job| {
            let context = Arc::clone(&context);
            let semaphore = Arc::clone(&semaphore);
            let fallback = job.clone();
            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                run_timed(&context, job).await
            });
            (fallback, handle)
        })
        .collect();

    let results = futures::future::join_all(
        handles
            .into_iter()
            .map(|(job, handle)| async move { (job, handle.await) }),
    )
    .await;

    for (job, result) in results {
        let report = result.unwrap_or_else(|join_error| {
            error!(video = %job.video.display(), platform = job.platform.key, %join_error, "job task panicked");
            JobReport {
                job,
                outcome: JobOutcome::Failed {
                    error: format!("job task panicked: {join_error}"),
                },
                elapsed_secs: 0.0,
            }
        });
        summary.record(report);
    }

    summary
}
