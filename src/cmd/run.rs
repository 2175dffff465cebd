use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use platmark::batch::{self, BatchOptions, JobContext, JobOutcome, Layout};
use platmark::config::{self, ConfigSource, CONFIG_FILE};
use platmark::platform::{self, PLATFORMS};
use platmark::{Prober, TranscodeConfig, Transcoder};

use super::select::prompt_platforms;

/// Options of the `run` subcommand
pub struct RunOptions {
    pub base_dir: PathBuf,
    pub config: Option<PathBuf>,
    pub platforms: Option<String>,
    pub all: bool,
    pub jobs: Option<usize>,
    pub timeout: u64,
    pub probe_timeout: u64,
    pub ffmpeg: Option<String>,
    pub ffprobe: Option<String>,
    pub threshold: Option<f64>,
    pub constant_quality: bool,
    pub strict_probe: bool,
    pub canary: bool,
    pub json: bool,
}

pub async fn cmd_run(options: RunOptions) -> Result<ExitCode> {
    let layout = Layout::under(&options.base_dir);
    layout
        .prepare()
        .with_context(|| format!("Invalid working directory: {}", options.base_dir.display()))?;

    let config_path = options
        .config
        .clone()
        .unwrap_or_else(|| options.base_dir.join(CONFIG_FILE));
    let (mut config, source) = config::load(&config_path);
    match &source {
        ConfigSource::File(path) => eprintln!("⚙️  Config: {}", path.display()),
        ConfigSource::Migrated { path, saved: true } => {
            eprintln!("⚙️  Config: {} (migrated to the nested format)", path.display());
        }
        ConfigSource::Migrated { path, saved: false } => {
            eprintln!("⚙️  Config: {} (migrated in memory, write-back failed)", path.display());
        }
        ConfigSource::Defaults { reason } => eprintln!("⚙️  Config: built-in defaults ({reason})"),
    }
    if let Some(threshold) = options.threshold {
        config.global.bottom_region_threshold = threshold;
    }
    config.warn_on_suspicious_values();

    let videos = batch::discover_videos(&layout.input_dir)
        .with_context(|| format!("Failed to list {}", layout.input_dir.display()))?;
    if videos.is_empty() {
        eprintln!("📭 No videos in {}", layout.input_dir.display());
        return Ok(ExitCode::SUCCESS);
    }
    eprintln!("🎬 {} video(s) in {}", videos.len(), layout.input_dir.display());

    let mut transcode = TranscodeConfig::default().with_timeout(Duration::from_secs(options.timeout));
    if let Some(path) = &options.ffmpeg {
        transcode = transcode.with_ffmpeg_path(path);
    }
    if options.constant_quality {
        transcode = transcode.constant_quality();
    }
    let transcoder = Transcoder::with_config(transcode);

    let mut prober = Prober::new().with_timeout(Duration::from_secs(options.probe_timeout));
    if let Some(path) = &options.ffprobe {
        prober = prober.with_ffprobe_path(path);
    }

    if !transcoder.check_available().await {
        anyhow::bail!(
            "ffmpeg not found at '{}'. Install ffmpeg or pass --ffmpeg",
            transcoder.config().ffmpeg_path
        );
    }
    if !prober.check_available().await {
        if options.strict_probe {
            anyhow::bail!("ffprobe not found at '{}' and --strict-probe is set", prober.ffprobe_path());
        }
        eprintln!("⚠️  ffprobe not found, default dimensions will be assumed");
    }

    // Tool checks come before the interactive prompt
    let platforms = if options.all {
        PLATFORMS.iter().collect()
    } else if let Some(keys) = &options.platforms {
        platform::parse_keys(keys)?
    } else {
        prompt_platforms()?
    };

    let jobs = batch::plan_jobs(&videos, &platforms, &layout);
    let batch_options = BatchOptions {
        concurrency: options.jobs.unwrap_or(BatchOptions::default().concurrency),
        canary: options.canary,
    };
    eprintln!(
        "🚀 {} job(s): {} video(s) × {} platform(s), {} at a time",
        jobs.len(),
        videos.len(),
        platforms.len(),
        batch_options.concurrency.max(1)
    );

    let context = Arc::new(JobContext::new(config, prober, transcoder).with_strict_probe(options.strict_probe));
    let start = Instant::now();
    let summary = batch::run_batch(context, jobs, batch_options).await;
    let elapsed = start.elapsed();

    if options.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        for report in &summary.reports {
            let label = format!(
                "{} → {}",
                report.job.video.file_name().unwrap_or_default().to_string_lossy(),
                report.job.platform.display_name
            );
            match &report.outcome {
                JobOutcome::Succeeded { .. } => {
                    eprintln!("   ✅ {label} ({:.1}s)", report.elapsed_secs);
                }
                JobOutcome::Skipped { reason } => eprintln!("   ⏭️  {label}: {reason}"),
                JobOutcome::Failed { error } => eprintln!("   ❌ {label}: {error}"),
            }
        }
    }

    if summary.aborted {
        eprintln!("🛑 Canary job failed, remaining jobs were not started");
    }
    eprintln!(
        "\n📊 {} succeeded, {} failed ({} skipped) in {:.1}s",
        summary.succeeded,
        summary.failed,
        summary.skipped,
        elapsed.as_secs_f64()
    );
    eprintln!("📁 Output: {}", layout.output_dir.display());

    Ok(if summary.failed == 0 && !summary.aborted {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
