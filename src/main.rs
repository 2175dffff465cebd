//! `platmark` CLI - watermark a folder of videos for each upload platform

mod cmd;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use platmark::Dimensions;

#[derive(Parser)]
#[command(name = "platmark")]
#[command(about = "Batch-apply platform watermarks to videos with ffmpeg")]
#[command(version = platmark::VERSION)]
struct Cli {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watermark every input video for the selected platforms
    Run {
        /// Directory holding input_video/, watermarks/ and output_videos/
        #[arg(short, long, default_value = ".")]
        base_dir: PathBuf,

        /// Config file (default: <base-dir>/watermark_config.json)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Platform keys, comma-separated (e.g. douyin,weibo)
        #[arg(short, long, conflicts_with = "all")]
        platforms: Option<String>,

        /// Process every registered platform
        #[arg(short, long)]
        all: bool,

        /// Maximum concurrent ffmpeg jobs (default: available CPUs)
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Per-job ffmpeg timeout in seconds
        #[arg(long, default_value = "3600")]
        timeout: u64,

        /// Per-query ffprobe timeout in seconds
        #[arg(long, default_value = "10")]
        probe_timeout: u64,

        /// Path to the ffmpeg binary
        #[arg(long)]
        ffmpeg: Option<String>,

        /// Path to the ffprobe binary
        #[arg(long)]
        ffprobe: Option<String>,

        /// Bottom-region threshold, overriding the config file
        #[arg(long)]
        threshold: Option<f64>,

        /// Always encode with constant quality instead of matching the source bit rate
        #[arg(long)]
        constant_quality: bool,

        /// Fail jobs whose dimensions cannot be probed instead of assuming defaults
        #[arg(long)]
        strict_probe: bool,

        /// Run the first job alone and stop if it fails
        #[arg(long)]
        canary: bool,

        /// Print the run summary as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// List the registered platforms
    Platforms,

    /// Resolve the overlay rectangle for one video size
    Geometry {
        /// Video size, WIDTHxHEIGHT
        #[arg(value_parser = cmd::geometry::parse_size)]
        video: Dimensions,

        /// Watermark image size, WIDTHxHEIGHT
        #[arg(short, long, default_value = "300x100", value_parser = cmd::geometry::parse_size)]
        watermark: Dimensions,

        /// Use this platform's placement from the config file
        #[arg(short, long)]
        platform: Option<String>,

        /// Config file to read placements from
        #[arg(short, long, default_value = platmark::config::CONFIG_FILE)]
        config: PathBuf,

        /// Reference-canvas anchor, X,Y (overrides the config)
        #[arg(long, value_parser = cmd::geometry::parse_pair, conflicts_with = "margins")]
        at: Option<(f64, f64)>,

        /// Reference-canvas margins, RIGHT,BOTTOM (overrides the config)
        #[arg(long, value_parser = cmd::geometry::parse_pair)]
        margins: Option<(f64, f64)>,

        /// Overlay height as a fraction of the video height
        #[arg(long)]
        scale: Option<f64>,

        /// Bottom-region threshold
        #[arg(long)]
        threshold: Option<f64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a default config file
    InitConfig {
        /// Destination
        #[arg(default_value = platmark::config::CONFIG_FILE)]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Logs go to stderr so --json output stays clean
    let default_level = if cli.verbose { "debug" } else { "info" };
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match cli.command {
        Commands::Run {
            base_dir,
            config,
            platforms,
            all,
            jobs,
            timeout,
            probe_timeout,
            ffmpeg,
            ffprobe,
            threshold,
            constant_quality,
            strict_probe,
            canary,
            json,
        } => {
            let options = cmd::run::RunOptions {
                base_dir,
                config,
                platforms,
                all,
                jobs,
                timeout,
                probe_timeout,
                ffmpeg,
                ffprobe,
                threshold,
                constant_quality,
                strict_probe,
                canary,
                json,
            };
            return cmd::run::cmd_run(options).await;
        }
        Commands::Platforms => {
            cmd::platforms::cmd_platforms();
        }
        Commands::Geometry {
            video,
            watermark,
            platform,
            config,
            at,
            margins,
            scale,
            threshold,
            json,
        } => {
            let request = cmd::geometry::GeometryRequest {
                video,
                watermark,
                platform,
                config,
                at,
                margins,
                scale,
                threshold,
            };
            cmd::geometry::cmd_geometry(&request, json)?;
        }
        Commands::InitConfig { path, force } => {
            cmd::init::cmd_init_config(&path, force)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
