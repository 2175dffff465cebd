use std::path::PathBuf;

use anyhow::{Context, Result};

use platmark::config::{self, WatermarkConfig};
use platmark::geometry::{self, Axis};
use platmark::{platform, Dimensions, Placement, PlatformConfig};

/// Inputs for a one-off geometry resolution
pub struct GeometryRequest {
    pub video: Dimensions,
    pub watermark: Dimensions,
    pub platform: Option<String>,
    pub config: PathBuf,
    pub at: Option<(f64, f64)>,
    pub margins: Option<(f64, f64)>,
    pub scale: Option<f64>,
    pub threshold: Option<f64>,
}

/// Parse `1920x1080`
pub fn parse_size(s: &str) -> Result<Dimensions, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let width = w.trim().parse().map_err(|_| format!("invalid width '{w}'"))?;
    let height = h.trim().parse().map_err(|_| format!("invalid height '{h}'"))?;
    Ok(Dimensions::new(width, height))
}

/// Parse `100,200`
pub fn parse_pair(s: &str) -> Result<(f64, f64), String> {
    let (a, b) = s
        .split_once(',')
        .ok_or_else(|| format!("expected two comma-separated numbers, got '{s}'"))?;
    let a = a.trim().parse().map_err(|_| format!("invalid number '{a}'"))?;
    let b = b.trim().parse().map_err(|_| format!("invalid number '{b}'"))?;
    Ok((a, b))
}

pub fn cmd_geometry(request: &GeometryRequest, json: bool) -> Result<()> {
    let config = if request.config.exists() {
        config::load(&request.config).0
    } else {
        WatermarkConfig::default()
    };

    let placement = match (request.at, request.margins, &request.platform) {
        (Some((x, y)), _, _) => Placement::Coordinates { x, y },
        (None, Some((right, bottom)), _) => Placement::Margins { right, bottom },
        (None, None, Some(key)) => {
            let platform = platform::find(key).ok_or_else(|| anyhow::anyhow!("Unknown platform: {key}"))?;
            config.platform(platform.key).placement()
        }
        (None, None, None) => PlatformConfig::default().placement(),
    };
    let scale = request.scale.unwrap_or_else(|| config.scale());
    let threshold = request
        .threshold
        .unwrap_or(config.global.bottom_region_threshold);

    let resolved = geometry::resolve(request.video, request.watermark, scale, placement, threshold)
        .context("Failed to resolve overlay geometry")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&resolved)?);
        return Ok(());
    }

    println!("🎬 Video:     {}", request.video);
    println!("🖼️  Watermark: {}", request.watermark);
    match placement {
        Placement::Coordinates { x, y } => println!("📍 Anchor:    ({x}, {y}) on 1920x1080"),
        Placement::Margins { right, bottom } => {
            println!("📍 Margins:   right {right}, bottom {bottom} on 1920x1080");
        }
    }
    println!("📐 Scale:     {scale} (threshold {threshold})");
    println!(
        "\n✅ Overlay {}x{} at ({}, {})",
        resolved.width, resolved.height, resolved.x, resolved.y
    );
    for adjustment in &resolved.adjustments {
        let axis = match adjustment.axis {
            Axis::X => "x",
            Axis::Y => "y",
        };
        println!("   clamped {axis}: {} -> {}", adjustment.from, adjustment.to);
    }
    if !resolved.fits_within(request.video) {
        println!("⚠️  Overlay is larger than the frame and will be cropped");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_size_accepts_both_separators() {
        assert_eq!(parse_size("1920x1080"), Ok(Dimensions::new(1920, 1080)));
        assert_eq!(parse_size("720X1280"), Ok(Dimensions::new(720, 1280)));
        assert!(parse_size("1920").is_err());
        assert!(parse_size("axb").is_err());
    }

    #[test]
    fn parse_pair_reads_floats() {
        assert_eq!(parse_pair("100, 200.5"), Ok((100.0, 200.5)));
        assert!(parse_pair("100").is_err());
    }
}
