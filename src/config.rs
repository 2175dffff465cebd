//! Watermark configuration loaded from `watermark_config.json`.
//!
//! The current schema nests settings under `global` and a per-platform
//! `platforms` map:
//!
//! ```json
//! {
//!   "global": {
//!     "position_mode": "coordinates",
//!     "size": { "scale": 0.1 },
//!     "bottom_region_threshold": 0.6
//!   },
//!   "platforms": {
//!     "douyin": {
//!       "position_mode": "margins",
//!       "coordinates": { "x": 100, "y": 200 },
//!       "margins": { "right_margin": 50, "bottom_margin": 50 }
//!     }
//!   }
//! }
//! ```
//!
//! Older files used a flat layout (top-level `position_mode`, `size`,
//! `coordinates`, `margins`). Those are migrated on load, with the same
//! placement copied to every registered platform, and written back.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::Result;
use crate::geometry::{Placement, DEFAULT_BOTTOM_THRESHOLD};
use crate::platform::PLATFORMS;

/// Default config file name, resolved against the working directory
pub const CONFIG_FILE: &str = "watermark_config.json";

const DEFAULT_SCALE: f64 = 0.10;

/// Which block of a platform config drives placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionMode {
    #[default]
    Coordinates,
    Margins,
}

/// Anchor point on the 1920×1080 reference frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
}

impl Default for Coordinates {
    fn default() -> Self {
        Self { x: 100.0, y: 200.0 }
    }
}

/// Distances from the right and bottom edges of the reference frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub right_margin: f64,
    pub bottom_margin: f64,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            right_margin: 50.0,
            bottom_margin: 50.0,
        }
    }
}

/// Placement settings for one platform
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default)]
    pub position_mode: PositionMode,
    #[serde(default)]
    pub coordinates: Coordinates,
    #[serde(default)]
    pub margins: Margins,
}

impl PlatformConfig {
    /// The placement selected by `position_mode`
    #[must_use]
    pub fn placement(&self) -> Placement {
        match self.position_mode {
            PositionMode::Coordinates => Placement::Coordinates {
                x: self.coordinates.x,
                y: self.coordinates.y,
            },
            PositionMode::Margins => Placement::Margins {
                right: self.margins.right_margin,
                bottom: self.margins.bottom_margin,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeConfig {
    /// Overlay height as a fraction of the video height
    pub scale: f64,
}

impl Default for SizeConfig {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
        }
    }
}

/// Settings shared by every platform
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Kept for schema compatibility; placement is chosen per platform
    #[serde(default)]
    pub position_mode: PositionMode,
    #[serde(default)]
    pub size: SizeConfig,
    /// Fraction of the reference height past which coordinate anchors are
    /// measured from the bottom edge
    #[serde(default = "default_bottom_threshold")]
    pub bottom_region_threshold: f64,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            position_mode: PositionMode::default(),
            size: SizeConfig::default(),
            bottom_region_threshold: DEFAULT_BOTTOM_THRESHOLD,
        }
    }
}

fn default_bottom_threshold() -> f64 {
    DEFAULT_BOTTOM_THRESHOLD
}

/// Top-level configuration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatermarkConfig {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub platforms: BTreeMap<String, PlatformConfig>,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self::uniform(GlobalConfig::default(), PlatformConfig::default())
    }
}

impl WatermarkConfig {
    /// Config with the same placement for every registered platform
    fn uniform(global: GlobalConfig, platform: PlatformConfig) -> Self {
        let platforms = PLATFORMS
            .iter()
            .map(|p| (p.key.to_string(), platform))
            .collect();
        Self { global, platforms }
    }

    /// Overlay scale factor
    #[must_use]
    pub fn scale(&self) -> f64 {
        self.global.size.scale
    }

    /// Placement for `key`, falling back to the default platform config
    #[must_use]
    pub fn platform(&self, key: &str) -> PlatformConfig {
        self.platforms.get(key).copied().unwrap_or_default()
    }

    /// Log settings that are accepted but outside their expected range
    pub fn warn_on_suspicious_values(&self) {
        let scale = self.scale();
        if !(scale > 0.0 && scale <= 1.0) {
            warn!(scale, "scale outside (0, 1]; overlays may be empty or larger than the frame");
        }
        let threshold = self.global.bottom_region_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            warn!(threshold, "bottom_region_threshold outside [0, 1]");
        }
    }

    /// Write the config as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Flat schema written by older releases
#[derive(Debug, Deserialize)]
struct LegacyConfig {
    #[serde(default)]
    position_mode: PositionMode,
    #[serde(default)]
    size: SizeConfig,
    #[serde(default)]
    coordinates: Coordinates,
    #[serde(default)]
    margins: Margins,
}

impl LegacyConfig {
    fn is_legacy(value: &Value) -> bool {
        value.get("position_mode").is_some() && value.get("platforms").is_none()
    }

    fn into_current(self) -> WatermarkConfig {
        let global = GlobalConfig {
            position_mode: self.position_mode,
            size: self.size,
            bottom_region_threshold: DEFAULT_BOTTOM_THRESHOLD,
        };
        let platform = PlatformConfig {
            position_mode: self.position_mode,
            coordinates: self.coordinates,
            margins: self.margins,
        };
        WatermarkConfig::uniform(global, platform)
    }
}

/// Where the active configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Parsed from the file as is
    File(PathBuf),
    /// Converted from the flat legacy schema
    Migrated { path: PathBuf, saved: bool },
    /// Built-in defaults; the file was missing or unreadable
    Defaults { reason: String },
}

/// Parse a config document, migrating the legacy schema if needed.
///
/// Returns the config and whether a migration happened.
pub fn parse(json: &str) -> Result<(WatermarkConfig, bool)> {
    let value: Value = serde_json::from_str(json)?;

    if LegacyConfig::is_legacy(&value) {
        let legacy: LegacyConfig = serde_json::from_value(value)?;
        return Ok((legacy.into_current(), true));
    }

    Ok((serde_json::from_value(value)?, false))
}

/// Load the config at `path`.
///
/// Never fails: a missing or malformed file yields the defaults and the
/// reason is reported through [`ConfigSource::Defaults`]. A migrated legacy
/// file is written back in the nested schema.
pub fn load(path: &Path) -> (WatermarkConfig, ConfigSource) {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) => {
            let reason = format!("cannot read {}: {error}", path.display());
            warn!(%reason, "using default watermark config");
            return (WatermarkConfig::default(), ConfigSource::Defaults { reason });
        }
    };

    match parse(&content) {
        Ok((config, false)) => (config, ConfigSource::File(path.to_path_buf())),
        Ok((config, true)) => {
            info!(path = %path.display(), "migrating legacy config to nested schema");
            let saved = match config.save(path) {
                Ok(()) => true,
                Err(error) => {
                    warn!(%error, path = %path.display(), "failed to write migrated config");
                    false
                }
            };
            let source = ConfigSource::Migrated {
                path: path.to_path_buf(),
                saved,
            };
            (config, source)
        }
        Err(error) => {
            let reason = format!("invalid config {}: {error}", path.display());
            warn!(%reason, "using default watermark config");
            (WatermarkConfig::default(), ConfigSource::Defaults { reason })
        }
    }
}
