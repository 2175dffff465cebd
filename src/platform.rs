//! Static registry of publishing platforms
//!
//! Each platform has a short key (used for the watermark asset name and the
//! config section) and a localized display name embedded in output filenames.
//! Registry order is the order shown by the interactive prompt, so the
//! numbers users type stay stable between releases.

use serde::Serialize;

use crate::error::{Result, WatermarkError};

/// A publishing platform that gets its own watermark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Platform {
    /// Asset stem and config key, e.g. `douyin`
    pub key: &'static str,
    /// Localized name used in output filenames
    pub display_name: &'static str,
}

impl Platform {
    const fn new(key: &'static str, display_name: &'static str) -> Self {
        Self { key, display_name }
    }

    /// File name of this platform's watermark image
    #[must_use]
    pub fn asset_file_name(&self) -> String {
        format!("{}.png", self.key)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.display_name, self.key)
    }
}

/// All known platforms, in prompt order
pub static PLATFORMS: &[Platform] = &[
    Platform::new("douyin", "抖音精选"),
    Platform::new("kuaishou", "快手精选"),
    Platform::new("baijiahao", "百家号精选"),
    Platform::new("weibo", "微博"),
    Platform::new("meitan", "美团精选"),
    Platform::new("duoduo", "多多精选"),
    Platform::new("zfb", "支付宝精选"),
    Platform::new("weishi", "腾讯微视精选"),
    Platform::new("toutiao", "头条精选"),
    Platform::new("ppx", "皮皮虾精选"),
    Platform::new("aiqiyi", "爱奇艺精选"),
    Platform::new("xiaohongshu", "小红书精选"),
    Platform::new("wechat", "视频号精选"),
    Platform::new("douyin2", "抖音瞎选"),
    Platform::new("dewu", "得物精选"),
];

/// Look up a platform by key
#[must_use]
pub fn find(key: &str) -> Option<&'static Platform> {
    PLATFORMS.iter().find(|p| p.key == key)
}

/// Resolve a comma-separated list of platform keys (`douyin,weibo`).
///
/// Duplicates are dropped, first occurrence wins.
pub fn parse_keys(input: &str) -> Result<Vec<&'static Platform>> {
    let mut selected: Vec<&'static Platform> = Vec::new();

    for key in input.split(',').map(str::trim).filter(|k| !k.is_empty()) {
        let platform = find(key).ok_or_else(|| WatermarkError::UnknownPlatform(key.to_string()))?;
        if !selected.contains(&platform) {
            selected.push(platform);
        }
    }

    if selected.is_empty() {
        return Err(WatermarkError::InvalidSelection(input.to_string()));
    }

    Ok(selected)
}

/// Result of parsing one line of prompt input
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Selection {
    /// Platforms picked, in the order typed
    pub platforms: Vec<&'static Platform>,
    /// Entries that were numbers outside the menu range
    pub out_of_range: Vec<String>,
}

/// Parse a numbered menu answer.
///
/// `0` selects every platform. Otherwise entries are 1-based menu numbers
/// separated by commas; empty entries are ignored and out-of-range numbers
/// are collected so the caller can report them. A non-numeric entry rejects
/// the whole line.
pub fn parse_selection(input: &str) -> Result<Selection> {
    let input = input.trim();
    if input == "0" {
        return Ok(Selection {
            platforms: PLATFORMS.iter().collect(),
            out_of_range: Vec::new(),
        });
    }

    let mut selection = Selection::default();
    for entry in input.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let number: usize = entry
            .parse()
            .map_err(|_| WatermarkError::InvalidSelection(entry.to_string()))?;

        match number.checked_sub(1).and_then(|i| PLATFORMS.get(i)) {
            Some(platform) if !selection.platforms.contains(&platform) => {
                selection.platforms.push(platform);
            }
            Some(_) => {}
            None => selection.out_of_range.push(entry.to_string()),
        }
    }

    Ok(selection)
}
