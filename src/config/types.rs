use crate::scanner::ScanOptions;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub timezone: TimezoneConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub scan: ScanConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TimezoneConfig {
    /// Offset corrected timestamps are written in (`+01:00`, `Z`, `-5`)
    #[serde(default)]
    pub target: Option<String>,

    /// Offset of naive local values such as mtime and IPTC pairs
    #[serde(default)]
    pub local: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub exiftool: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScanConfig {
    #[serde(default = "default_follow_links")]
    pub follow_links: bool,

    #[serde(default)]
    pub include_hidden: bool,

    /// Skip non-media files found while walking directories
    #[serde(default = "default_media_only")]
    pub media_only: bool,

    #[serde(default = "default_avchd_root")]
    pub avchd_root: String,
}

fn default_follow_links() -> bool {
    true
}

fn default_media_only() -> bool {
    true
}

fn default_avchd_root() -> String {
    "AVCHD/BDMV".to_string()
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            follow_links: default_follow_links(),
            include_hidden: false,
            media_only: default_media_only(),
            avchd_root: default_avchd_root(),
        }
    }
}

impl ScanConfig {
    pub fn options(&self) -> ScanOptions {
        ScanOptions {
            follow_links: self.follow_links,
            include_hidden: self.include_hidden,
            media_only: self.media_only,
            avchd_root: PathBuf::from(&self.avchd_root),
        }
    }
}
