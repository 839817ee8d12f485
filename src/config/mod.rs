mod types;

pub use types::*;

use anyhow::{Context, Result};
use chrono::FixedOffset;
use retimer_common::time::parse_offset;
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./retimer.toml",
        "~/.config/retimer/config.toml",
        "/etc/retimer/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

fn parse_optional_offset(name: &str, value: Option<&str>) -> Result<Option<FixedOffset>> {
    value
        .map(|text| parse_offset(text).with_context(|| format!("Invalid {name} offset: {text:?}")))
        .transpose()
}

impl TimezoneConfig {
    /// Configured write-back offset.
    pub fn target_offset(&self) -> Result<Option<FixedOffset>> {
        parse_optional_offset("target", self.target.as_deref())
    }

    /// Configured local offset.
    pub fn local_offset(&self) -> Result<Option<FixedOffset>> {
        parse_optional_offset("local", self.local.as_deref())
    }
}

/// Validate configuration
fn validate_config(config: &Config) -> Result<()> {
    config.timezone.target_offset()?;
    config.timezone.local_offset()?;

    if let Some(path) = &config.tools.exiftool {
        if !path.exists() {
            tracing::warn!("Configured exiftool does not exist: {:?}", path);
        }
    }

    if config.scan.avchd_root.trim().is_empty() {
        anyhow::bail!("scan.avchd_root cannot be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.timezone.target_offset().unwrap().is_none());
        assert!(config.scan.follow_links);
        assert!(config.scan.media_only);
        assert_eq!(config.scan.options().avchd_root, Path::new("AVCHD/BDMV"));
    }

    #[test]
    fn test_load_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("retimer.toml");
        fs::write(
            &path,
            r#"
[timezone]
target = "+01:00"
local = "-5"

[tools]
exiftool = "/usr/bin/exiftool"

[scan]
include_hidden = true
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(
            config.timezone.target_offset().unwrap().unwrap().local_minus_utc(),
            3600
        );
        assert_eq!(
            config.timezone.local_offset().unwrap().unwrap().local_minus_utc(),
            -5 * 3600
        );
        assert_eq!(config.tools.exiftool.as_deref(), Some(Path::new("/usr/bin/exiftool")));
        assert!(config.scan.include_hidden);
        assert!(config.scan.follow_links);
    }

    #[test]
    fn test_invalid_offset_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("retimer.toml");
        fs::write(&path, "[timezone]\ntarget = \"+25:00\"\n").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("target"));
    }

    #[test]
    fn test_empty_avchd_root_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("retimer.toml");
        fs::write(&path, "[scan]\navchd_root = \"\"\n").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_custom_path_must_exist() {
        assert!(load_config_or_default(Some(Path::new("/nonexistent/retimer.toml"))).is_err());
    }
}
