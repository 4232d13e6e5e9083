use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::analytics::ReportOptions;

pub const DATA_DIR: &str = ".citypulse";
pub const DB_FILE: &str = "issues.db";
pub const CONFIG_FILE: &str = "config.json";

/// Settings read from `.citypulse/config.json`. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub geocoder_url: String,
    pub user_agent: String,
    pub geocoder_timeout_secs: u64,
    pub category_top_n: usize,
    pub ward_top_n: usize,
    pub dashboard_window_days: u32,
    pub analytics_window_days: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            geocoder_url: "https://nominatim.openstreetmap.org/reverse".to_string(),
            user_agent: concat!("citypulse/", env!("CARGO_PKG_VERSION")).to_string(),
            geocoder_timeout_secs: 10,
            category_top_n: 8,
            ward_top_n: 10,
            dashboard_window_days: 30,
            analytics_window_days: 90,
        }
    }
}

impl Config {
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Config::default());
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config in {}", path.display()))?;
        Ok(config)
    }

    pub fn dashboard_options(&self) -> ReportOptions {
        ReportOptions {
            category_top_n: self.category_top_n,
            ward_top_n: self.ward_top_n,
            window_days: self.dashboard_window_days,
        }
    }

    pub fn analytics_options(&self) -> ReportOptions {
        ReportOptions {
            window_days: self.analytics_window_days,
            ..self.dashboard_options()
        }
    }
}

/// Walks up from the current directory to the nearest `.citypulse` directory.
pub fn find_data_dir() -> Result<PathBuf> {
    let mut current = env::current_dir()?;

    loop {
        let candidate = current.join(DATA_DIR);
        if candidate.is_dir() {
            return Ok(candidate);
        }

        if !current.pop() {
            bail!("Not a citypulse directory (or any parent). Run 'citypulse init' first.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.category_top_n, 8);
        assert_eq!(config.ward_top_n, 10);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), r#"{"ward_top_n": 5}"#).unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.ward_top_n, 5);
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "{not json").unwrap();
        let err = Config::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid config"));
    }

    #[test]
    fn test_report_options() {
        let config = Config::default();
        assert_eq!(config.dashboard_options().window_days, 30);
        assert_eq!(config.analytics_options().window_days, 90);
        assert_eq!(config.analytics_options().ward_top_n, 10);
    }
}
