use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{AnalyticsError, Result};

/// Settings read from an optional TOML file; every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Number of issues in the top-N ranking.
    pub top_n: usize,
    /// Mock user count at which seeding becomes a no-op.
    pub seed_threshold: usize,
    pub mock_email_prefix: String,
    /// Minimum count before the leading issue raises an awareness alert.
    pub alert_threshold: u64,
    pub store_path: PathBuf,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            top_n: 5,
            seed_threshold: 300,
            mock_email_prefix: "mockuser".to_string(),
            alert_threshold: 3,
            store_path: PathBuf::from("analytics-store.json"),
        }
    }
}

impl AnalyticsConfig {
    pub fn from_toml_str(raw: &str, origin: &Path) -> Result<Self> {
        toml::from_str(raw).map_err(|err| AnalyticsError::Config {
            path: origin.to_path_buf(),
            message: err.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| AnalyticsError::io(path, err))?;
        Self::from_toml_str(&raw, path)
    }

    /// Loads `path` when given, otherwise falls back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let config =
            AnalyticsConfig::from_toml_str("top_n = 3\nalert_threshold = 10\n", Path::new("a.toml"))
                .unwrap();
        assert_eq!(config.top_n, 3);
        assert_eq!(config.alert_threshold, 10);
        assert_eq!(config.seed_threshold, 300);
        assert_eq!(config.mock_email_prefix, "mockuser");
    }

    #[test]
    fn invalid_toml_reports_origin() {
        let err = AnalyticsConfig::from_toml_str("top_n = \"five\"", Path::new("bad.toml"))
            .unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn missing_path_uses_defaults() {
        assert_eq!(
            AnalyticsConfig::load_or_default(None).unwrap(),
            AnalyticsConfig::default()
        );
    }
}
