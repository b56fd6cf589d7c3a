use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::evaluate::{check_threshold, DEFAULT_Z_THRESHOLD};

/// Screening settings. Every key is optional in the JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    /// Absolute z-score above which a percentage is reported.
    pub z_threshold: f64,

    /// Reject malformed reference rows one by one instead of failing the load.
    pub skip_malformed: bool,

    /// Flagged records listed in a report.
    pub report_limit: usize,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            z_threshold: DEFAULT_Z_THRESHOLD,
            skip_malformed: false,
            report_limit: 25,
        }
    }
}

impl ScreenConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: ScreenConfig = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_threshold(self.z_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DetectorError;

    #[test]
    fn defaults_use_two_sigma() {
        let config = ScreenConfig::default();
        assert_eq!(config.z_threshold, 2.0);
        assert!(!config.skip_malformed);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: ScreenConfig = serde_json::from_str(r#"{"skip_malformed": true}"#).unwrap();
        assert!(config.skip_malformed);
        assert_eq!(config.z_threshold, 2.0);
        assert_eq!(config.report_limit, 25);
    }

    #[test]
    fn non_positive_threshold_is_rejected() {
        let config = ScreenConfig {
            z_threshold: 0.0,
            ..ScreenConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DetectorError::InvalidConfig { .. })
        ));
    }
}
