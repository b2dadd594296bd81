//! Configuration management for the throttle.
//!
//! A [`LimiterConfig`] is the static limit table plus the tunables of the
//! waiting loop. Table keys are either a bare namespace (`"service_vod"`) or
//! a composite `"<namespace>.<action>"` key; values are calls per second.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{Result, ThrottleError};

/// Limit applied to any key the table does not mention.
pub const DEFAULT_LIMIT: u32 = 20;

/// Limits compiled into the crate, used by [`LimiterConfig::default`].
pub const BUILTIN_LIMITS: &[(&str, u32)] = &[
    ("service_tencentcloud_vod", 10),
    ("service_tencentcloud_sts.GetFederationToken", 10),
    ("service_tencentcloud_dnspod.CreateRecord", 10),
];

/// Main configuration for a limiter registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Calls per second for keys with no table entry
    #[serde(default = "default_limit")]
    pub default_limit: u32,

    /// Namespace or composite-key overrides
    #[serde(default)]
    pub limits: HashMap<String, u32>,

    /// How long a caller may wait before every retry is logged as a warning
    #[serde(default = "default_wait_warning_threshold")]
    pub wait_warning_threshold_secs: u64,

    /// Jitter added to retry sleeps
    #[serde(default)]
    pub backoff: BackoffConfig,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            limits: BUILTIN_LIMITS
                .iter()
                .map(|(key, limit)| (key.to_string(), *limit))
                .collect(),
            wait_warning_threshold_secs: default_wait_warning_threshold(),
            backoff: BackoffConfig::default(),
        }
    }
}

/// Jitter range for the retry sleep, in microseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    #[serde(default = "default_backoff_min")]
    pub min_micros: u64,

    #[serde(default = "default_backoff_max")]
    pub max_micros: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_micros: default_backoff_min(),
            max_micros: default_backoff_max(),
        }
    }
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

fn default_wait_warning_threshold() -> u64 {
    300
}

fn default_backoff_min() -> u64 {
    10
}

fn default_backoff_max() -> u64 {
    1000
}

impl LimiterConfig {
    /// A configuration with no table entries, only the global default.
    pub fn empty() -> Self {
        Self {
            limits: HashMap::new(),
            ..Self::default()
        }
    }

    /// Add or replace a table entry.
    pub fn with_limit(mut self, key: impl Into<String>, limit: u32) -> Self {
        self.limits.insert(key.into(), limit);
        self
    }

    /// Load configuration from a file path.
    ///
    /// Files ending in `.json` are parsed as JSON, everything else as YAML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading rate limit table");

        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&contents),
            _ => Self::from_yaml(&contents),
        }
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: LimiterConfig = serde_yaml::from_str(yaml)
            .map_err(|e| ThrottleError::Config(format!("Failed to parse limit table: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: LimiterConfig = serde_json::from_str(json)
            .map_err(|e| ThrottleError::Config(format!("Failed to parse limit table: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject tables that could block a caller forever.
    pub fn validate(&self) -> Result<()> {
        if self.default_limit == 0 {
            return Err(ThrottleError::InvalidLimit {
                key: "default_limit".to_string(),
            });
        }

        if let Some((key, _)) = self.limits.iter().find(|(_, limit)| **limit == 0) {
            return Err(ThrottleError::InvalidLimit { key: key.clone() });
        }

        if self.backoff.min_micros > self.backoff.max_micros {
            return Err(ThrottleError::Config(format!(
                "backoff.min_micros ({}) exceeds backoff.max_micros ({})",
                self.backoff.min_micros, self.backoff.max_micros
            )));
        }

        Ok(())
    }

    /// The warning threshold as a duration.
    pub fn wait_warning_threshold(&self) -> Duration {
        Duration::from_secs(self.wait_warning_threshold_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = LimiterConfig::default();
        assert_eq!(config.default_limit, 20);
        assert_eq!(config.wait_warning_threshold(), Duration::from_secs(300));
        assert_eq!(config.limits.len(), BUILTIN_LIMITS.len());
        assert_eq!(config.limits["service_tencentcloud_vod"], 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_config_has_no_entries() {
        let config = LimiterConfig::empty();
        assert!(config.limits.is_empty());
        assert_eq!(config.default_limit, DEFAULT_LIMIT);
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
default_limit: 50
limits:
  service_cvm: 5
  service_cvm.DescribeInstances: 15
backoff:
  max_micros: 500
"#;
        let config = LimiterConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.default_limit, 50);
        assert_eq!(config.limits["service_cvm"], 5);
        assert_eq!(config.limits["service_cvm.DescribeInstances"], 15);
        assert_eq!(config.backoff.min_micros, 10);
        assert_eq!(config.backoff.max_micros, 500);
        assert_eq!(config.wait_warning_threshold_secs, 300);
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{ "limits": { "service_clb": 3 }, "wait_warning_threshold_secs": 60 }"#;
        let config = LimiterConfig::from_json(json).unwrap();
        assert_eq!(config.default_limit, 20);
        assert_eq!(config.limits["service_clb"], 3);
        assert_eq!(config.wait_warning_threshold(), Duration::from_secs(60));
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = LimiterConfig::empty()
            .with_limit("service_cam", 4)
            .with_limit("service_cam.CreateRole", 1);

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed = LimiterConfig::from_yaml(&yaml).unwrap();

        assert_eq!(parsed.default_limit, config.default_limit);
        assert_eq!(parsed.limits, config.limits);
        assert_eq!(parsed.wait_warning_threshold_secs, 300);
        assert_eq!(parsed.backoff.min_micros, 10);
        assert_eq!(parsed.backoff.max_micros, 1000);
    }

    #[test]
    fn test_zero_limit_rejected() {
        let yaml = r#"
limits:
  service_cvm: 0
"#;
        match LimiterConfig::from_yaml(yaml) {
            Err(ThrottleError::InvalidLimit { key }) => assert_eq!(key, "service_cvm"),
            other => panic!("expected InvalidLimit, got {:?}", other),
        }

        let config = LimiterConfig::empty();
        let config = LimiterConfig {
            default_limit: 0,
            ..config
        };
        assert!(matches!(
            config.validate(),
            Err(ThrottleError::InvalidLimit { .. })
        ));
    }

    #[test]
    fn test_inverted_backoff_rejected() {
        let yaml = r#"
backoff:
  min_micros: 2000
  max_micros: 100
"#;
        assert!(matches!(
            LimiterConfig::from_yaml(yaml),
            Err(ThrottleError::Config(_))
        ));
    }

    #[test]
    fn test_malformed_yaml_rejected() {
        assert!(matches!(
            LimiterConfig::from_yaml("limits: [1, 2"),
            Err(ThrottleError::Config(_))
        ));
    }

    #[test]
    fn test_from_file_picks_format_by_extension() {
        let mut json = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(json, r#"{{ "limits": {{ "service_vpc": 7 }} }}"#).unwrap();
        let config = LimiterConfig::from_file(json.path()).unwrap();
        assert_eq!(config.limits["service_vpc"], 7);

        let mut yaml = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(yaml, "limits:\n  service_vpc: 8").unwrap();
        let config = LimiterConfig::from_file(yaml.path()).unwrap();
        assert_eq!(config.limits["service_vpc"], 8);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            LimiterConfig::from_file("/nonexistent/limits.yaml"),
            Err(ThrottleError::Io(_))
        ));
    }
}
