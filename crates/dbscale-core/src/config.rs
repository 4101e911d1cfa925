//! scalerd.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default tracing filter when neither `RUST_LOG` nor the file sets one.
pub const DEFAULT_LOG_FILTER: &str = "info,dbscale=debug,scalerd=debug";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalerdConfig {
    /// Directory holding one state database per storage project.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    pub log_filter: Option<String>,
    /// File the counters are rendered to (Prometheus text) on every flush.
    pub counters_path: Option<PathBuf>,
    /// JSON-lines file downstream events are appended to.
    pub events_path: Option<PathBuf>,
    /// Never call a real scale API; synthesize operation ids instead.
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
}

impl Default for ScalerdConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_filter: None,
            counters_path: None,
            events_path: None,
            dry_run: default_dry_run(),
        }
    }
}

impl ScalerdConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ScalerdConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load `path` if given, otherwise fall back to defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/dbscale")
}

fn default_dry_run() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let config: ScalerdConfig = toml::from_str("").unwrap();
        assert_eq!(config, ScalerdConfig::default());
        assert_eq!(config.log_filter(), DEFAULT_LOG_FILTER);
        assert!(config.dry_run);
    }

    #[test]
    fn test_parse_full() {
        let toml_str = r#"
data_dir = "/tmp/dbscale"
log_filter = "warn"
counters_path = "/tmp/dbscale/counters.prom"
events_path = "/tmp/dbscale/events.jsonl"
dry_run = false
"#;
        let config: ScalerdConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/dbscale"));
        assert_eq!(config.log_filter(), "warn");
        assert_eq!(
            config.events_path,
            Some(PathBuf::from("/tmp/dbscale/events.jsonl"))
        );
        assert!(!config.dry_run);
    }

    #[test]
    fn test_roundtrip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scalerd.toml");
        let mut config = ScalerdConfig::default();
        config.counters_path = Some(dir.path().join("counters.prom"));
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

        let loaded = ScalerdConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(ScalerdConfig::from_file(Path::new("/nonexistent/scalerd.toml")).is_err());
    }
}
