//! Service endpoints and the combined TOML config file.
//!
//! ```toml
//! [pipeline]
//! threshold = 0.7
//!
//! [services]
//! primary_url = "http://127.0.0.1:8080/predict"
//! secondary_url = "http://127.0.0.1:8081/predict"
//! ```

use anyhow::{Context, Result};
use gate_pipeline::PipelineConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_PRIMARY_URL: &str = "http://127.0.0.1:8080/predict";
const DEFAULT_SECONDARY_URL: &str = "http://127.0.0.1:8081/predict";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Where the two classifier services live.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub primary_url: String,
    pub secondary_url: String,
    /// Per-request HTTP timeout
    pub http_timeout_secs: u64,
    /// Sent as a bearer token when set
    pub api_token: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            primary_url: DEFAULT_PRIMARY_URL.into(),
            secondary_url: DEFAULT_SECONDARY_URL.into(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            api_token: None,
        }
    }
}

impl ServiceConfig {
    pub fn with_env(self) -> Result<Self> {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    pub fn with_env_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("GATE_PRIMARY_URL") {
            self.primary_url = url;
        }
        if let Some(url) = lookup("GATE_SECONDARY_URL") {
            self.secondary_url = url;
        }
        if let Some(v) = lookup("GATE_HTTP_TIMEOUT_SECS") {
            self.http_timeout_secs = v
                .trim()
                .parse()
                .with_context(|| format!("invalid value for GATE_HTTP_TIMEOUT_SECS: {v:?}"))?;
        }
        if let Some(token) = lookup("GATE_API_TOKEN").filter(|t| !t.is_empty()) {
            self.api_token = Some(token);
        }
        Ok(self)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Everything `--config` may set.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub pipeline: PipelineConfig,
    pub services: ServiceConfig,
}

impl FileConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).context("failed to parse config")?;
        config.pipeline.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Defaults, then the optional file, then the environment.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        Ok(Self {
            pipeline: base.pipeline.with_env()?,
            services: base.services.with_env()?,
        })
    }

    /// Command-line values win over everything loaded so far.
    pub fn with_overrides(mut self, overrides: &Overrides) -> Result<Self> {
        if let Some(threshold) = overrides.threshold {
            self.pipeline.threshold = threshold;
        }
        if let Some(units) = overrides.max_input_units {
            self.pipeline.max_input_units = units;
        }
        if let Some(secs) = overrides.arbitration_timeout_secs {
            self.pipeline.arbitration_timeout_secs = secs;
        }
        if let Some(url) = &overrides.primary_url {
            self.services.primary_url = url.clone();
        }
        if let Some(url) = &overrides.secondary_url {
            self.services.secondary_url = url.clone();
        }
        self.pipeline
            .validate()
            .context("invalid command-line override")?;
        Ok(self)
    }
}

/// Values given as flags; `None` leaves the loaded value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub threshold: Option<f64>,
    pub max_input_units: Option<usize>,
    pub arbitration_timeout_secs: Option<u64>,
    pub primary_url: Option<String>,
    pub secondary_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_sections_are_optional() {
        let config = FileConfig::from_toml_str("[services]\nhttp_timeout_secs = 5\n").unwrap();
        assert_eq!(config.pipeline, PipelineConfig::default());
        assert_eq!(config.services.http_timeout_secs, 5);
        assert_eq!(config.services.primary_url, DEFAULT_PRIMARY_URL);
    }

    #[test]
    fn test_file_threshold_is_validated() {
        assert!(FileConfig::from_toml_str("[pipeline]\nthreshold = -0.1\n").is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let services = ServiceConfig {
            primary_url: "http://from-file".into(),
            ..Default::default()
        }
        .with_env_from(env(&[
            ("GATE_PRIMARY_URL", "http://from-env"),
            ("GATE_API_TOKEN", "secret"),
        ]))
        .unwrap();

        assert_eq!(services.primary_url, "http://from-env");
        assert_eq!(services.secondary_url, DEFAULT_SECONDARY_URL);
        assert_eq!(services.api_token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_empty_token_is_ignored() {
        let services = ServiceConfig::default()
            .with_env_from(env(&[("GATE_API_TOKEN", "")]))
            .unwrap();
        assert_eq!(services.api_token, None);
    }

    #[test]
    fn test_bad_timeout_env() {
        let err = ServiceConfig::default()
            .with_env_from(env(&[("GATE_HTTP_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("GATE_HTTP_TIMEOUT_SECS"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gate.toml");
        std::fs::write(
            &path,
            "[pipeline]\nthreshold = 0.85\n\n[services]\nsecondary_url = \"http://zs:9000\"\n",
        )
        .unwrap();

        let config = FileConfig::load(&path).unwrap();
        assert_eq!(config.pipeline.threshold, 0.85);
        assert_eq!(config.services.secondary_url, "http://zs:9000");
    }

    #[test]
    fn test_flags_override_file_and_env() {
        let file = FileConfig::from_toml_str(
            "[pipeline]\nthreshold = 0.85\nmax_input_units = 64\n\n\
             [services]\nprimary_url = \"http://from-file\"\n",
        )
        .unwrap();
        let loaded = FileConfig {
            pipeline: file.pipeline.with_env_from(env(&[("GATE_THRESHOLD", "0.6")])).unwrap(),
            services: file
                .services
                .with_env_from(env(&[("GATE_SECONDARY_URL", "http://from-env")]))
                .unwrap(),
        };
        assert_eq!(loaded.pipeline.threshold, 0.6);

        let config = loaded
            .with_overrides(&Overrides {
                threshold: Some(0.9),
                primary_url: Some("http://from-flag".into()),
                secondary_url: Some("http://flag-zs".into()),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(config.pipeline.threshold, 0.9);
        assert_eq!(config.pipeline.max_input_units, 64);
        assert_eq!(config.services.primary_url, "http://from-flag");
        assert_eq!(config.services.secondary_url, "http://flag-zs");
    }

    #[test]
    fn test_absent_flags_keep_loaded_values() {
        let loaded = FileConfig {
            services: ServiceConfig {
                secondary_url: "http://from-env".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        let config = loaded.clone().with_overrides(&Overrides::default()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_flag_threshold_is_validated() {
        let err = FileConfig::default()
            .with_overrides(&Overrides {
                threshold: Some(1.5),
                ..Default::default()
            })
            .unwrap_err();
        assert!(err.to_string().contains("command-line override"));
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = FileConfig::load(Path::new("/nonexistent/gate.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/gate.toml"));
    }
}
