use std::fs::read_to_string;
use std::path::Path;

use serde::Deserialize;
use tracing::Level;

use crate::storage::backends::BackendConfigs;

#[derive(Debug, Default, Copy, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    /// The max level to filter at, `None` disables logging entirely.
    pub fn as_level(self) -> Option<Level> {
        match self {
            Self::Off => None,
            Self::Error => Some(Level::ERROR),
            Self::Info => Some(Level::INFO),
            Self::Debug => Some(Level::DEBUG),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub log_level: LogLevel,

    /// The storage the notifications refer to.
    pub backend: BackendConfigs,

    #[serde(default)]
    /// The `WxH=suffix` sizes each image is resized to.
    ///
    /// The `TARGET_SIZES` environment variable takes precedence over this.
    pub target_sizes: Vec<String>,

    #[serde(default = "default_object_concurrency")]
    /// The max number of objects of a single batch processed at once.
    ///
    /// Defaults to `4`.
    pub object_concurrency: usize,

    #[serde(default = "default_variant_concurrency")]
    /// The max number of variants of a single object rendered and uploaded
    /// at once.
    ///
    /// Defaults to `2`.
    pub variant_concurrency: usize,
}

impl RuntimeConfig {
    pub fn from_file(file: impl AsRef<Path>) -> anyhow::Result<Self> {
        let data = read_to_string(file)?;
        Self::from_yaml(&data)
    }

    pub fn from_yaml(data: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str::<Self>(data)?)
    }

    /// Replaces the configured sizes with a whitespace separated
    /// `WxH=suffix` list, as given by `TARGET_SIZES`.
    pub fn override_target_sizes(&mut self, sizes: &str) {
        self.target_sizes = sizes.split_whitespace().map(str::to_owned).collect();
    }
}

const fn default_object_concurrency() -> usize {
    4
}

const fn default_variant_concurrency() -> usize {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_a_minimal_config() {
        let cfg = RuntimeConfig::from_yaml(
            r#"
backend:
  filesystem:
    directory: /tmp/objects
"#,
        )
        .unwrap();

        assert!(matches!(cfg.log_level, LogLevel::Info));
        assert!(matches!(cfg.backend, BackendConfigs::FileSystem { .. }));
        assert!(cfg.target_sizes.is_empty());
        assert_eq!(cfg.object_concurrency, 4);
        assert_eq!(cfg.variant_concurrency, 2);
    }

    #[test]
    fn loads_a_full_config() {
        let cfg = RuntimeConfig::from_yaml(
            r#"
log_level: debug
backend:
  blobstorage:
    region: eu-west-1
    endpoint: http://localhost:9000
    path_style: true
    request_timeout_secs: 10
target_sizes:
  - 100x100=thumb
  - 400x400=medium
object_concurrency: 8
variant_concurrency: 3
"#,
        )
        .unwrap();

        assert!(matches!(cfg.log_level, LogLevel::Debug));
        assert!(matches!(
            cfg.backend,
            BackendConfigs::BlobStorage { path_style: true, request_timeout_secs: Some(10), .. }
        ));
        assert_eq!(cfg.target_sizes, vec!["100x100=thumb", "400x400=medium"]);
        assert_eq!(cfg.object_concurrency, 8);
        assert_eq!(cfg.variant_concurrency, 3);
    }

    #[test]
    fn environment_sizes_replace_file_sizes() {
        let mut cfg = RuntimeConfig::from_yaml(
            r#"
backend:
  filesystem:
    directory: /tmp/objects
target_sizes: ["1x1=tiny"]
"#,
        )
        .unwrap();

        cfg.override_target_sizes("  100x100=thumb\t400x400=medium\n");
        assert_eq!(cfg.target_sizes, vec!["100x100=thumb", "400x400=medium"]);
    }

    #[test]
    fn a_backend_is_required() {
        assert!(RuntimeConfig::from_yaml("target_sizes: []").is_err());
    }
}
