//! Configuration loading for jazzlens.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins, key by key):
//! 1. `/etc/jazzlens/config.toml` (system)
//! 2. `~/.config/jazzlens/config.toml` (user)
//! 3. `./jazzlens.toml` (local override), or the file given with `--config`
//! 4. Environment variables (`JAZZLENS_*`)
//!
//! # Example Config
//!
//! ```toml
//! [segmentation]
//! onset_window = 0.1
//! gap_threshold = 0.3
//! max_chord_size = 8
//!
//! [key]
//! jazz_key_bias = 0.02
//! cadence_window = 8
//! # key = "Bb Major"
//!
//! [telemetry]
//! log_level = "info"
//! ```

pub mod loader;
pub mod settings;

pub use loader::{discover_config_files_with_override, ConfigSources};
pub use settings::{KeyConfig, SegmentationConfig, TelemetryConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Complete jazzlens configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct JazzConfig {
    #[serde(default)]
    pub segmentation: SegmentationConfig,

    #[serde(default)]
    pub key: KeyConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl JazzConfig {
    /// Load configuration from all sources.
    ///
    /// Load order (later wins):
    /// 1. Compiled defaults
    /// 2. `/etc/jazzlens/config.toml`
    /// 3. `~/.config/jazzlens/config.toml`
    /// 4. `./jazzlens.toml`
    /// 5. Environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration from a specific file path, then apply env overrides.
    ///
    /// If `config_path` is provided, it takes precedence over the local
    /// `./jazzlens.toml` override. System and user configs still load first.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    ///
    /// The result is validated.
    pub fn load_with_sources_from(config_path: Option<&Path>) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = JazzConfig::default();

        // Load config files in order
        for path in loader::discover_config_files_with_override(config_path) {
            loader::load_from_file(&mut config, &path)?;
            sources.files.push(path);
        }

        // Apply environment variable overrides
        loader::apply_env_overrides(&mut config, &mut sources)?;

        config.validate()?;
        Ok((config, sources))
    }

    /// Reject thresholds the analysis cannot use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let check = |key: &str, value: f64, ok: bool, bound: &str| {
            if value.is_finite() && ok {
                Ok(())
            } else {
                Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!("must be a finite number {}, got {}", bound, value),
                })
            }
        };

        let onset = self.segmentation.onset_window;
        let gap = self.segmentation.gap_threshold;
        let bias = self.key.jazz_key_bias;
        check("segmentation.onset_window", onset, onset > 0.0, "> 0")?;
        check("segmentation.gap_threshold", gap, gap > 0.0, "> 0")?;
        check("key.jazz_key_bias", bias, bias >= 0.0, ">= 0")?;

        // A chord needs at least two notes
        if self.segmentation.max_chord_size < 2 {
            return Err(ConfigError::InvalidValue {
                key: "segmentation.max_chord_size".to_string(),
                message: format!("must be at least 2, got {}", self.segmentation.max_chord_size),
            });
        }

        if let Some(key) = &self.key.key {
            if key.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "key.key".to_string(),
                    message: "must not be empty".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        // Build TOML manually for nicer formatting
        let mut output = String::new();

        output.push_str("# jazzlens configuration\n\n");

        output.push_str("[segmentation]\n");
        output.push_str(&format!("onset_window = {:?}\n", self.segmentation.onset_window));
        output.push_str(&format!("gap_threshold = {:?}\n", self.segmentation.gap_threshold));
        output.push_str(&format!("max_chord_size = {}\n", self.segmentation.max_chord_size));

        output.push_str("\n[key]\n");
        output.push_str(&format!("jazz_key_bias = {:?}\n", self.key.jazz_key_bias));
        output.push_str(&format!("cadence_window = {}\n", self.key.cadence_window));
        match &self.key.key {
            Some(key) => output.push_str(&format!("key = {:?}\n", key)),
            None => output.push_str("# key = \"C Major\"\n"),
        }

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!("log_level = {:?}\n", self.telemetry.log_level));

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = JazzConfig::default();
        assert_eq!(config.segmentation.onset_window, 0.1);
        assert_eq!(config.segmentation.gap_threshold, 0.3);
        assert_eq!(config.segmentation.max_chord_size, 8);
        assert_eq!(config.key.jazz_key_bias, 0.02);
        assert_eq!(config.key.cadence_window, 8);
        assert!(config.key.key.is_none());
        assert_eq!(config.telemetry.log_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_to_toml_round_trips() {
        let mut config = JazzConfig::default();
        config.segmentation.onset_window = 0.05;
        config.key.key = Some("Eb Major".to_string());

        let text = config.to_toml();
        assert!(text.contains("[segmentation]"));
        assert!(text.contains("[key]"));
        assert!(text.contains("[telemetry]"));

        let mut reloaded = JazzConfig::default();
        loader::merge_toml(&mut reloaded, &text, Path::new("roundtrip.toml")).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_load_from_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[segmentation]\nmax_chord_size = 5\n\n[key]\nkey = \"G minor\"").unwrap();

        let (config, sources) = JazzConfig::load_with_sources_from(Some(file.path())).unwrap();
        assert_eq!(config.segmentation.max_chord_size, 5);
        assert_eq!(config.key.key.as_deref(), Some("G minor"));
        assert_eq!(sources.files.last().map(PathBuf::as_path), Some(file.path()));
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let err = JazzConfig::load_from(Some(&missing)).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }

    #[test]
    fn test_validate_rejects_out_of_range_values() {
        let mut config = JazzConfig::default();
        config.segmentation.onset_window = -0.1;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));

        let mut config = JazzConfig::default();
        config.segmentation.onset_window = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "segmentation.onset_window"
        ));

        let mut config = JazzConfig::default();
        config.segmentation.gap_threshold = 0.0;
        assert!(config.validate().is_err());

        let mut config = JazzConfig::default();
        config.segmentation.max_chord_size = 0;
        assert!(config.validate().is_err());

        let mut config = JazzConfig::default();
        config.segmentation.max_chord_size = 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "segmentation.max_chord_size"
        ));

        let mut config = JazzConfig::default();
        config.segmentation.max_chord_size = 2;
        config.key.jazz_key_bias = 0.0;
        assert!(config.validate().is_ok());

        let mut config = JazzConfig::default();
        config.key.jazz_key_bias = f64::NAN;
        assert!(config.validate().is_err());
    }
}
