//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, JazzConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided it replaces the local override and is returned
/// even when missing, so loading reports it.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    // System config
    let system = PathBuf::from("/etc/jazzlens/config.toml");
    if system.exists() {
        files.push(system);
    }

    // User config (XDG_CONFIG_HOME or ~/.config)
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("jazzlens/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    // CLI override takes precedence over local
    if let Some(path) = cli_path {
        files.push(path.to_path_buf());
        return files;
    }

    // Local override (current directory)
    let local = PathBuf::from("jazzlens.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Overlay a TOML file onto `config`.
pub fn load_from_file(config: &mut JazzConfig, path: &Path) -> Result<(), ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    merge_toml(config, &contents, path)
}

/// Overlay TOML text onto `config`. Keys the text does not mention keep
/// their current values.
pub fn merge_toml(config: &mut JazzConfig, contents: &str, path: &Path) -> Result<(), ConfigError> {
    let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    if let Some(segmentation) = table.get("segmentation").and_then(|v| v.as_table()) {
        if let Some(v) = segmentation.get("onset_window") {
            config.segmentation.onset_window = float_value(v, "segmentation.onset_window", path)?;
        }
        if let Some(v) = segmentation.get("gap_threshold") {
            config.segmentation.gap_threshold = float_value(v, "segmentation.gap_threshold", path)?;
        }
        if let Some(v) = segmentation.get("max_chord_size") {
            config.segmentation.max_chord_size = count_value(v, "segmentation.max_chord_size", path)?;
        }
    }

    if let Some(key) = table.get("key").and_then(|v| v.as_table()) {
        if let Some(v) = key.get("jazz_key_bias") {
            config.key.jazz_key_bias = float_value(v, "key.jazz_key_bias", path)?;
        }
        if let Some(v) = key.get("cadence_window") {
            config.key.cadence_window = count_value(v, "key.cadence_window", path)?;
        }
        if let Some(v) = key.get("key") {
            let name = v.as_str().ok_or_else(|| invalid("key.key", "expected a string", path))?;
            config.key.key = Some(name.to_string());
        }
    }

    if let Some(telemetry) = table.get("telemetry").and_then(|v| v.as_table()) {
        if let Some(v) = telemetry.get("log_level") {
            let level = v
                .as_str()
                .ok_or_else(|| invalid("telemetry.log_level", "expected a string", path))?;
            config.telemetry.log_level = level.to_string();
        }
    }

    Ok(())
}

fn float_value(value: &toml::Value, key: &str, path: &Path) -> Result<f64, ConfigError> {
    value
        .as_float()
        .or_else(|| value.as_integer().map(|i| i as f64))
        .ok_or_else(|| invalid(key, "expected a number", path))
}

fn count_value(value: &toml::Value, key: &str, path: &Path) -> Result<usize, ConfigError> {
    value
        .as_integer()
        .and_then(|i| usize::try_from(i).ok())
        .ok_or_else(|| invalid(key, "expected a non-negative integer", path))
}

fn invalid(key: &str, message: &str, path: &Path) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{} in {}", message, path.display()),
    }
}

/// Apply `JAZZLENS_*` environment variable overrides to config.
pub fn apply_env_overrides(config: &mut JazzConfig, sources: &mut ConfigSources) -> Result<(), ConfigError> {
    apply_overrides(config, sources, |name| env::var(name).ok())
}

/// Apply overrides from any variable lookup.
pub fn apply_overrides(
    config: &mut JazzConfig,
    sources: &mut ConfigSources,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(v) = lookup("JAZZLENS_ONSET_WINDOW") {
        config.segmentation.onset_window = parse_env("JAZZLENS_ONSET_WINDOW", &v)?;
        sources.env_overrides.push("JAZZLENS_ONSET_WINDOW".to_string());
    }
    if let Some(v) = lookup("JAZZLENS_GAP_THRESHOLD") {
        config.segmentation.gap_threshold = parse_env("JAZZLENS_GAP_THRESHOLD", &v)?;
        sources.env_overrides.push("JAZZLENS_GAP_THRESHOLD".to_string());
    }
    if let Some(v) = lookup("JAZZLENS_MAX_CHORD_SIZE") {
        config.segmentation.max_chord_size = parse_env("JAZZLENS_MAX_CHORD_SIZE", &v)?;
        sources.env_overrides.push("JAZZLENS_MAX_CHORD_SIZE".to_string());
    }

    if let Some(v) = lookup("JAZZLENS_JAZZ_KEY_BIAS") {
        config.key.jazz_key_bias = parse_env("JAZZLENS_JAZZ_KEY_BIAS", &v)?;
        sources.env_overrides.push("JAZZLENS_JAZZ_KEY_BIAS".to_string());
    }
    if let Some(v) = lookup("JAZZLENS_CADENCE_WINDOW") {
        config.key.cadence_window = parse_env("JAZZLENS_CADENCE_WINDOW", &v)?;
        sources.env_overrides.push("JAZZLENS_CADENCE_WINDOW".to_string());
    }
    if let Some(v) = lookup("JAZZLENS_KEY") {
        config.key.key = Some(v);
        sources.env_overrides.push("JAZZLENS_KEY".to_string());
    }

    if let Some(v) = lookup("JAZZLENS_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("JAZZLENS_LOG_LEVEL".to_string());
    }

    Ok(())
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: name.to_string(),
        message: format!("cannot parse {:?}", value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_discover_config_files() {
        // Just verify it doesn't panic
        let _files = discover_config_files();
    }

    #[test]
    fn test_cli_path_always_listed() {
        let files = discover_config_files_with_override(Some(Path::new("/nonexistent/jazzlens.toml")));
        assert_eq!(files.last(), Some(&PathBuf::from("/nonexistent/jazzlens.toml")));
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml = r#"
[segmentation]
onset_window = 0.05
"#;
        let mut config = JazzConfig::default();
        merge_toml(&mut config, toml, Path::new("test.toml")).unwrap();
        assert_eq!(config.segmentation.onset_window, 0.05);
        // Other values should be defaults
        assert_eq!(config.segmentation.gap_threshold, 0.3);
        assert_eq!(config.key.cadence_window, 8);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
[segmentation]
onset_window = 0.08
gap_threshold = 1
max_chord_size = 6

[key]
jazz_key_bias = 0.05
cadence_window = 12
key = "Bb Major"

[telemetry]
log_level = "debug"
"#;
        let mut config = JazzConfig::default();
        merge_toml(&mut config, toml, Path::new("test.toml")).unwrap();

        assert_eq!(config.segmentation.onset_window, 0.08);
        assert_eq!(config.segmentation.gap_threshold, 1.0);
        assert_eq!(config.segmentation.max_chord_size, 6);
        assert_eq!(config.key.jazz_key_bias, 0.05);
        assert_eq!(config.key.cadence_window, 12);
        assert_eq!(config.key.key.as_deref(), Some("Bb Major"));
        assert_eq!(config.telemetry.log_level, "debug");
    }

    #[test]
    fn test_later_layers_only_touch_their_keys() {
        let mut config = JazzConfig::default();
        merge_toml(&mut config, "[segmentation]\nonset_window = 0.2\n", Path::new("a.toml")).unwrap();
        merge_toml(&mut config, "[segmentation]\ngap_threshold = 0.5\n", Path::new("b.toml")).unwrap();

        assert_eq!(config.segmentation.onset_window, 0.2);
        assert_eq!(config.segmentation.gap_threshold, 0.5);
    }

    #[test]
    fn test_wrong_type_is_invalid_value() {
        let mut config = JazzConfig::default();
        let err = merge_toml(&mut config, "[key]\ncadence_window = \"eight\"\n", Path::new("bad.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "key.cadence_window"));

        let err = merge_toml(&mut config, "[telemetry]
log_level = 3
", Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "telemetry.log_level"));
        assert_eq!(config.telemetry.log_level, "info");
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let mut config = JazzConfig::default();
        let err = merge_toml(&mut config, "[segmentation\n", Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = JazzConfig::default();
        let mut sources = ConfigSources::default();
        apply_overrides(
            &mut config,
            &mut sources,
            lookup(&[
                ("JAZZLENS_ONSET_WINDOW", "0.12"),
                ("JAZZLENS_MAX_CHORD_SIZE", "4"),
                ("JAZZLENS_KEY", "F# minor"),
                ("JAZZLENS_LOG_LEVEL", "trace"),
            ]),
        )
        .unwrap();

        assert_eq!(config.segmentation.onset_window, 0.12);
        assert_eq!(config.segmentation.max_chord_size, 4);
        assert_eq!(config.key.key.as_deref(), Some("F# minor"));
        assert_eq!(config.telemetry.log_level, "trace");
        assert_eq!(sources.env_overrides.len(), 4);
    }

    #[test]
    fn test_unparseable_env_value() {
        let mut config = JazzConfig::default();
        let mut sources = ConfigSources::default();
        let err = apply_overrides(&mut config, &mut sources, lookup(&[("JAZZLENS_GAP_THRESHOLD", "wide")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "JAZZLENS_GAP_THRESHOLD"));
        assert!(sources.env_overrides.is_empty());
    }
}
