//! Configuration sections.

use serde::{Deserialize, Serialize};

/// Chord segmentation thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Seconds within which notes count as one onset.
    /// Default: 0.1
    #[serde(default = "SegmentationConfig::default_onset_window")]
    pub onset_window: f64,

    /// Onset groups starting within this many seconds merge.
    /// Default: 0.3
    #[serde(default = "SegmentationConfig::default_gap_threshold")]
    pub gap_threshold: f64,

    /// Merging never grows a chord past this many notes.
    /// Default: 8
    #[serde(default = "SegmentationConfig::default_max_chord_size")]
    pub max_chord_size: usize,
}

impl SegmentationConfig {
    fn default_onset_window() -> f64 {
        0.1
    }

    fn default_gap_threshold() -> f64 {
        0.3
    }

    fn default_max_chord_size() -> usize {
        8
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            onset_window: Self::default_onset_window(),
            gap_threshold: Self::default_gap_threshold(),
            max_chord_size: Self::default_max_chord_size(),
        }
    }
}

/// Key detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyConfig {
    /// Correlation bonus for common jazz keys.
    /// Default: 0.02
    #[serde(default = "KeyConfig::default_jazz_key_bias")]
    pub jazz_key_bias: f64,

    /// Leading chords searched for a ii-V-I.
    /// Default: 8
    #[serde(default = "KeyConfig::default_cadence_window")]
    pub cadence_window: usize,

    /// Fixed key such as "Bb Major"; skips detection when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl KeyConfig {
    fn default_jazz_key_bias() -> f64 {
        0.02
    }

    fn default_cadence_window() -> usize {
        8
    }
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            jazz_key_bias: Self::default_jazz_key_bias(),
            cadence_window: Self::default_cadence_window(),
            key: None,
        }
    }
}

/// Logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// `tracing` filter used when `RUST_LOG` is unset.
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}
