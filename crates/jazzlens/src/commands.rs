use std::path::Path;

use anyhow::{Context, Result};
use jazzconf::{ConfigSources, JazzConfig};
use music_understand::{AnalysisParams, KeyEstimate, KeyParams, MusicUnderstandingEngine, SegmentationParams};
use tracing::info;

/// Analyze a MIDI file and render the result as JSON.
///
/// `key` overrides the configured key; with neither set the key is detected.
pub fn analyze(file: &Path, key: Option<&str>, config: &JazzConfig, compact: bool) -> Result<String> {
    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;

    let fixed_key = key
        .or(config.key.key.as_deref())
        .map(str::parse::<KeyEstimate>)
        .transpose()?;

    let engine = MusicUnderstandingEngine::new(analysis_params(config));
    let result = engine
        .compute(&bytes, fixed_key)
        .with_context(|| format!("analyzing {}", file.display()))?;

    info!(
        file = %file.display(),
        key = %result.detected_key,
        chords = result.chords.len(),
        "analysis complete"
    );

    let json = if compact {
        serde_json::to_string(&result)?
    } else {
        serde_json::to_string_pretty(&result)?
    };
    Ok(json)
}

pub fn analysis_params(config: &JazzConfig) -> AnalysisParams {
    AnalysisParams {
        segmentation: SegmentationParams {
            onset_window: config.segmentation.onset_window,
            gap_threshold: config.segmentation.gap_threshold,
            max_chord_size: config.segmentation.max_chord_size,
        },
        key: KeyParams {
            jazz_key_bias: config.key.jazz_key_bias,
            cadence_window: config.key.cadence_window,
        },
    }
}

/// Effective configuration as TOML, optionally preceded by its sources as
/// comments.
pub fn show_config(config: &JazzConfig, sources: &ConfigSources, show_sources: bool) -> String {
    let mut output = String::new();

    if show_sources {
        if sources.files.is_empty() {
            output.push_str("# files: none (defaults)\n");
        }
        for file in &sources.files {
            output.push_str(&format!("# file: {}\n", file.display()));
        }
        for var in &sources.env_overrides {
            output.push_str(&format!("# env: {}\n", var));
        }
        output.push('\n');
    }

    output.push_str(&config.to_toml());
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn params_follow_config() {
        let mut config = JazzConfig::default();
        config.segmentation.onset_window = 0.07;
        config.key.cadence_window = 4;

        let params = analysis_params(&config);
        assert_eq!(params.segmentation.onset_window, 0.07);
        assert_eq!(params.segmentation.max_chord_size, 8);
        assert_eq!(params.key.cadence_window, 4);
    }

    #[test]
    fn default_config_matches_default_params() {
        assert_eq!(analysis_params(&JazzConfig::default()), AnalysisParams::default());
    }

    #[test]
    fn sources_listed_as_comments() {
        let sources = ConfigSources {
            files: vec![PathBuf::from("/etc/jazzlens/config.toml")],
            env_overrides: vec!["JAZZLENS_KEY".to_string()],
        };
        let text = show_config(&JazzConfig::default(), &sources, true);
        assert!(text.starts_with("# file: /etc/jazzlens/config.toml\n# env: JAZZLENS_KEY\n"));
        assert!(text.contains("[segmentation]"));
    }
}
