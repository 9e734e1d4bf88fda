//! jazzlens - harmonic analysis of jazz MIDI performances
//!
//! Subcommands:
//! - `jazzlens analyze <file>` - Print chords, key and progression as JSON
//! - `jazzlens config` - Print the effective configuration as TOML

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

mod commands;

#[derive(Parser)]
#[command(name = "jazzlens")]
#[command(about = "Chord, key and progression analysis for jazz MIDI")]
#[command(version)]
struct Cli {
    /// Config file to load instead of ./jazzlens.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a Standard MIDI File
    Analyze {
        /// Path to a .mid file
        file: PathBuf,

        /// Use this key instead of detecting one (e.g. "Bb Major", "F#m")
        #[arg(short, long)]
        key: Option<String>,

        /// Print JSON on a single line
        #[arg(long)]
        compact: bool,
    },

    /// Print the effective configuration
    Config {
        /// List the files and environment variables that contributed
        #[arg(long)]
        sources: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = jazzconf::JazzConfig::load_with_sources_from(cli.config.as_deref())
        .context("loading configuration")?;

    init_tracing(&config.telemetry.log_level);
    debug!(files = ?sources.files, env = ?sources.env_overrides, "configuration loaded");

    match cli.command {
        Commands::Analyze { file, key, compact } => {
            let output = commands::analyze(&file, key.as_deref(), &config, compact)?;
            println!("{}", output);
        }
        Commands::Config { sources: show } => {
            print!("{}", commands::show_config(&config, &sources, show));
        }
    }

    Ok(())
}

/// Log to stderr so stdout stays machine-readable. `RUST_LOG` wins over the
/// configured level.
fn init_tracing(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
