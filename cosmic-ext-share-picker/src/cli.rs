//! Command Line & Logging
//!
//! Argument parsing and `tracing` setup for the picker binary.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

/// COSMIC screen share picker
#[derive(Parser, Debug)]
#[command(name = "cosmic-ext-share-picker")]
#[command(about = "Pick and configure a screen share stream", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Set log level (error, warn, info, debug, trace)
    #[arg(short, long, value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Enable JSON structured logging
    #[arg(long)]
    pub json_logs: bool,

    /// Show timestamps in logs (`--timestamps false` to hide them)
    #[arg(long, value_name = "BOOL", action = ArgAction::Set, default_value_t = true)]
    pub timestamps: bool,

    /// Configuration file (defaults to ~/.config/cosmic/cosmic-ext-share/picker.toml)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the picker in the terminal and print the chosen stream as JSON
    Pick {
        /// JSON file with the capture sources (`[{"id", "name", "url"}]`)
        sources: PathBuf,

        /// Go straight to the settings step with the first source
        #[arg(long)]
        skip_picker: bool,

        /// Local user id reported by the media engine
        #[arg(long, value_name = "ID")]
        user_id: Option<String>,

        /// Do not create a virtual microphone even if audio is enabled
        #[arg(long)]
        no_virtmic: bool,
    },

    /// Print the quality derived from a resolution and frame rate
    Derive {
        /// Vertical resolution (480, 720, 1080, 1440, 2160)
        resolution: String,

        /// Frame rate (15, 30, 60)
        fps: String,
    },

    /// Show current configuration
    DumpConfig,
}

/// Initialize logging based on CLI configuration
///
/// Logs go to stderr so stdout stays clean for the JSON result.
pub fn init_logging(cli: &Cli) -> Result<()> {
    let log_level = cli.log_level.parse::<Level>().with_context(|| {
        format!(
            "Invalid log level '{}'. Valid levels: error, warn, info, debug, trace",
            cli.log_level
        )
    })?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level.as_str()))
        .context("Failed to create log filter")?;

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(true)
        .with_line_number(true);

    match (cli.json_logs, cli.timestamps) {
        (true, true) => subscriber.json().init(),
        (true, false) => subscriber.without_time().json().init(),
        (false, true) => subscriber.init(),
        (false, false) => subscriber.without_time().init(),
    }

    info!(
        "Logging initialized: level={}, json={}, timestamps={}",
        log_level, cli.json_logs, cli.timestamps
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_pick() {
        let cli = Cli::parse_from([
            "cosmic-ext-share-picker",
            "--log-level",
            "debug",
            "pick",
            "sources.json",
            "--skip-picker",
            "--user-id",
            "456",
        ]);
        assert_eq!(cli.log_level, "debug");
        match cli.command {
            Command::Pick {
                sources,
                skip_picker,
                user_id,
                no_virtmic,
            } => {
                assert_eq!(sources, PathBuf::from("sources.json"));
                assert!(skip_picker);
                assert_eq!(user_id.as_deref(), Some("456"));
                assert!(!no_virtmic);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_timestamps_switch() {
        let cli = Cli::parse_from(["cosmic-ext-share-picker", "derive", "1080", "60"]);
        assert!(cli.timestamps);

        let cli = Cli::parse_from([
            "cosmic-ext-share-picker",
            "--timestamps",
            "false",
            "derive",
            "1080",
            "60",
        ]);
        assert!(!cli.timestamps);

        let cli =
            Cli::parse_from(["cosmic-ext-share-picker", "--timestamps=false", "dump-config"]);
        assert!(!cli.timestamps);
    }

    #[test]
    fn test_parse_derive() {
        let cli = Cli::parse_from(["cosmic-ext-share-picker", "derive", "1080", "60"]);
        assert!(matches!(
            cli.command,
            Command::Derive { ref resolution, ref fps } if resolution == "1080" && fps == "60"
        ));
    }
}
