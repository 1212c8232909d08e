//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Cue Sequencer - plays a local motion over a set of cues
#[derive(Parser, Debug)]
#[command(
    name = "cue-sequencer",
    author,
    version,
    about = "Interval cue sequencer driven by a kinematic motion",
    long_about = "Loads a session (sequencer tuning, motion setup and cues), starts the \n\
                  motion and logs enter/exit notifications as the position crosses \n\
                  cue boundaries."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "CUE_SEQUENCER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "CUE_SEQUENCER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Play the session motion and log notifications
    Run(RunArgs),

    /// Validate session and cue files without running
    Validate(ValidateArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to session file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "session.toml",
        env = "CUE_SEQUENCER_CONFIG"
    )]
    pub config: PathBuf,

    /// Additional cue file, applied after the session cues
    #[arg(long, env = "CUE_SEQUENCER_CUES")]
    pub cues: Option<PathBuf>,

    /// Override the schedule lookahead in seconds
    #[arg(long, env = "CUE_SEQUENCER_LOOKAHEAD")]
    pub lookahead: Option<f64>,

    /// Override the initial velocity of the motion
    #[arg(long, allow_hyphen_values = true)]
    pub velocity: Option<f64>,

    /// Playback duration in seconds (0 = until interrupted)
    #[arg(long, default_value = "10", env = "CUE_SEQUENCER_DURATION")]
    pub duration: f64,

    /// Validate configuration and exit without playing
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "CUE_SEQUENCER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to session file to validate
    #[arg(short, long, default_value = "session.toml")]
    pub config: PathBuf,

    /// Cue file to validate alongside the session
    #[arg(long)]
    pub cues: Option<PathBuf>,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
