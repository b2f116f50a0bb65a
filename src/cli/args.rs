//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Boxer - cached container image builds
///
/// Runs a build plan step by step in ephemeral containers, committing each
/// step as an image and reusing prior results from the cache.
#[derive(Parser, Debug)]
#[command(name = "boxer")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "BOXER_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build an image from a build plan
    Build(BuildArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the build command
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Build plan file (TOML, or JSON by extension)
    #[arg(default_value = "box.toml")]
    pub plan: PathBuf,

    /// Tag the final image
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Disable cache lookups for this build
    #[arg(short, long)]
    pub no_cache: bool,

    /// Remove a step from the step set (repeatable)
    #[arg(short, long, value_name = "STEP")]
    pub omit: Vec<String>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., runtime.program)
        key: String,
        /// Value to set
        value: String,
    },
}
