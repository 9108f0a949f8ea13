//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::assembly::DEFAULT_OUTPUT_DIR;

/// gmsa-stacks - Synthesizes the SQL Server, Active Directory and gMSA ECS stacks.
#[derive(Parser, Debug)]
#[command(name = "gmsa-stacks")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a YAML configuration file layered under the environment.
    #[arg(short, long, global = true, env = "GMSA_STACKS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute; `synth` when omitted.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Build all stacks and write the cloud assembly.
    Synth {
        /// Directory receiving the templates and manifest.
        #[arg(short = 'o', long = "out", default_value = DEFAULT_OUTPUT_DIR)]
        out: PathBuf,
    },

    /// Build all stacks and list them in deployment order.
    List,

    /// Check required settings and report configuration warnings.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Self::Synth {
            out: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// The command to run.
    #[must_use]
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_synth() {
        let cli = Cli::try_parse_from(["gmsa-stacks"]).unwrap();
        assert_eq!(cli.command(), Commands::default());
        assert_eq!(cli.output, OutputFormat::Text);
    }

    #[test]
    fn test_synth_out_dir() {
        let cli = Cli::try_parse_from(["gmsa-stacks", "synth", "--out", "cdk.out"]).unwrap();
        assert_eq!(
            cli.command(),
            Commands::Synth {
                out: PathBuf::from("cdk.out")
            }
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["gmsa-stacks", "list", "--output", "json", "-v"]).unwrap();
        assert_eq!(cli.command(), Commands::List);
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(cli.verbose);
    }

    #[test]
    fn test_validate_warnings_flag() {
        let cli = Cli::try_parse_from(["gmsa-stacks", "validate", "-w"]).unwrap();
        assert_eq!(cli.command(), Commands::Validate { warnings: true });
    }
}
