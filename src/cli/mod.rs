//! CLI module for the stack synthesizer.
//!
//! This module provides the command-line interface for synthesizing,
//! listing and validating the stacks.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
