//! gmsa-stacks CLI entrypoint.
//!
//! This is the main entrypoint for the gmsa-stacks command-line tool.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use gmsa_stacks::assembly::{AssemblyWriter, CloudAssembly};
use gmsa_stacks::cli::{Cli, Commands, OutputFormatter};
use gmsa_stacks::composer::Composer;
use gmsa_stacks::config::{ConfigLoader, ConfigValidator, DeploymentConfig, find_config_file};
use gmsa_stacks::error::Result;

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Dispatches the selected command.
fn run(cli: &Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);
    let config = load_config(cli.config.as_ref())?;

    match cli.command() {
        Commands::Synth { out } => cmd_synth(&config, &out, &formatter),
        Commands::List => cmd_list(&config, &formatter),
        Commands::Validate { warnings } => cmd_validate(&config, warnings, &formatter),
    }
}

/// Build the stacks and write the cloud assembly.
fn cmd_synth(config: &DeploymentConfig, out: &Path, formatter: &OutputFormatter) -> Result<()> {
    let assembly = synthesize(config)?;
    let written = AssemblyWriter::new(out).write(&assembly)?;
    eprint!("{}", formatter.format_synth(&assembly, out, &written));
    Ok(())
}

/// Build the stacks and list them.
fn cmd_list(config: &DeploymentConfig, formatter: &OutputFormatter) -> Result<()> {
    let assembly = synthesize(config)?;
    eprint!("{}", formatter.format_stacks(&assembly));
    Ok(())
}

/// Validate the configuration without building anything.
fn cmd_validate(
    config: &DeploymentConfig,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let validator = ConfigValidator::new();
    let result = validator.validate(config);
    eprint!("{}", formatter.format_validation(&result, show_warnings));

    // Surface the first missing field as the exit status.
    validator.check_required(config)
}

fn synthesize(config: &DeploymentConfig) -> Result<CloudAssembly> {
    let app = Composer::new(config).compose()?;
    CloudAssembly::try_from(&app)
}

/// Resolves the configuration file path, searching upwards when none is given.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Option<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Some(path.clone()))
}

/// Loads `.env`, then the optional YAML file and the environment.
fn load_config(config_path: Option<&PathBuf>) -> Result<DeploymentConfig> {
    let config_file = resolve_config_path(config_path);

    let base_path = config_file
        .as_deref()
        .and_then(Path::parent)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let mut loader = ConfigLoader::new().with_base_path(base_path);
    loader.load_dotenv()?;

    match config_file {
        Some(path) => {
            debug!("Loading configuration from: {}", path.display());
            loader = loader.with_file(path);
        }
        None => debug!("No configuration file, using defaults and environment"),
    }

    let config = loader.load()?;
    info!("Solution: {}", config.solution_id);
    Ok(config)
}
