//! Configuration module for stack synthesis.
//!
//! This module handles all configuration-related functionality:
//! - The [`DeploymentConfig`] record and its defaults
//! - Loading from a YAML file, `.env` and environment variables
//! - The required-field check and advisory lint

mod settings;
mod loader;
mod validator;

pub use settings::{
    AdEdition, DEFAULT_APP_IMAGE, DEFAULT_SOLUTION_ID, DeploymentConfig, Environment, StackKind,
};
pub use loader::{ConfigLoader, DEFAULT_CONFIG_FILES, EnvSource, ProcessEnv, find_config_file};
pub use validator::{ConfigValidator, ValidationResult};

pub(crate) use validator::{ingress_cidr, parse_cidr};
