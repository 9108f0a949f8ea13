//! Configuration loader.
//!
//! Builds a [`DeploymentConfig`] from built-in defaults, an optional YAML
//! file and environment variables, in increasing order of precedence. The
//! loader never rejects a configuration for missing required values; that
//! check belongs to the composer.

use crate::error::{ConfigError, Result, SynthError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

use super::settings::{AdEdition, DeploymentConfig};

/// Source of environment-style key/value settings.
pub trait EnvSource {
    /// Returns the value of `name`, if set.
    fn var(&self, name: &str) -> Option<String>;
}

/// Reads from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl EnvSource for HashMap<&str, &str> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).map(|v| (*v).to_string())
    }
}

/// Loader for the deployment configuration.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Optional YAML file layered under the environment.
    file: Option<PathBuf>,
    /// Directory searched for `.env`.
    base_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Creates a loader that uses defaults and the environment only.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            file: None,
            base_path: None,
        }
    }

    /// Layers a YAML file between the defaults and the environment.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Sets the directory searched for `.env`.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML file cannot be read or parsed, or if a
    /// numeric variable does not parse.
    pub fn load(&self) -> Result<DeploymentConfig> {
        self.load_from(&ProcessEnv)
    }

    /// Loads the configuration, reading variables from `env`.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML file cannot be read or parsed, or if a
    /// numeric variable does not parse.
    pub fn load_from(&self, env: &dyn EnvSource) -> Result<DeploymentConfig> {
        let mut config = match &self.file {
            Some(path) => Self::load_file(path)?,
            None => DeploymentConfig::default(),
        };

        Self::apply_env(&mut config, env)?;

        debug!("Loaded configuration for solution: {}", config.solution_id);
        Ok(config)
    }

    /// Loads a YAML configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be parsed.
    pub fn load_file(path: impl AsRef<Path>) -> Result<DeploymentConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(SynthError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            SynthError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        Self::parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(content: &str, source: Option<&Path>) -> Result<DeploymentConfig> {
        debug!("Parsing YAML configuration");

        serde_yaml::from_str(content).map_err(|e| {
            SynthError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location: source.map(|p| p.display().to_string()),
            })
        })
    }

    /// Overrides configuration values with variables present in `env`.
    fn apply_env(config: &mut DeploymentConfig, env: &dyn EnvSource) -> Result<()> {
        let set_string = |target: &mut String, name: &str| {
            if let Some(value) = env.var(name) {
                debug!("Overriding {name} from environment");
                *target = value;
            }
        };

        set_string(&mut config.solution_id, "SOLUTION_ID");
        set_string(&mut config.ec2_instance_keypair_name, "EC2_INSTANCE_KEYPAIR_NAME");
        set_string(&mut config.my_sg_ingress_ip, "MY_SG_INGRESS_IP");
        set_string(&mut config.vpc_cidr, "VPC_CIDR");
        set_string(&mut config.ad_domain_name, "AD_DOMAIN_NAME");
        set_string(&mut config.gmsa_account_name, "GMSA_ACCOUNT_NAME");
        set_string(&mut config.db_instance_class, "DB_INSTANCE_CLASS");
        set_string(&mut config.bastion_instance_type, "BASTION_INSTANCE_TYPE");
        set_string(&mut config.ecs_instance_type, "ECS_INSTANCE_TYPE");
        set_string(&mut config.app_image, "APP_IMAGE");

        if let Some(flag) = env.var("DOMAIN_JOIN_ECS") {
            config.domain_join_ecs = is_enabled(&flag);
        }
        if let Some(flag) = env.var("DEPLOY_APP") {
            config.deploy_app = is_enabled(&flag);
        }

        if let Some(revision) = env.var("APP_TD_REVISION") {
            config.app_td_revision = non_empty(revision);
        }
        if let Some(account) = env.var("CDK_DEFAULT_ACCOUNT") {
            config.account = non_empty(account);
        }
        if let Some(region) = env.var("CDK_DEFAULT_REGION") {
            config.region = non_empty(region);
        }

        if let Some(edition) = env.var("AD_EDITION") {
            config.ad_edition = edition.parse()?;
        }
        if let Some(storage) = env.var("DB_ALLOCATED_STORAGE") {
            config.db_allocated_storage_gb = parse_number("DB_ALLOCATED_STORAGE", &storage)?;
        }
        if let Some(capacity) = env.var("ECS_DESIRED_CAPACITY") {
            config.ecs_desired_capacity = parse_number("ECS_DESIRED_CAPACITY", &capacity)?;
        }

        Ok(())
    }

    /// Loads the .env file if present.
    ///
    /// Variables already set in the process environment are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                SynthError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

impl FromStr for AdEdition {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "enterprise" => Ok(Self::Enterprise),
            _ => Err(SynthError::Config(ConfigError::invalid(
                "AD_EDITION",
                s,
                "expected Standard or Enterprise",
            ))),
        }
    }
}

/// Flags are on only for the literal value `1`.
fn is_enabled(value: &str) -> bool {
    value == "1"
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn parse_number(name: &str, value: &str) -> Result<u32> {
    value.trim().parse::<u32>().map_err(|e| {
        SynthError::Config(ConfigError::invalid(name, value, e.to_string()))
    })
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["gmsa-stacks.yaml", "gmsa-stacks.yml"];

/// Finds a configuration file in `start_dir` or one of its parents.
///
/// Returns `None` when no file exists; the file is optional.
#[must_use]
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Option<PathBuf> {
    let mut current = start_dir.as_ref().to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Some(config_path);
            }
        }

        if !current.pop() {
            return None;
        }
    }
}
