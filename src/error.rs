//! Error types for stack synthesis.
//!
//! Composition fails only on a missing or malformed required setting,
//! raised before any stack is built. The remaining variants cover
//! configuration loading, template construction and writing the cloud
//! assembly to disk.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for stack synthesis.
#[derive(Debug, Error)]
pub enum SynthError {
    /// Configuration-related errors.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Template construction errors.
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Cloud assembly output errors.
    #[error("Assembly error: {0}")]
    Assembly(#[from] AssemblyError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A configuration value that must be present before any stack is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequiredField {
    /// Key pair for the AD management (bastion) instance and ECS hosts.
    Ec2InstanceKeypairName,
    /// Source address allowed to reach the AD management instance.
    MySgIngressIp,
}

impl RequiredField {
    /// Environment variable that supplies this field.
    #[must_use]
    pub const fn env_var(self) -> &'static str {
        match self {
            Self::Ec2InstanceKeypairName => "EC2_INSTANCE_KEYPAIR_NAME",
            Self::MySgIngressIp => "MY_SG_INGRESS_IP",
        }
    }

    /// Human-readable reason the field is required.
    #[must_use]
    pub const fn requirement(self) -> &'static str {
        match self {
            Self::Ec2InstanceKeypairName => {
                "An EC2 Key pair for the AD Management instance is required to create the shared infrastructure."
            }
            Self::MySgIngressIp => {
                "The IP to access the AD Management instance is required to create the shared infrastructure."
            }
        }
    }
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.env_var())
    }
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A mandatory setting is absent or empty.
    #[error("{} (set {field})", .field.requirement())]
    MissingRequired {
        /// The missing field.
        field: RequiredField,
    },

    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// A value could not be converted to its field type.
    #[error("Invalid value for {name}: '{value}' ({reason})")]
    InvalidValue {
        /// Variable or key that carried the value.
        name: String,
        /// The offending raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Template construction errors.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Two resources or outputs share a logical id.
    #[error("Duplicate logical id '{logical_id}' in stack {stack}")]
    DuplicateLogicalId {
        /// Stack being built.
        stack: String,
        /// The duplicated id.
        logical_id: String,
    },

    /// A logical id contains characters CloudFormation rejects.
    #[error("Invalid logical id '{logical_id}': must be non-empty and alphanumeric")]
    InvalidLogicalId {
        /// The rejected id.
        logical_id: String,
    },

    /// A stack tried to import one of its own exports.
    #[error("Stack {stack} cannot import its own export {export_name}")]
    SelfImport {
        /// Stack being built.
        stack: String,
        /// The export it referenced.
        export_name: String,
    },
}

/// Cloud assembly output errors.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// Output directory could not be prepared.
    #[error("Cannot prepare output directory {path}: {message}")]
    OutputDir {
        /// Target directory.
        path: PathBuf,
        /// Underlying failure.
        message: String,
    },

    /// Serialization error.
    #[error("Assembly serialization error: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
    },
}

/// Result type alias for synthesis operations.
pub type Result<T> = std::result::Result<T, SynthError>;

impl SynthError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns the missing field if this is a required-setting failure.
    #[must_use]
    pub const fn missing_field(&self) -> Option<RequiredField> {
        match self {
            Self::Config(ConfigError::MissingRequired { field }) => Some(*field),
            _ => None,
        }
    }
}

impl ConfigError {
    /// Creates a missing-required error for `field`.
    #[must_use]
    pub const fn missing(field: RequiredField) -> Self {
        Self::MissingRequired { field }
    }

    /// Creates an invalid-value error.
    #[must_use]
    pub fn invalid(
        name: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

impl AssemblyError {
    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}
