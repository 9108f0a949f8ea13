//! Cloud assembly manifest.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{AssemblyError, Result};

/// Current version of the manifest format.
pub const MANIFEST_VERSION: &str = "1";

/// Artifact type of a CloudFormation stack.
pub const STACK_ARTIFACT_TYPE: &str = "aws:cloudformation:stack";

/// File name of the manifest inside the assembly directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Index of the assembly for the deployment engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Manifest format version.
    pub version: String,
    /// Stack names in deployment order.
    pub stack_order: Vec<String>,
    /// Stack artifacts keyed by stack name.
    pub artifacts: BTreeMap<String, ArtifactEntry>,
    /// Advisory warnings raised during synthesis.
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// One stack in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactEntry {
    /// Artifact type.
    #[serde(rename = "type")]
    pub artifact_type: String,
    /// `aws://account/region`.
    pub environment: String,
    /// Artifact properties.
    pub properties: ArtifactProperties,
    /// Stacks to deploy first.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// SHA-256 of the template file.
    pub template_hash: String,
}

/// Properties of a stack artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactProperties {
    /// Template file name, relative to the assembly directory.
    pub template_file: String,
}

impl Manifest {
    /// Reads a manifest from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        serde_json::from_str(&content).map_err(|e| {
            AssemblyError::serialization(format!(
                "Failed to parse {}: {e}",
                path.as_ref().display()
            ))
            .into()
        })
    }

    /// Renders the manifest as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            AssemblyError::serialization(format!("Failed to serialize manifest: {e}")).into()
        })
    }
}
