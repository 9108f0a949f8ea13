//! Cloud assembly: the templates and manifest handed to the deployment engine.
//!
//! A [`CloudAssembly`] is built from a [`ComposedApp`] in memory and written
//! to disk by an [`AssemblyWriter`]. Output is byte-for-byte reproducible
//! for a given configuration.

mod manifest;
mod writer;

pub use manifest::{
    ArtifactEntry, ArtifactProperties, MANIFEST_FILE, MANIFEST_VERSION, Manifest,
    STACK_ARTIFACT_TYPE,
};
pub use writer::{AssemblyWriter, DEFAULT_OUTPUT_DIR};

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::composer::ComposedApp;
use crate::config::{Environment, StackKind};
use crate::error::{AssemblyError, Result, SynthError};
use crate::stacks::Stack;

/// One synthesized stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackArtifact {
    /// Stack name.
    pub name: String,
    /// Stack kind.
    pub kind: StackKind,
    /// Target account and region.
    pub environment: Environment,
    /// Stacks to deploy first, sorted.
    pub dependencies: Vec<String>,
    /// Rendered template.
    pub template_json: String,
    /// Number of resources in the template.
    pub resource_count: usize,
    /// Number of exports the template declares.
    pub export_count: usize,
}

impl StackArtifact {
    fn from_stack(stack: &dyn Stack) -> Result<Self> {
        let template = stack.template();
        let template_json = template.to_json().map_err(|e| {
            AssemblyError::serialization(format!(
                "Failed to serialize template of {}: {e}",
                stack.stack_name()
            ))
        })?;
        Ok(Self {
            name: stack.stack_name().to_string(),
            kind: stack.kind(),
            environment: stack.definition().environment.clone(),
            dependencies: stack.dependencies().iter().cloned().collect(),
            template_json,
            resource_count: template.resources().len(),
            export_count: template.export_names().len(),
        })
    }

    /// Template file name, `<stack>.template.json`.
    #[must_use]
    pub fn template_file(&self) -> String {
        format!("{}.template.json", self.name)
    }

    /// Hex SHA-256 of the template file contents.
    #[must_use]
    pub fn template_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.template_json.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// First eight characters of the template hash, for display.
    #[must_use]
    pub fn short_hash(&self) -> String {
        self.template_hash().chars().take(8).collect()
    }
}

/// The complete synthesis output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudAssembly {
    /// Stacks in construction order.
    pub artifacts: Vec<StackArtifact>,
    /// Advisory warnings raised during composition.
    pub warnings: Vec<String>,
}

impl CloudAssembly {
    /// Returns the artifact of stack `name`.
    #[must_use]
    pub fn artifact(&self, name: &str) -> Option<&StackArtifact> {
        self.artifacts.iter().find(|a| a.name == name)
    }

    /// Builds the manifest describing this assembly.
    #[must_use]
    pub fn manifest(&self) -> Manifest {
        let artifacts: BTreeMap<String, ArtifactEntry> = self
            .artifacts
            .iter()
            .map(|artifact| {
                (
                    artifact.name.clone(),
                    ArtifactEntry {
                        artifact_type: STACK_ARTIFACT_TYPE.to_string(),
                        environment: artifact.environment.to_string(),
                        properties: ArtifactProperties {
                            template_file: artifact.template_file(),
                        },
                        dependencies: artifact.dependencies.clone(),
                        template_hash: artifact.template_hash(),
                    },
                )
            })
            .collect();

        Manifest {
            version: MANIFEST_VERSION.to_string(),
            stack_order: self.artifacts.iter().map(|a| a.name.clone()).collect(),
            artifacts,
            warnings: self.warnings.clone(),
        }
    }
}

impl TryFrom<&ComposedApp> for CloudAssembly {
    type Error = SynthError;

    fn try_from(app: &ComposedApp) -> Result<Self> {
        let artifacts = app
            .stacks()
            .into_iter()
            .map(StackArtifact::from_stack)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            artifacts,
            warnings: app.warnings.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::Composer;
    use crate::config::DeploymentConfig;

    fn config() -> DeploymentConfig {
        DeploymentConfig {
            ec2_instance_keypair_name: String::from("kp-1"),
            my_sg_ingress_ip: String::from("203.0.113.5/32"),
            region: Some(String::from("eu-west-1")),
            ..DeploymentConfig::default()
        }
    }

    fn assembly(config: &DeploymentConfig) -> CloudAssembly {
        let app = Composer::new(config).compose().unwrap();
        CloudAssembly::try_from(&app).unwrap()
    }

    #[test]
    fn test_manifest_order_and_dependencies() {
        let manifest = assembly(&config()).manifest();
        assert_eq!(
            manifest.stack_order,
            vec![
                "sql-server-gmsa-infrastructure",
                "sql-server-gmsa-database",
                "sql-server-gmsa-bastion",
                "sql-server-gmsa-application",
            ]
        );
        let bastion = &manifest.artifacts["sql-server-gmsa-bastion"];
        assert_eq!(
            bastion.dependencies,
            vec!["sql-server-gmsa-database", "sql-server-gmsa-infrastructure"]
        );
        assert_eq!(bastion.environment, "aws://unknown-account/eu-west-1");
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let first = assembly(&config());
        let second = assembly(&config());
        assert_eq!(first, second);
        assert_eq!(first.manifest().to_json().unwrap(), second.manifest().to_json().unwrap());
    }

    #[test]
    fn test_hash_tracks_template() {
        let base = assembly(&config());
        let resized = assembly(&DeploymentConfig {
            db_allocated_storage_gb: 200,
            ..config()
        });

        let name = "sql-server-gmsa-database";
        assert_ne!(
            base.artifact(name).unwrap().template_hash(),
            resized.artifact(name).unwrap().template_hash()
        );
        let infra = "sql-server-gmsa-infrastructure";
        assert_eq!(
            base.artifact(infra).unwrap().template_hash(),
            resized.artifact(infra).unwrap().template_hash()
        );
    }

    #[test]
    fn test_warnings_carried() {
        let assembly = assembly(&DeploymentConfig {
            deploy_app: true,
            app_td_revision: Some(String::from("4")),
            ..config()
        });
        assert_eq!(assembly.warnings.len(), 1);
        assert_eq!(assembly.manifest().warnings, assembly.warnings);
    }

    #[test]
    fn test_short_hash() {
        let assembly = assembly(&config());
        let artifact = &assembly.artifacts[0];
        assert_eq!(artifact.short_hash().len(), 8);
        assert!(artifact.template_hash().starts_with(&artifact.short_hash()));
        assert_eq!(artifact.template_file(), "sql-server-gmsa-infrastructure.template.json");
    }
}
