//! Shared stack construction plumbing.

use serde_json::{Value, json};
use std::collections::BTreeSet;
use tracing::debug;

use crate::config::{DeploymentConfig, Environment, StackKind};
use crate::error::{Result, TemplateError};
use crate::template::{Export, Output, Parameter, Resource, Template, intrinsic};

use super::handles::ExportedValue;

/// The synthesized form of a stack.
#[derive(Debug, Clone, PartialEq)]
pub struct StackDefinition {
    /// Stack name.
    pub name: String,
    /// Which of the four stacks this is.
    pub kind: StackKind,
    /// Target account and region.
    pub environment: Environment,
    /// The CloudFormation template.
    pub template: Template,
    /// Names of stacks whose exports this stack imports.
    pub dependencies: BTreeSet<String>,
}

/// Common read access to every stack.
pub trait Stack {
    /// Returns the synthesized definition.
    fn definition(&self) -> &StackDefinition;

    /// Stack name.
    fn stack_name(&self) -> &str {
        &self.definition().name
    }

    /// Stack kind.
    fn kind(&self) -> StackKind {
        self.definition().kind
    }

    /// The CloudFormation template.
    fn template(&self) -> &Template {
        &self.definition().template
    }

    /// Stacks that must be deployed first.
    fn dependencies(&self) -> &BTreeSet<String> {
        &self.definition().dependencies
    }
}

/// Accumulates a template and its cross-stack dependencies.
#[derive(Debug)]
pub struct StackBuilder {
    name: String,
    kind: StackKind,
    environment: Environment,
    solution_id: String,
    template: Template,
    dependencies: BTreeSet<String>,
}

impl StackBuilder {
    /// Starts a stack of `kind` for `config`.
    #[must_use]
    pub fn new(kind: StackKind, config: &DeploymentConfig, description: &str) -> Self {
        let name = config.stack_name(kind);
        debug!("Building stack {name}");
        Self {
            template: Template::new(&name, description),
            name,
            kind,
            environment: config.environment(),
            solution_id: config.solution_id.clone(),
            dependencies: BTreeSet::new(),
        }
    }

    /// Name of the stack under construction.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Prefixes `suffix` with the solution id, e.g. `sql-server-gmsa-cluster`.
    #[must_use]
    pub fn physical_name(&self, suffix: &str) -> String {
        format!("{}-{suffix}", self.solution_id)
    }

    /// Standard tag list: `Name` plus the solution id.
    #[must_use]
    pub fn name_tags(&self, name: &str) -> Value {
        intrinsic::tags([
            ("Name", json!(self.physical_name(name))),
            ("SolutionId", json!(self.solution_id)),
        ])
    }

    /// Declares a resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the logical id is invalid or already used.
    pub fn add(&mut self, logical_id: &str, resource: Resource) -> Result<()> {
        debug!("{}: {} ({})", self.name, logical_id, resource.resource_type);
        self.template.add_resource(logical_id, resource)?;
        Ok(())
    }

    /// Declares a parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if the logical id is invalid or already used.
    pub fn add_parameter(&mut self, logical_id: &str, parameter: Parameter) -> Result<()> {
        self.template.add_parameter(logical_id, parameter)?;
        Ok(())
    }

    /// Declares a plain output.
    ///
    /// # Errors
    ///
    /// Returns an error if the output id is invalid or already used.
    pub fn output(&mut self, output_id: &str, value: Value, description: &str) -> Result<()> {
        self.template.add_output(
            output_id,
            Output {
                value,
                description: Some(description.to_string()),
                export: None,
            },
        )?;
        Ok(())
    }

    /// Declares an exported output and returns its handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the output id is invalid or already used.
    pub fn export(
        &mut self,
        output_id: &str,
        value: Value,
        description: &str,
    ) -> Result<ExportedValue> {
        let exported = ExportedValue::new(&self.name, output_id);
        debug!("{}: exporting {}", self.name, exported.export_name);
        self.template.add_output(
            output_id,
            Output {
                value,
                description: Some(description.to_string()),
                export: Some(Export {
                    name: exported.export_name.clone(),
                }),
            },
        )?;
        Ok(exported)
    }

    /// Resolves a handle from an earlier stack and records the dependency.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle was exported by this stack.
    pub fn import(&mut self, value: &ExportedValue) -> Result<Value> {
        if value.producer == self.name {
            return Err(TemplateError::SelfImport {
                stack: self.name.clone(),
                export_name: value.export_name.clone(),
            }
            .into());
        }
        self.dependencies.insert(value.producer.clone());
        Ok(intrinsic::import_value(&value.export_name))
    }

    /// Finishes construction.
    #[must_use]
    pub fn finish(self) -> StackDefinition {
        StackDefinition {
            name: self.name,
            kind: self.kind,
            environment: self.environment,
            template: self.template,
            dependencies: self.dependencies,
        }
    }
}
