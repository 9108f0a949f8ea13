//! CloudFormation template document types.
//!
//! These types serialize to the JSON template format. All maps are
//! `BTreeMap`s so the rendered document is byte-for-byte stable.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::TemplateError;

/// Template format version written to every template.
pub const FORMAT_VERSION: &str = "2010-09-09";

/// A CloudFormation template.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    /// Template format version.
    #[serde(rename = "AWSTemplateFormatVersion")]
    format_version: String,
    /// Template description.
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    /// Input parameters.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    parameters: BTreeMap<String, Parameter>,
    /// Declared resources by logical id.
    resources: BTreeMap<String, Resource>,
    /// Stack outputs by logical id.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    outputs: BTreeMap<String, Output>,
    /// Stack that owns this template, used in error messages.
    #[serde(skip)]
    owner: String,
}

/// A single resource declaration.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Resource {
    /// Resource type, e.g. `AWS::EC2::VPC`.
    #[serde(rename = "Type")]
    pub resource_type: String,
    /// Resource properties.
    #[serde(skip_serializing_if = "Value::is_null")]
    pub properties: Value,
    /// Explicit dependencies on other resources in the same template.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Policy applied when the resource is deleted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<String>,
    /// Policy applied when an update replaces the resource.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<String>,
}

/// A template parameter.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    /// Parameter type.
    #[serde(rename = "Type")]
    pub parameter_type: String,
    /// Default value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A stack output.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    /// Output value.
    pub value: Value,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Export declaration, when other stacks import this value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export: Option<Export>,
}

/// Export block of an output.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Export {
    /// Region-unique export name.
    pub name: String,
}

impl Template {
    /// Creates an empty template owned by `owner`.
    #[must_use]
    pub fn new(owner: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            format_version: String::from(FORMAT_VERSION),
            description: Some(description.into()),
            parameters: BTreeMap::new(),
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
            owner: owner.into(),
        }
    }

    /// Adds a resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the logical id is invalid or already used.
    pub fn add_resource(
        &mut self,
        logical_id: impl Into<String>,
        resource: Resource,
    ) -> Result<(), TemplateError> {
        let logical_id = self.claim(logical_id.into())?;
        self.resources.insert(logical_id, resource);
        Ok(())
    }

    /// Adds a parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if the logical id is invalid or already used.
    pub fn add_parameter(
        &mut self,
        logical_id: impl Into<String>,
        parameter: Parameter,
    ) -> Result<(), TemplateError> {
        let logical_id = self.claim(logical_id.into())?;
        self.parameters.insert(logical_id, parameter);
        Ok(())
    }

    /// Adds an output.
    ///
    /// Outputs live in their own namespace, separate from resources and
    /// parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the logical id is invalid or already used by
    /// another output.
    pub fn add_output(
        &mut self,
        logical_id: impl Into<String>,
        output: Output,
    ) -> Result<(), TemplateError> {
        let logical_id = logical_id.into();
        validate_logical_id(&logical_id)?;
        if self.outputs.contains_key(&logical_id) {
            return Err(self.duplicate(logical_id));
        }
        self.outputs.insert(logical_id, output);
        Ok(())
    }

    /// Returns the resource with `logical_id`.
    #[must_use]
    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    /// Returns the output with `logical_id`.
    #[must_use]
    pub fn output(&self, logical_id: &str) -> Option<&Output> {
        self.outputs.get(logical_id)
    }

    /// Returns all resources.
    #[must_use]
    pub const fn resources(&self) -> &BTreeMap<String, Resource> {
        &self.resources
    }

    /// Returns all outputs.
    #[must_use]
    pub const fn outputs(&self) -> &BTreeMap<String, Output> {
        &self.outputs
    }

    /// Returns all parameters.
    #[must_use]
    pub const fn parameters(&self) -> &BTreeMap<String, Parameter> {
        &self.parameters
    }

    /// Returns the logical ids of resources of the given type.
    #[must_use]
    pub fn resources_of_type(&self, resource_type: &str) -> Vec<&str> {
        self.resources
            .iter()
            .filter(|(_, r)| r.resource_type == resource_type)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Returns the names of all exports declared by this template.
    #[must_use]
    pub fn export_names(&self) -> Vec<&str> {
        self.outputs
            .values()
            .filter_map(|o| o.export.as_ref())
            .map(|e| e.name.as_str())
            .collect()
    }

    /// Renders the template as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Resources and parameters share one namespace.
    fn claim(&self, logical_id: String) -> Result<String, TemplateError> {
        validate_logical_id(&logical_id)?;
        if self.resources.contains_key(&logical_id) || self.parameters.contains_key(&logical_id) {
            return Err(self.duplicate(logical_id));
        }
        Ok(logical_id)
    }

    fn duplicate(&self, logical_id: String) -> TemplateError {
        TemplateError::DuplicateLogicalId {
            stack: self.owner.clone(),
            logical_id,
        }
    }
}

impl Resource {
    /// Creates a resource of `resource_type` with `properties`.
    #[must_use]
    pub fn new(resource_type: impl Into<String>, properties: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            properties,
            depends_on: Vec::new(),
            deletion_policy: None,
            update_replace_policy: None,
        }
    }

    /// Adds an explicit dependency on another resource.
    #[must_use]
    pub fn depends_on(mut self, logical_id: impl Into<String>) -> Self {
        self.depends_on.push(logical_id.into());
        self
    }

    /// Keeps a snapshot when the resource is deleted or replaced.
    #[must_use]
    pub fn snapshot_on_delete(mut self) -> Self {
        self.deletion_policy = Some(String::from("Snapshot"));
        self.update_replace_policy = Some(String::from("Snapshot"));
        self
    }

    /// Returns a property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

impl Parameter {
    /// Creates a parameter resolved from a public SSM parameter path.
    #[must_use]
    pub fn ssm_image_id(path: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            parameter_type: String::from("AWS::SSM::Parameter::Value<AWS::EC2::Image::Id>"),
            default: Some(path.into()),
            description: Some(description.into()),
        }
    }
}

/// Logical ids must be non-empty and ASCII alphanumeric.
fn validate_logical_id(logical_id: &str) -> Result<(), TemplateError> {
    if logical_id.is_empty() || !logical_id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(TemplateError::InvalidLogicalId {
            logical_id: logical_id.to_string(),
        });
    }
    Ok(())
}
