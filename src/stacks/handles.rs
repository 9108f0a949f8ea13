//! Typed cross-stack references.
//!
//! A producing stack exports a value and hands out a handle; consuming
//! stacks receive the handle (shared through `Arc`) and resolve it with
//! [`StackBuilder::import`](super::StackBuilder::import), which turns it
//! into `Fn::ImportValue` and records the deployment dependency.

use serde_json::Value;

/// A value exported by one stack for use by later stacks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExportedValue {
    /// Stack that declared the export.
    pub producer: String,
    /// Output logical id in the producer's template.
    pub output_id: String,
    /// Export name, `<producer>:<output_id>`.
    pub export_name: String,
}

impl ExportedValue {
    /// Creates the handle for output `output_id` of `producer`.
    #[must_use]
    pub fn new(producer: &str, output_id: &str) -> Self {
        Self {
            producer: producer.to_string(),
            output_id: output_id.to_string(),
            export_name: format!("{producer}:{output_id}"),
        }
    }
}

/// The shared virtual network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vpc {
    /// VPC id.
    pub vpc_id: ExportedValue,
    /// Public subnet ids, one per availability zone.
    pub public_subnet_ids: Vec<ExportedValue>,
    /// Private subnet ids with NAT egress, one per availability zone.
    pub private_subnet_ids: Vec<ExportedValue>,
}

/// A security group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroup {
    /// Security group id.
    pub group_id: ExportedValue,
}

/// The managed Microsoft AD directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveDirectory {
    /// Directory id.
    pub directory_id: ExportedValue,
    /// Directory alias (`d-xxxxxxxxxx` unless a custom alias is set).
    pub alias: ExportedValue,
    /// Comma separated DNS server addresses.
    pub dns_ips: ExportedValue,
    /// Fully qualified domain name.
    pub name: String,
    /// NetBIOS name.
    pub short_name: String,
}

/// Everything an instance needs to join the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdInfo {
    /// Directory id.
    pub directory_id: ExportedValue,
    /// Fully qualified domain name.
    pub domain_name: String,
    /// Comma separated DNS server addresses.
    pub dns_ips: ExportedValue,
}

/// A Secrets Manager secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Secret {
    /// Secret ARN.
    pub arn: ExportedValue,
    /// Secret name.
    pub name: String,
}

/// An SSM command document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsmDocument {
    /// Document name.
    pub name: ExportedValue,
}

/// An SSM string parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringParameter {
    /// Parameter name, starting with `/`.
    pub name: String,
    /// Parameter ARN.
    pub arn: ExportedValue,
}

/// Tag key marking instances the domain-join association applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainJoinTag {
    /// Tag key.
    pub key: String,
}

impl DomainJoinTag {
    /// Tag value that enrols an instance.
    pub const VALUE: &'static str = "true";
}

/// The ECS cluster and its EC2 capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcsCluster {
    /// Cluster name.
    pub cluster_name: ExportedValue,
    /// Capacity provider backed by the Windows auto scaling group.
    pub capacity_provider: ExportedValue,
}

/// The SQL Server instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseInstance {
    /// Instance identifier.
    pub identifier: String,
    /// Endpoint address.
    pub endpoint_address: ExportedValue,
    /// Endpoint port.
    pub endpoint_port: ExportedValue,
    /// Security group attached to the instance.
    pub security_group_id: ExportedValue,
}

/// Converts a list of handles into import expressions.
pub(crate) fn import_all(
    builder: &mut super::StackBuilder,
    values: &[ExportedValue],
) -> crate::error::Result<Vec<Value>> {
    values.iter().map(|v| builder.import(v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_name() {
        let value = ExportedValue::new("demo-infrastructure", "VpcId");
        assert_eq!(value.export_name, "demo-infrastructure:VpcId");
        assert_eq!(value.producer, "demo-infrastructure");
    }
}
