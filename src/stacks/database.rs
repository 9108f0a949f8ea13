//! SQL Server on RDS, joined to the directory for Windows authentication.

use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::config::{DeploymentConfig, StackKind};
use crate::error::Result;
use crate::template::Resource;
use crate::template::intrinsic::{assume_role_policy, get_att, managed_policy_arn, ref_to};

use super::builder::{Stack, StackBuilder, StackDefinition};
use super::handles::{DatabaseInstance, ExportedValue, SecurityGroup, Vpc, import_all};

const DB_INSTANCE: &str = "SqlServerInstance";
const DB_SECURITY_GROUP: &str = "SqlServerSecurityGroup";

/// SQL Server listener port.
pub const SQL_SERVER_PORT: u16 = 1433;

/// Inputs of the database stack.
#[derive(Debug, Clone)]
pub struct DatabaseStackProps {
    /// The shared VPC.
    pub vpc: Arc<Vpc>,
    /// Directory the instance joins.
    pub active_directory_id: ExportedValue,
    /// Security group allowed to reach SQL Server.
    pub ecs_asg_security_group: Arc<SecurityGroup>,
}

/// The SQL Server instance and its network plumbing.
#[derive(Debug)]
pub struct DatabaseStack {
    definition: StackDefinition,
    props: DatabaseStackProps,
    /// The SQL Server instance.
    pub database_instance: Arc<DatabaseInstance>,
}

impl DatabaseStack {
    /// Builds the database stack.
    ///
    /// # Errors
    ///
    /// Returns an error if the template cannot be assembled.
    pub fn new(config: &DeploymentConfig, props: DatabaseStackProps) -> Result<Self> {
        let mut b = StackBuilder::new(
            StackKind::Database,
            config,
            "SQL Server on Amazon RDS with Windows authentication",
        );

        let vpc_id = b.import(&props.vpc.vpc_id)?;
        let private_subnets = import_all(&mut b, &props.vpc.private_subnet_ids)?;
        let ecs_group_id = b.import(&props.ecs_asg_security_group.group_id)?;
        let directory = b.import(&props.active_directory_id)?;

        b.add(
            DB_SECURITY_GROUP,
            Resource::new(
                "AWS::EC2::SecurityGroup",
                json!({
                    "GroupDescription": "SQL Server access from ECS instances",
                    "VpcId": vpc_id,
                    "SecurityGroupIngress": [{
                        "IpProtocol": "tcp",
                        "FromPort": SQL_SERVER_PORT,
                        "ToPort": SQL_SERVER_PORT,
                        "SourceSecurityGroupId": ecs_group_id,
                        "Description": "SQL Server from ECS"
                    }],
                    "Tags": b.name_tags("sqlserver")
                }),
            ),
        )?;

        b.add(
            "SqlServerSubnetGroup",
            Resource::new(
                "AWS::RDS::DBSubnetGroup",
                json!({
                    "DBSubnetGroupDescription": "Private subnets for SQL Server",
                    "SubnetIds": private_subnets
                }),
            ),
        )?;

        b.add(
            "RdsDirectoryRole",
            Resource::new(
                "AWS::IAM::Role",
                json!({
                    "AssumeRolePolicyDocument": assume_role_policy("rds.amazonaws.com"),
                    "ManagedPolicyArns": [
                        managed_policy_arn("service-role/AmazonRDSDirectoryServiceAccess")
                    ]
                }),
            ),
        )?;

        let identifier = b.physical_name("sqlserver").to_lowercase();
        b.add(
            DB_INSTANCE,
            Resource::new(
                "AWS::RDS::DBInstance",
                json!({
                    "DBInstanceIdentifier": identifier,
                    "Engine": "sqlserver-se",
                    "LicenseModel": "license-included",
                    "DBInstanceClass": config.db_instance_class,
                    "AllocatedStorage": config.db_allocated_storage_gb.to_string(),
                    "StorageType": "gp3",
                    "StorageEncrypted": true,
                    "MasterUsername": "admin",
                    "ManageMasterUserPassword": true,
                    "MultiAZ": false,
                    "PubliclyAccessible": false,
                    "DBSubnetGroupName": ref_to("SqlServerSubnetGroup"),
                    "VPCSecurityGroups": [get_att(DB_SECURITY_GROUP, "GroupId")],
                    "Domain": directory,
                    "DomainIAMRoleName": ref_to("RdsDirectoryRole"),
                    "Tags": b.name_tags("sqlserver")
                }),
            )
            .snapshot_on_delete(),
        )?;

        let endpoint_address = b.export(
            "SqlServerEndpointAddress",
            get_att(DB_INSTANCE, "Endpoint.Address"),
            "SQL Server endpoint address",
        )?;
        let endpoint_port = b.export(
            "SqlServerEndpointPort",
            get_att(DB_INSTANCE, "Endpoint.Port"),
            "SQL Server endpoint port",
        )?;
        let security_group_id = b.export(
            "SqlServerSecurityGroupId",
            get_att(DB_SECURITY_GROUP, "GroupId"),
            "Security group of the SQL Server instance",
        )?;
        b.output(
            "SqlServerInstanceIdentifier",
            ref_to(DB_INSTANCE),
            "SQL Server instance identifier",
        )?;

        let definition = b.finish();
        info!(
            "Built stack {} ({} resources)",
            definition.name,
            definition.template.resources().len()
        );

        Ok(Self {
            definition,
            props,
            database_instance: Arc::new(DatabaseInstance {
                identifier,
                endpoint_address,
                endpoint_port,
                security_group_id,
            }),
        })
    }

    /// Inputs this stack was built from.
    #[must_use]
    pub const fn props(&self) -> &DatabaseStackProps {
        &self.props
    }
}

impl Stack for DatabaseStack {
    fn definition(&self) -> &StackDefinition {
        &self.definition
    }
}
