//! Deployment configuration record.
//!
//! [`DeploymentConfig`] is built once by the loader and then only read.
//! Every field has a default so a YAML file may set any subset of them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The root configuration for a synthesis run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeploymentConfig {
    /// Prefix for every stack and most physical resource names.
    pub solution_id: String,
    /// Key pair for the AD management instance and the ECS hosts.
    pub ec2_instance_keypair_name: String,
    /// Address or CIDR allowed to RDP into the AD management instance.
    pub my_sg_ingress_ip: String,
    /// Whether ECS container instances are joined to the directory.
    pub domain_join_ecs: bool,
    /// Whether the ECS service for the application is declared.
    pub deploy_app: bool,
    /// Task definition revision the ECS service runs.
    pub app_td_revision: Option<String>,
    /// Target AWS account.
    pub account: Option<String>,
    /// Target AWS region.
    pub region: Option<String>,
    /// CIDR block of the VPC.
    pub vpc_cidr: String,
    /// Fully qualified domain name of the directory.
    pub ad_domain_name: String,
    /// Managed Microsoft AD edition.
    pub ad_edition: AdEdition,
    /// Name of the group managed service account used by the application.
    pub gmsa_account_name: String,
    /// RDS instance class for SQL Server.
    pub db_instance_class: String,
    /// Allocated storage for SQL Server in GiB.
    pub db_allocated_storage_gb: u32,
    /// Instance type of the AD management instance.
    pub bastion_instance_type: String,
    /// Instance type of the ECS container instances.
    pub ecs_instance_type: String,
    /// Desired number of ECS container instances.
    pub ecs_desired_capacity: u32,
    /// Container image of the application.
    pub app_image: String,
}

/// Managed Microsoft AD editions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum AdEdition {
    /// Standard edition.
    #[default]
    Standard,
    /// Enterprise edition.
    Enterprise,
}

/// The four stacks, in construction order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StackKind {
    /// Network, directory and shared compute resources.
    Infrastructure,
    /// SQL Server on RDS.
    Database,
    /// AD management instance.
    Bastion,
    /// ECS application tier.
    Application,
}

/// Account and region a stack is deployed to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// AWS account id, if pinned.
    pub account: Option<String>,
    /// AWS region, if pinned.
    pub region: Option<String>,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            solution_id: String::from(DEFAULT_SOLUTION_ID),
            ec2_instance_keypair_name: String::new(),
            my_sg_ingress_ip: String::new(),
            domain_join_ecs: false,
            deploy_app: false,
            app_td_revision: None,
            account: None,
            region: None,
            vpc_cidr: String::from("10.0.0.0/16"),
            ad_domain_name: String::from("directory.gmsa.local"),
            ad_edition: AdEdition::Standard,
            gmsa_account_name: String::from("WebApp01"),
            db_instance_class: String::from("db.m5.large"),
            db_allocated_storage_gb: 100,
            bastion_instance_type: String::from("t3.large"),
            ecs_instance_type: String::from("m5.xlarge"),
            ecs_desired_capacity: 2,
            app_image: String::from(DEFAULT_APP_IMAGE),
        }
    }
}

/// Solution id used when none is configured.
pub const DEFAULT_SOLUTION_ID: &str = "sql-server-gmsa";

/// Application image used when none is configured.
pub const DEFAULT_APP_IMAGE: &str = "mcr.microsoft.com/dotnet/samples:aspnetapp-nanoserver-ltsc2022";

impl DeploymentConfig {
    /// Returns the stack name for `kind`, e.g. `sql-server-gmsa-database`.
    #[must_use]
    pub fn stack_name(&self, kind: StackKind) -> String {
        format!("{}-{kind}", self.solution_id)
    }

    /// Returns the deployment environment.
    #[must_use]
    pub fn environment(&self) -> Environment {
        Environment {
            account: self.account.clone(),
            region: self.region.clone(),
        }
    }

    /// NetBIOS name of the directory: first label, uppercased, at most 15 characters.
    #[must_use]
    pub fn ad_short_name(&self) -> String {
        let first = self.ad_domain_name.split('.').next().unwrap_or_default();
        first.chars().take(15).collect::<String>().to_uppercase()
    }

    /// Revision label shown to the operator; `latest` when no revision is pinned.
    #[must_use]
    pub fn task_revision_label(&self) -> &str {
        self.app_td_revision.as_deref().unwrap_or("latest")
    }
}

impl StackKind {
    /// All kinds in construction order.
    pub const ALL: [Self; 4] = [
        Self::Infrastructure,
        Self::Database,
        Self::Bastion,
        Self::Application,
    ];

    /// Lowercase name used as stack name suffix.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Infrastructure => "infrastructure",
            Self::Database => "database",
            Self::Bastion => "bastion",
            Self::Application => "application",
        }
    }
}

impl fmt::Display for StackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for AdEdition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => f.write_str("Standard"),
            Self::Enterprise => f.write_str("Enterprise"),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "aws://{}/{}",
            self.account.as_deref().unwrap_or("unknown-account"),
            self.region.as_deref().unwrap_or("unknown-region")
        )
    }
}
